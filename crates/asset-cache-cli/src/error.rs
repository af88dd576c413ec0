//! Error types for the asset cache CLI

use std::fmt;

#[derive(Debug)]
pub enum CliError {
    Cache(asset_cache::AssetCacheError),
    Io(Box<std::io::Error>),
    Json(serde_json::Error),
    Config(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Cache(err) => write!(f, "Cache error: {}", err),
            CliError::Io(err) => write!(f, "IO error: {}", err),
            CliError::Json(err) => write!(f, "JSON error: {}", err),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Cache(err) => Some(err),
            CliError::Io(err) => Some(err.as_ref()),
            CliError::Json(err) => Some(err),
            CliError::Config(_) => None,
        }
    }
}

impl From<asset_cache::AssetCacheError> for CliError {
    fn from(err: asset_cache::AssetCacheError) -> Self {
        CliError::Cache(err)
    }
}

impl From<asset_cache::FetchError> for CliError {
    fn from(err: asset_cache::FetchError) -> Self {
        CliError::Cache(err.into())
    }
}

impl From<asset_cache::StoreError> for CliError {
    fn from(err: asset_cache::StoreError) -> Self {
        CliError::Cache(err.into())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(Box::new(err))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Json(err)
    }
}

impl From<tracing_subscriber::filter::ParseError> for CliError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        CliError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err: CliError = asset_cache::FetchError::Status {
            url: "https://assets.example.com/a.glb".to_string(),
            status: 503,
        }
        .into();
        let msg = format!("{}", err);
        assert!(msg.starts_with("Cache error: Fetch error:"));
        assert!(msg.contains("503"));
    }

    #[test]
    fn test_config_error_display() {
        let err = CliError::Config("store capacity must be positive".to_string());
        assert_eq!(
            format!("{}", err),
            "Configuration error: store capacity must be positive"
        );
    }

    #[test]
    fn test_io_error_has_source() {
        let err: CliError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(std::error::Error::source(&err).is_some());
        assert!(format!("{:?}", err).contains("Io"));
    }
}
