//! Error types for the asset cache

use std::fmt;

/// Failure reported by the asset source. The only error `resolve` surfaces.
#[derive(Debug)]
pub enum FetchError {
    Http(Box<reqwest::Error>),
    Status { url: String, status: u16 },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Http(err) => write!(f, "HTTP error: {}", err),
            FetchError::Status { url, status } => {
                write!(f, "Asset source returned status {} for {}", status, url)
            }
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Http(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Http(Box::new(err))
    }
}

/// Failure of the underlying key-value store
#[derive(Debug)]
pub enum StoreError {
    /// The write would exceed the store's capacity; nothing was written
    QuotaExceeded {
        key: String,
        requested: u64,
        available: u64,
    },
    Io(Box<std::io::Error>),
    Corrupt(String),
}

impl StoreError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StoreError::QuotaExceeded { .. })
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::QuotaExceeded {
                key,
                requested,
                available,
            } => write!(
                f,
                "Quota exceeded writing {}: requested {} bytes, {} available",
                key, requested, available
            ),
            StoreError::Io(err) => write!(f, "Store IO error: {}", err),
            StoreError::Corrupt(msg) => write!(f, "Store file is corrupt: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(Box::new(err))
    }
}

/// A stored value that cannot be turned back into a cache entry
#[derive(Debug)]
pub enum CodecError {
    Json(serde_json::Error),
    Base64(base64::DecodeError),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Json(err) => write!(f, "Entry JSON error: {}", err),
            CodecError::Base64(err) => write!(f, "Payload decode error: {}", err),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CodecError::Json(err) => Some(err),
            CodecError::Base64(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::Json(err)
    }
}

impl From<base64::DecodeError> for CodecError {
    fn from(err: base64::DecodeError) -> Self {
        CodecError::Base64(err)
    }
}

/// Errors from administrative cache operations
#[derive(Debug)]
pub enum AssetCacheError {
    Fetch(FetchError),
    Store(StoreError),
    Config(String),
}

impl fmt::Display for AssetCacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetCacheError::Fetch(err) => write!(f, "Fetch error: {}", err),
            AssetCacheError::Store(err) => write!(f, "Store error: {}", err),
            AssetCacheError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for AssetCacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AssetCacheError::Fetch(err) => Some(err),
            AssetCacheError::Store(err) => Some(err),
            AssetCacheError::Config(_) => None,
        }
    }
}

impl From<FetchError> for AssetCacheError {
    fn from(err: FetchError) -> Self {
        AssetCacheError::Fetch(err)
    }
}

impl From<StoreError> for AssetCacheError {
    fn from(err: StoreError) -> Self {
        AssetCacheError::Store(err)
    }
}

pub type Result<T> = std::result::Result<T, AssetCacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = FetchError::Status {
            url: "https://assets.example.com/a.glb".to_string(),
            status: 404,
        };
        assert_eq!(
            format!("{}", err),
            "Asset source returned status 404 for https://assets.example.com/a.glb"
        );
    }

    #[test]
    fn test_quota_exceeded_display() {
        let err = StoreError::QuotaExceeded {
            key: "asset_cache_abc".to_string(),
            requested: 2048,
            available: 100,
        };
        assert!(err.is_quota_exceeded());
        assert_eq!(
            format!("{}", err),
            "Quota exceeded writing asset_cache_abc: requested 2048 bytes, 100 available"
        );
    }

    #[test]
    fn test_io_error_is_not_quota() {
        let err = StoreError::from(std::io::Error::other("disk gone"));
        assert!(!err.is_quota_exceeded());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_config_error_display() {
        let err = AssetCacheError::Config("namespace must not be empty".to_string());
        assert_eq!(
            format!("{}", err),
            "Configuration error: namespace must not be empty"
        );
    }

    #[test]
    fn test_wrapped_store_error_display() {
        let err = AssetCacheError::from(StoreError::Corrupt("bad json".to_string()));
        assert_eq!(
            format!("{}", err),
            "Store error: Store file is corrupt: bad json"
        );
    }

    #[test]
    fn test_error_is_debug() {
        let err = FetchError::Status {
            url: "https://assets.example.com/a.glb".to_string(),
            status: 500,
        };
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("Status"));
    }
}
