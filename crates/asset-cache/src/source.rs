//! Asset source collaborator and its HTTP implementation

use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Where assets come from on a cache miss
///
/// Failures are reported as-is; retries and timeouts belong to the
/// implementation or its caller, never to the cache.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetches assets over HTTP(S)
pub struct HttpAssetSource {
    client: Client,
}

impl HttpAssetSource {
    /// Create a source with a 30 second request timeout
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AssetSource for HttpAssetSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!(url = %url, "Fetching asset");

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), url = %url, "Failed to fetch asset");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let data = response.bytes().await?.to_vec();
        debug!(url = %url, size = data.len(), "Fetched asset");
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_is_fetch_error() {
        let source = HttpAssetSource::new().unwrap();
        let result = source.fetch("not a url").await;
        assert!(matches!(result, Err(FetchError::Http(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_fetch_error() {
        let source = HttpAssetSource::with_timeout(Duration::from_secs(2)).unwrap();
        // Port 9 (discard) on localhost is closed in test environments
        let result = source.fetch("http://127.0.0.1:9/models/a.glb").await;
        assert!(result.is_err());
    }
}
