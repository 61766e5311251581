//! Image loading from URLs and local paths.

use crate::encode::ImageFormat;
use crate::errors::DecodeError;
use crate::storage::BlobStore;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const USER_AGENT: &str = concat!("coverstamp/", env!("CARGO_PKG_VERSION"));

/// Default timeout for outbound requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds an HTTP client with the crate's user agent and a request timeout.
pub fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// Shared HTTP client for callers without their own configuration.
pub static HTTP_CLIENT: Lazy<Client> =
    Lazy::new(|| build_client(DEFAULT_REQUEST_TIMEOUT).expect("Failed to create HTTP client"));

/// Raw image bytes and the content type they were served with.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Resolves an image handle to its bytes.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, handle: &str) -> Result<FetchedImage, DecodeError>;
}

/// Reads `http(s)://` URLs over the network and everything else from disk.
#[derive(Debug, Clone)]
pub struct HttpImageSource {
    client: Client,
}

impl HttpImageSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn fetch_remote(&self, url: &str) -> Result<FetchedImage, DecodeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DecodeError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DecodeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = response.bytes().await.map_err(|e| DecodeError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(FetchedImage {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    async fn fetch_local(&self, handle: &str) -> Result<FetchedImage, DecodeError> {
        let path = Path::new(handle.strip_prefix("file://").unwrap_or(handle));
        let bytes = tokio::fs::read(path).await.map_err(|e| DecodeError::Fetch {
            url: handle.to_string(),
            reason: e.to_string(),
        })?;

        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ImageFormat::from_extension)
            .unwrap_or(ImageFormat::Png);

        Ok(FetchedImage {
            bytes,
            content_type: format.mime_type().to_string(),
        })
    }
}

impl Default for HttpImageSource {
    fn default() -> Self {
        Self::new(HTTP_CLIENT.clone())
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    #[instrument(skip(self))]
    async fn fetch(&self, handle: &str) -> Result<FetchedImage, DecodeError> {
        let start_time = std::time::Instant::now();

        let fetched = if is_remote(handle) {
            self.fetch_remote(handle).await?
        } else {
            self.fetch_local(handle).await?
        };

        debug!(
            handle,
            size = fetched.bytes.len(),
            content_type = %fetched.content_type,
            duration = ?start_time.elapsed(),
            "Fetched image"
        );

        Ok(fetched)
    }
}

fn is_remote(handle: &str) -> bool {
    let lower = handle.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Copies a podcast's cover into the blob store so later renders do not depend
/// on the feed host.
///
/// Any failure is logged and the original URL returned instead.
#[instrument(skip(source, store))]
pub async fn cache_podcast_artwork(
    source: &dyn ImageSource,
    store: &dyn BlobStore,
    project_id: &str,
    url: &str,
) -> String {
    let fetched = match source.fetch(url).await {
        Ok(fetched) => fetched,
        Err(e) => {
            warn!(url, error = %e, "Could not download podcast artwork, keeping original URL");
            return url.to_string();
        }
    };

    let format = ImageFormat::from_content_type(&fetched.content_type);
    let digest = sha256::digest(fetched.bytes.as_slice());
    let key = format!(
        "podcast-artwork/{}-{}.{}",
        project_id,
        &digest[..8],
        format.extension()
    );

    match store.put(&key, fetched.bytes, format.mime_type()).await {
        Ok(stored) => stored.url,
        Err(e) => {
            warn!(url, key = %key, error = %e, "Could not store podcast artwork, keeping original URL");
            url.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_http_schemes_are_remote() {
        assert!(is_remote("https://cdn.test/a.png"));
        assert!(is_remote("HTTP://cdn.test/a.png"));
        assert!(!is_remote("file:///tmp/a.png"));
        assert!(!is_remote("artwork/a.png"));
    }
}
