//! Blob storage for rendered artwork and cached podcast covers.
//!
//! The engine only needs `put`; where the bytes end up is the store's
//! business. Two stores ship with the crate: a local directory and a plain
//! HTTP `PUT` endpoint guarded by a circuit breaker.

use crate::errors::StorageError;
use async_trait::async_trait;
use failsafe::futures::CircuitBreaker;
use reqwest::Client;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// A stored object and the URL it can be read back from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

/// Destination for published images.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under `key`, replacing any existing object.
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject, StorageError>;
}

/// Strips leading slashes and refuses keys that climb out of the store.
fn normalize_key(key: &str) -> Result<String, StorageError> {
    let normalized = key.trim_start_matches('/');
    let escapes = Path::new(normalized)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));

    if normalized.is_empty() || escapes {
        return Err(StorageError::Write {
            key: key.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid object key"),
        });
    }

    Ok(normalized.to_string())
}

fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}

/// Stores objects as files under a root directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl FsBlobStore {
    /// Objects are addressed as `<public_base_url>/<key>` when a base URL is
    /// given, otherwise as `file://` URLs.
    pub fn new(root: impl Into<PathBuf>, public_base_url: Option<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url,
        }
    }

    fn url_for(&self, key: &str, path: &Path) -> String {
        match &self.public_base_url {
            Some(base) => join_url(base, key),
            None => format!("file://{}", path.display()),
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let key = normalize_key(key)?;
        let path = self.root.join(&key);

        let write_error = |source| StorageError::Write {
            key: key.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
        }
        tokio::fs::write(&path, &bytes).await.map_err(write_error)?;

        let absolute = tokio::fs::canonicalize(&path).await.unwrap_or(path);
        let url = self.url_for(&key, &absolute);
        debug!(key = %key, url = %url, "Stored object");

        Ok(StoredObject { key, url })
    }
}

type UploadBreaker = failsafe::StateMachine<
    failsafe::failure_policy::ConsecutiveFailures<failsafe::backoff::Exponential>,
    (),
>;

/// Uploads objects with HTTP `PUT` to `<endpoint>/<key>`.
///
/// After three consecutive failed uploads the breaker opens and further
/// uploads are rejected without a request until the backoff elapses.
#[derive(Clone)]
pub struct HttpBlobStore {
    client: Client,
    endpoint: String,
    public_base_url: String,
    token: Option<String>,
    breaker: UploadBreaker,
}

impl HttpBlobStore {
    pub fn new(
        client: Client,
        endpoint: String,
        public_base_url: Option<String>,
        token: Option<String>,
    ) -> Self {
        let backoff = failsafe::backoff::exponential(Duration::from_secs(5), Duration::from_secs(60));
        let policy = failsafe::failure_policy::consecutive_failures(3, backoff);
        let breaker = failsafe::Config::new().failure_policy(policy).build();

        Self {
            client,
            public_base_url: public_base_url.unwrap_or_else(|| endpoint.clone()),
            endpoint,
            token,
            breaker,
        }
    }

    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let mut request = self
            .client
            .put(join_url(&self.endpoint, key))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| StorageError::Network {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Upload {
                key: key.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}

impl std::fmt::Debug for HttpBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBlobStore")
            .field("endpoint", &self.endpoint)
            .field("public_base_url", &self.public_base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let key = normalize_key(key)?;

        match self.breaker.call(self.upload(&key, bytes, content_type)).await {
            Ok(()) => {
                let url = join_url(&self.public_base_url, &key);
                debug!(key = %key, url = %url, "Uploaded object");
                Ok(StoredObject { key, url })
            }
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => {
                warn!(key = %key, "Storage circuit open, upload rejected");
                Err(StorageError::Rejected(key))
            }
        }
    }
}
