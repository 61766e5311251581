//! Centralized error handling for coverstamp.
//!
//! Category enums mirror how a failure is handled: configuration errors are
//! surfaced to the caller and never retried, decode/render/storage errors are
//! fatal to one episode only, and feed errors abort a whole import.

use thiserror::Error;

/// Unified error type for coverstamp.
#[derive(Error, Debug)]
pub enum CoverstampError {
    /// Template, artwork or style problems the caller must fix
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Base image unreachable or corrupt
    #[error("Image decode error: {0}")]
    ImageDecode(#[from] DecodeError),

    /// Drawing or measurement failure
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Encoding or upload failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Feed could not be fetched or understood
    #[error("Feed fetch error: {0}")]
    FeedFetch(#[from] FeedError),

    /// Unknown project or episode
    #[error("Not found: {0}")]
    NotFound(String),

    /// A batch is already running for the project
    #[error("A batch is already running for project {0}")]
    BatchRunning(String),

    /// Server/HTTP related errors
    #[cfg(feature = "server")]
    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    /// General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client construction errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Style, template and project configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No template configured for project {0}")]
    MissingTemplate(String),

    #[error("No base artwork configured for project {0}")]
    MissingBaseArtwork(String),

    #[error("Episode number not set for episode {0}")]
    MissingEpisodeNumber(String),

    #[error("Project {0} does not have a feed URL")]
    MissingFeedUrl(String),

    #[error("Invalid color: {0:?}")]
    InvalidColor(String),

    #[error("No generated artwork found for project {0}, generate artwork first")]
    NoGeneratedArtwork(String),
}

/// Base image fetch and decode errors.
#[derive(Error, Debug, Clone)]
pub enum DecodeError {
    #[error("Failed to fetch base image {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Base image request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to decode base image: {0}")]
    Decode(String),

    #[error("Base image has unusable dimensions {width}x{height}")]
    Dimensions { width: u32, height: u32 },
}

/// Image generation specific errors
#[derive(Error, Debug, Clone)]
pub enum RenderError {
    /// Failed to render SVG overlay
    #[error("Failed to render SVG overlay: {0}")]
    SvgRendering(String),

    /// Render task panicked or was aborted
    #[error("Render task failed: {0}")]
    Task(String),
}

/// Encode and blob store errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to write PNG: {0}")]
    PngWrite(String),

    #[error("Failed to write {key}: {source}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload of {key} returned status {status}")]
    Upload { key: String, status: u16 },

    #[error("Upload of {key} failed: {reason}")]
    Network { key: String, reason: String },

    #[error("Storage backend is unavailable, upload of {0} rejected")]
    Rejected(String),

    #[error("Failed to build archive: {0}")]
    Archive(String),
}

/// Feed source errors.
#[derive(Error, Debug, Clone)]
pub enum FeedError {
    #[error("Network error while fetching feed {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Feed request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to parse feed {url}: {reason}")]
    Parse { url: String, reason: String },
}

/// Server/HTTP specific errors
#[cfg(feature = "server")]
#[derive(Error, Debug)]
pub enum ServerError {
    /// Failed to bind to address
    #[error("Failed to bind to address: {0}")]
    BindError(String),

    /// Invalid address format
    #[error("Invalid address format: {0}")]
    InvalidAddress(String),

    /// Request body could not be parsed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Type alias for Result using the unified error type
pub type Result<T> = std::result::Result<T, CoverstampError>;

/// Convert errors to HTTP status codes
#[cfg(feature = "server")]
impl From<&CoverstampError> for axum::http::StatusCode {
    fn from(error: &CoverstampError) -> Self {
        use axum::http::StatusCode;

        match error {
            CoverstampError::Configuration(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CoverstampError::NotFound(_) => StatusCode::NOT_FOUND,
            CoverstampError::ImageDecode(_) => StatusCode::BAD_GATEWAY,
            CoverstampError::FeedFetch(_) => StatusCode::BAD_GATEWAY,
            CoverstampError::Storage(StorageError::Rejected(_)) => StatusCode::SERVICE_UNAVAILABLE,
            CoverstampError::BatchRunning(_) => StatusCode::CONFLICT,
            CoverstampError::Server(ServerError::InvalidAddress(_) | ServerError::InvalidRequest(_)) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
