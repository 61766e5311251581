//! Configuration management for coverstamp.
//!
//! Defaults, then environment variables, with CLI overrides taking
//! precedence over both.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Where projects and rendered images live
    pub storage: StorageConfig,
    /// Batch generation configuration
    pub batch: BatchConfig,
    /// Outbound HTTP and font configuration
    pub http: HttpConfig,
    /// Periodic feed sync configuration
    pub sync: SyncConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Default host address
    pub default_host: IpAddr,
    /// Default port
    pub default_port: u16,
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding project documents
    pub data_dir: PathBuf,
    /// Directory rendered images are written to when no endpoint is set
    pub storage_dir: PathBuf,
    /// Public base URL stored objects are served from
    pub public_url: Option<String>,
    /// HTTP endpoint objects are uploaded to with PUT
    pub endpoint: Option<String>,
    /// Bearer token for the upload endpoint
    pub token: Option<String>,
}

/// Batch generation configuration
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Episodes rendered at once
    pub concurrency: usize,
}

/// Periodic feed sync configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Time between sync passes while serving; `None` turns the job off
    pub interval: Option<Duration>,
}

/// Outbound HTTP configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Timeout for feed and image requests
    pub request_timeout: Duration,
    /// Extra directory of fonts to load
    pub font_dir: Option<PathBuf>,
}

/// CLI configuration overrides
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub data_dir: Option<PathBuf>,
    pub storage_dir: Option<PathBuf>,
    pub public_url: Option<String>,
    pub concurrency: Option<usize>,
    pub port: Option<u16>,
    pub font_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            default_host: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            default_port: 8080,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("coverstamp-data"),
            storage_dir: PathBuf::from("coverstamp-data/public"),
            public_url: None,
            endpoint: None,
            token: None,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Some(Duration::from_secs(60 * 60)),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            font_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from the process environment with CLI overrides
    pub fn load(cli_overrides: Option<CliOverrides>) -> Self {
        Self::load_with(cli_overrides, |name| std::env::var(name).ok())
    }

    /// Load configuration reading variables through `env`
    pub fn load_with<F>(cli_overrides: Option<CliOverrides>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let overrides = cli_overrides.unwrap_or_default();

        if let Some(dir) = overrides.data_dir.or_else(|| env("COVERSTAMP_DATA_DIR").map(PathBuf::from)) {
            // Rendered images follow the data directory unless placed elsewhere.
            config.storage.storage_dir = dir.join("public");
            config.storage.data_dir = dir;
        }

        if let Some(dir) = overrides
            .storage_dir
            .or_else(|| env("COVERSTAMP_STORAGE_DIR").map(PathBuf::from))
        {
            config.storage.storage_dir = dir;
        }

        config.storage.public_url = overrides
            .public_url
            .or_else(|| env("COVERSTAMP_PUBLIC_URL"))
            .filter(|url| !url.trim().is_empty());
        config.storage.endpoint = env("COVERSTAMP_STORAGE_ENDPOINT").filter(|url| !url.trim().is_empty());
        config.storage.token = env("COVERSTAMP_STORAGE_TOKEN").filter(|token| !token.is_empty());

        if let Some(concurrency) = overrides.concurrency.or_else(|| {
            env("COVERSTAMP_CONCURRENCY").and_then(|value| value.trim().parse::<usize>().ok())
        }) {
            config.batch.concurrency = concurrency.max(1);
        }

        if let Some(port) = overrides
            .port
            .or_else(|| env("PORT").and_then(|value| value.trim().parse::<u16>().ok()))
        {
            config.server.default_port = port;
        }

        if let Some(seconds) =
            env("COVERSTAMP_SYNC_INTERVAL").and_then(|value| value.trim().parse::<u64>().ok())
        {
            config.sync.interval = (seconds > 0).then(|| Duration::from_secs(seconds));
        }

        config.http.font_dir = overrides.font_dir;

        config
    }

    /// Get the default host address
    pub fn default_host(&self) -> IpAddr {
        self.server.default_host
    }

    /// Get the default port
    pub fn default_port(&self) -> u16 {
        self.server.default_port
    }

    /// Episodes rendered at once during a batch
    pub fn concurrency(&self) -> usize {
        self.batch.concurrency
    }
}
