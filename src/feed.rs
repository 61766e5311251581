//! Podcast feed model and sources.
//!
//! Feeds arrive already normalized to JSON: a title, optional description and
//! cover, and a list of episodes. Turning RSS XML into this shape is left to
//! whatever sits in front of the feed URL.

use crate::errors::FeedError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use tracing::{debug, instrument};

/// A fetched podcast feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub episodes: Vec<FeedEpisode>,
}

/// One episode as listed in a feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeedEpisode {
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub number: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub season: Option<String>,
    pub description: Option<String>,
    pub audio_url: Option<String>,
    pub artwork_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub guid: Option<String>,
}

impl FeedEpisode {
    /// The GUID, if present and not blank.
    pub fn guid(&self) -> Option<&str> {
        self.guid.as_deref().filter(|g| !g.trim().is_empty())
    }

    /// The feed number, if present and not blank.
    pub fn number(&self) -> Option<&str> {
        self.number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled Episode")
    }
}

/// Accepts `"5"`, `5` or `null`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(serde_json::Number),
    }

    Ok(
        Option::<StringOrNumber>::deserialize(deserializer)?.map(|value| match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }),
    )
}

/// Where feeds come from.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Feed, FeedError>;
}

/// Fetches JSON feeds over HTTP, or reads them from disk for `file://` URLs
/// and plain paths.
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn read(&self, url: &str) -> Result<Vec<u8>, FeedError> {
        let lower = url.to_ascii_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
            return tokio::fs::read(path).await.map_err(|e| FeedError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            });
        }

        let network = |e: reqwest::Error| FeedError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await.map_err(network)?.to_vec())
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<Feed, FeedError> {
        let body = self.read(url).await?;
        let feed = parse_feed(url, &body)?;
        debug!(title = %feed.title, episodes = feed.episodes.len(), "Fetched feed");
        Ok(feed)
    }
}

/// Parses a JSON feed document.
pub fn parse_feed(url: &str, body: &[u8]) -> Result<Feed, FeedError> {
    serde_json::from_slice(body).map_err(|e| FeedError::Parse {
        url: url.to_string(),
        reason: e.to_string(),
    })
}
