//! Getting generated artwork back out: an updated feed, a plain list of URLs
//! for hosts that only take manual edits, and a ZIP of every image.

use crate::errors::StorageError;
use crate::feed::Feed;
use crate::numbering::numeric_value;
use crate::store::Episode;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// One episode's generated artwork, as listed in a [`FeedExport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtworkUrl {
    /// The episode number, or `N/A`.
    pub episode_number: String,
    pub title: String,
    pub artwork_url: String,
}

/// The project's feed with generated artwork swapped in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedExport {
    pub original_feed_url: String,
    pub feed: Feed,
    #[serde(rename = "artworkURLs")]
    pub artwork_urls: Vec<ArtworkUrl>,
    pub episodes_updated: usize,
}

/// Replaces the artwork of every feed entry whose GUID matches an episode
/// with generated artwork. Entries without a match keep their own artwork.
pub fn export_feed(feed_url: &str, mut feed: Feed, episodes: &[Episode]) -> FeedExport {
    let mut by_guid: HashMap<&str, &str> = HashMap::new();
    let mut artwork_urls = Vec::new();

    for episode in episodes {
        let (Some(guid), Some(url)) = (episode.guid(), episode.generated_artwork_url.as_deref())
        else {
            continue;
        };
        by_guid.insert(guid, url);
        artwork_urls.push(ArtworkUrl {
            episode_number: episode.number.clone().unwrap_or_else(|| "N/A".to_string()),
            title: episode.title.clone(),
            artwork_url: url.to_string(),
        });
    }

    for entry in &mut feed.episodes {
        if let Some(url) = entry.guid().and_then(|guid| by_guid.get(guid)) {
            entry.artwork_url = Some(url.to_string());
        }
    }

    FeedExport {
        original_feed_url: feed_url.to_string(),
        feed,
        artwork_urls,
        episodes_updated: by_guid.len(),
    }
}

/// Plain-text list of generated artwork, lowest episode number first.
pub fn artwork_url_list(episodes: &[Episode]) -> String {
    let mut with_artwork: Vec<&Episode> = episodes
        .iter()
        .filter(|e| e.generated_artwork_url.is_some())
        .collect();
    with_artwork.sort_by_key(|e| numeric_value(e.number.as_deref()));

    let mut list = format!("ARTWORK URLs FOR MANUAL UPDATE\n{}\n\n", "=".repeat(60));
    for episode in with_artwork {
        list.push_str(&format!(
            "Episode {}: {}\n{}\n\n",
            episode.number.as_deref().unwrap_or("N/A"),
            episode.title,
            episode.generated_artwork_url.as_deref().unwrap_or_default(),
        ));
    }
    list
}

/// Name of an episode's image inside the archive: `episode-007.png`.
pub fn archive_entry_name(number: Option<&str>) -> String {
    let number = number.map(str::trim).filter(|n| !n.is_empty()).unwrap_or("0");
    format!("episode-{:0>3}.png", number)
}

/// Download name for a project's archive: `my-show-artwork.zip`.
pub fn archive_file_name(project_name: &str) -> String {
    let slug: String = project_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    format!("{}-artwork.zip", slug)
}

/// A built archive of a project's artwork.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtworkArchive {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub file_count: usize,
}

/// Collects named files into a ZIP.
///
/// Images are stored as they are, PNG data does not shrink any further.
/// A name that is already taken gets a `-2`, `-3`, ... suffix.
#[derive(Default)]
pub struct ArchiveBuilder {
    files: Vec<(String, Vec<u8>)>,
    names: HashSet<String>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, bytes: Vec<u8>) {
        let mut unique = name.to_string();
        let (stem, extension) = name.rsplit_once('.').unwrap_or((name, ""));
        let mut copy = 2;
        while self.names.contains(&unique) {
            unique = if extension.is_empty() {
                format!("{}-{}", stem, copy)
            } else {
                format!("{}-{}.{}", stem, copy, extension)
            };
            copy += 1;
        }

        self.names.insert(unique.clone());
        self.files.push((unique, bytes));
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn finish(self) -> Result<Vec<u8>, StorageError> {
        let archive_error = |e: zip::result::ZipError| StorageError::Archive(e.to_string());

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .unix_permissions(0o644);

        for (name, bytes) in &self.files {
            writer.start_file(name.as_str(), options).map_err(archive_error)?;
            writer
                .write_all(bytes)
                .map_err(|e| StorageError::Archive(e.to_string()))?;
        }

        Ok(writer.finish().map_err(archive_error)?.into_inner())
    }
}
