//! Project-level operations shared by the CLI and the HTTP API.
//!
//! [`ArtworkService`] resolves projects, templates and episodes from the
//! stores, drives the compositor and the batch orchestrator, and writes the
//! results back.

use crate::batch::{
    ArtworkRenderer, BatchEpisode, BatchOptions, BatchOrchestrator, BatchRegistry, BatchSummary,
    ProgressSnapshot, RenderSink,
};
use crate::compositor::ArtworkCompositor;
use crate::config::Config;
use crate::errors::{ConfigError, CoverstampError, Result, StorageError};
use crate::export::{
    archive_entry_name, archive_file_name, artwork_url_list, export_feed, ArchiveBuilder, ArtworkArchive, FeedExport,
};
use crate::feed::{FeedEpisode, FeedSource, HttpFeedSource};
use crate::fetch::{build_client, cache_podcast_artwork, HttpImageSource, ImageSource};
use crate::image::Rasterizer;
use crate::numbering::{
    assign_numbers, fix_from_feed, partition_new, renumber, NumberingPolicy, RenumberOrder,
};
use crate::storage::{BlobStore, FsBlobStore, HttpBlobStore};
use crate::store::{Episode, EpisodeStore, JsonStore, Project, ProjectStore, Template, TemplateStore};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// The three stores the service reads and writes.
#[derive(Clone)]
pub struct Stores {
    pub projects: Arc<dyn ProjectStore>,
    pub templates: Arc<dyn TemplateStore>,
    pub episodes: Arc<dyn EpisodeStore>,
}

impl Stores {
    /// All three stores backed by one [`JsonStore`].
    pub fn json(store: Arc<JsonStore>) -> Self {
        Self {
            projects: store.clone(),
            templates: store.clone(),
            episodes: store,
        }
    }
}

/// Options for a feed import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImportOptions {
    /// Delete existing episodes before importing.
    pub replace: bool,
    pub numbering: NumberingPolicy,
}

/// Result of an import or sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// Episodes added.
    pub count: usize,
    /// Episodes in the feed.
    pub total: usize,
    /// Feed episodes that were already imported.
    pub skipped: usize,
    pub podcast_title: String,
}

/// How one project fared in [`ArtworkService::sync_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSync {
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ImportSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of fixing numbers from the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixSummary {
    pub updated: usize,
    pub total: usize,
}

pub struct ArtworkService {
    stores: Stores,
    renderer: Arc<dyn ArtworkRenderer>,
    images: Arc<dyn ImageSource>,
    blobs: Arc<dyn BlobStore>,
    feeds: Arc<dyn FeedSource>,
    registry: BatchRegistry,
    batch_options: BatchOptions,
}

impl ArtworkService {
    pub fn new(
        stores: Stores,
        renderer: Arc<dyn ArtworkRenderer>,
        images: Arc<dyn ImageSource>,
        blobs: Arc<dyn BlobStore>,
        feeds: Arc<dyn FeedSource>,
        batch_options: BatchOptions,
    ) -> Self {
        Self {
            stores,
            renderer,
            images,
            blobs,
            feeds,
            registry: BatchRegistry::new(),
            batch_options,
        }
    }

    /// Wires the bundled stores, fetchers and compositor from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = build_client(config.http.request_timeout)?;

        let blobs: Arc<dyn BlobStore> = match &config.storage.endpoint {
            Some(endpoint) => Arc::new(HttpBlobStore::new(
                client.clone(),
                endpoint.clone(),
                config.storage.public_url.clone(),
                config.storage.token.clone(),
            )),
            None => Arc::new(FsBlobStore::new(
                config.storage.storage_dir.clone(),
                config.storage.public_url.clone(),
            )),
        };

        let images: Arc<dyn ImageSource> = Arc::new(HttpImageSource::new(client.clone()));
        let feeds: Arc<dyn FeedSource> = Arc::new(HttpFeedSource::new(client));
        let rasterizer = Rasterizer::with_font_dir(config.http.font_dir.as_deref());
        let compositor = ArtworkCompositor::new(Arc::clone(&images), Arc::clone(&blobs), rasterizer);

        Ok(Self::new(
            Stores::json(Arc::new(JsonStore::new(&config.storage.data_dir))),
            Arc::new(compositor),
            images,
            blobs,
            feeds,
            BatchOptions {
                concurrency: config.concurrency(),
            },
        ))
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    async fn project(&self, project_id: &str) -> Result<Project> {
        self.stores
            .projects
            .get_project(project_id)
            .await?
            .ok_or_else(|| CoverstampError::NotFound(format!("project {}", project_id)))
    }

    async fn episode(&self, episode_id: &str) -> Result<Episode> {
        self.stores
            .episodes
            .get_episode(episode_id)
            .await?
            .ok_or_else(|| CoverstampError::NotFound(format!("episode {}", episode_id)))
    }

    /// Template and base artwork handle, or the configuration error naming
    /// what is missing.
    async fn render_template(&self, project_id: &str) -> Result<(Template, String)> {
        let template = self
            .stores
            .templates
            .get_template(project_id)
            .await?
            .ok_or_else(|| ConfigError::MissingTemplate(project_id.to_string()))?;

        let base = template
            .base_artwork_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingBaseArtwork(project_id.to_string()))?;

        Ok((template, base))
    }

    /// Renders one episode and stores the resulting URL on it.
    #[instrument(skip(self))]
    pub async fn generate_single(&self, episode_id: &str) -> Result<String> {
        let mut episode = self.episode(episode_id).await?;
        let (template, base) = self.render_template(&episode.project_id).await?;
        let input = episode
            .render_input()
            .ok_or_else(|| ConfigError::MissingEpisodeNumber(episode.id.clone()))?;

        let url = self.renderer.render(&base, &input, &template.style).await?;

        episode.generated_artwork_url = Some(url.clone());
        self.stores.episodes.update_episode(&episode).await?;

        info!(episode = %episode.id, url = %url, "Generated artwork");
        Ok(url)
    }

    /// Renders every numbered episode of a project, or only `episode_ids`.
    ///
    /// Template problems abort before any episode is rendered. Episodes
    /// without a number are left out of the run. Each URL is saved onto its
    /// episode as soon as that episode is rendered.
    #[instrument(skip(self, episode_ids))]
    pub async fn generate_batch(
        &self,
        project_id: &str,
        episode_ids: Option<Vec<String>>,
    ) -> Result<BatchSummary> {
        self.project(project_id).await?;
        let (template, base) = self.render_template(project_id).await?;
        template.style.colors()?;

        let wanted: Option<HashSet<String>> = episode_ids.map(|ids| ids.into_iter().collect());
        let episodes = self.stores.episodes.list_episodes(project_id).await?;

        let mut batch = Vec::with_capacity(episodes.len());
        let selected = episodes
            .iter()
            .filter(|e| wanted.as_ref().map_or(true, |ids| ids.contains(&e.id)));
        for episode in selected {
            match episode.render_input() {
                Some(input) => batch.push(BatchEpisode::new(episode.title.clone(), input)),
                None => warn!(episode = %episode.id, "Skipping episode without a number"),
            }
        }

        if batch.is_empty() {
            info!("No episodes to process");
            return Ok(BatchSummary::nothing_to_process());
        }

        let handle = self
            .registry
            .start(project_id, batch.len())
            .ok_or_else(|| CoverstampError::BatchRunning(project_id.to_string()))?;

        let sink = Arc::new(EpisodeArtworkSink {
            episodes: Arc::clone(&self.stores.episodes),
        });
        let orchestrator =
            BatchOrchestrator::new(Arc::clone(&self.renderer), self.batch_options).with_sink(sink);

        Ok(orchestrator
            .run(&base, &template.style, batch, handle.progress, handle.cancel)
            .await)
    }

    /// Asks the project's running batch to stop at its next boundary.
    pub fn cancel_batch(&self, project_id: &str) -> bool {
        self.registry.cancel(project_id)
    }

    pub fn batch_progress(&self, project_id: &str) -> Option<ProgressSnapshot> {
        self.registry.progress(project_id)
    }

    /// Imports a feed into a project.
    ///
    /// The podcast cover is copied into the blob store and becomes the
    /// template's base artwork. Episodes already imported (by GUID) are
    /// skipped unless `options.replace` clears the project first.
    #[instrument(skip(self))]
    pub async fn import_feed(
        &self,
        project_id: &str,
        url: &str,
        options: ImportOptions,
    ) -> Result<ImportSummary> {
        let mut project = self.project(project_id).await?;
        let feed = self.feeds.fetch(url).await?;

        let artwork = match feed.artwork_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(artwork) => Some(
                cache_podcast_artwork(self.images.as_ref(), self.blobs.as_ref(), project_id, artwork)
                    .await,
            ),
            None => None,
        };

        if let Some(artwork) = &artwork {
            let mut template = self
                .stores
                .templates
                .get_template(project_id)
                .await?
                .unwrap_or_default();
            template.base_artwork_url = Some(artwork.clone());
            self.stores.templates.save_template(project_id, &template).await?;
        }

        let mut existing = self.stores.episodes.list_episodes(project_id).await?;
        if options.replace && !existing.is_empty() {
            let removed = self.stores.episodes.delete_episodes(project_id).await?;
            info!(removed, "Cleared existing episodes");
            existing.clear();
        }

        let partition = partition_new(&feed.episodes, &existing, options.replace);
        let numbers = assign_numbers(&partition.new, options.numbering, &existing);
        let new_episodes: Vec<Episode> = partition
            .new
            .iter()
            .zip(numbers)
            .map(|(entry, number)| episode_from_feed(project_id, entry, number))
            .collect();
        let count = new_episodes.len();

        if count > 0 {
            self.stores.episodes.insert_episodes(project_id, new_episodes).await?;
        }

        project.feed_url = Some(url.to_string());
        if artwork.is_some() {
            project.podcast_artwork_url = artwork;
        }
        self.stores.projects.update_project(&project).await?;

        info!(count, total = feed.episodes.len(), "Imported feed");
        Ok(ImportSummary {
            count,
            total: feed.episodes.len(),
            skipped: feed.episodes.len() - count,
            podcast_title: feed.title,
        })
    }

    /// Imports episodes published since the last import.
    ///
    /// Only episodes with a GUID are considered. New episodes keep their feed
    /// number or continue after the highest existing number.
    #[instrument(skip(self))]
    pub async fn sync_feed(&self, project_id: &str) -> Result<ImportSummary> {
        let mut project = self.project(project_id).await?;
        let url = project
            .feed_url
            .clone()
            .ok_or_else(|| ConfigError::MissingFeedUrl(project_id.to_string()))?;

        let feed = self.feeds.fetch(&url).await?;
        let existing = self.stores.episodes.list_episodes(project_id).await?;

        let partition = partition_new(&feed.episodes, &existing, false);
        let candidates: Vec<&FeedEpisode> = partition
            .new
            .into_iter()
            .filter(|entry| entry.guid().is_some())
            .collect();
        let numbers = assign_numbers(&candidates, NumberingPolicy::Continue, &existing);

        let new_episodes: Vec<Episode> = candidates
            .iter()
            .zip(numbers)
            .map(|(entry, number)| episode_from_feed(project_id, entry, number))
            .collect();
        let count = new_episodes.len();

        if count > 0 {
            self.stores.episodes.insert_episodes(project_id, new_episodes).await?;
        }

        project.last_synced_at = Some(Utc::now());
        self.stores.projects.update_project(&project).await?;

        info!(count, "Synced feed");
        Ok(ImportSummary {
            count,
            total: feed.episodes.len(),
            skipped: feed.episodes.len() - count,
            podcast_title: feed.title,
        })
    }

    /// Syncs every project that has a feed and auto-sync turned on.
    ///
    /// One project failing does not stop the others.
    #[instrument(skip(self))]
    pub async fn sync_all(&self) -> Result<Vec<ProjectSync>> {
        let projects: Vec<Project> = self
            .stores
            .projects
            .list_projects()
            .await?
            .into_iter()
            .filter(|p| p.auto_sync && p.feed_url.is_some())
            .collect();
        info!(projects = projects.len(), "Syncing projects");

        let mut results = Vec::with_capacity(projects.len());
        for project in projects {
            let result = match self.sync_feed(&project.id).await {
                Ok(summary) => ProjectSync {
                    project_id: project.id,
                    summary: Some(summary),
                    error: None,
                },
                Err(e) => {
                    warn!(project = %project.id, error = %e, "Project sync failed");
                    ProjectSync {
                        project_id: project.id,
                        summary: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            results.push(result);
        }

        Ok(results)
    }

    /// Turns the periodic sync on or off for a project.
    pub async fn set_auto_sync(&self, project_id: &str, enabled: bool) -> Result<Project> {
        let mut project = self.project(project_id).await?;
        if enabled && project.feed_url.is_none() {
            return Err(ConfigError::MissingFeedUrl(project_id.to_string()).into());
        }
        project.auto_sync = enabled;
        self.stores.projects.update_project(&project).await?;
        Ok(project)
    }

    /// The project's feed with generated artwork in place of the originals.
    #[instrument(skip(self))]
    pub async fn export_feed(&self, project_id: &str) -> Result<FeedExport> {
        let project = self.project(project_id).await?;
        let url = project
            .feed_url
            .ok_or_else(|| ConfigError::MissingFeedUrl(project_id.to_string()))?;

        let feed = self.feeds.fetch(&url).await?;
        let episodes = self.stores.episodes.list_episodes(project_id).await?;

        let export = export_feed(&url, feed, &episodes);
        info!(updated = export.episodes_updated, "Exported feed");
        Ok(export)
    }

    /// Plain-text list of a project's generated artwork URLs.
    pub async fn artwork_urls(&self, project_id: &str) -> Result<String> {
        self.project(project_id).await?;
        let episodes = self.stores.episodes.list_episodes(project_id).await?;
        Ok(artwork_url_list(&episodes))
    }

    /// Zips every generated image of a project as `episode-NNN.png`.
    ///
    /// Images that cannot be downloaded are left out.
    #[instrument(skip(self))]
    pub async fn export_archive(&self, project_id: &str) -> Result<ArtworkArchive> {
        let project = self.project(project_id).await?;
        let episodes = self.stores.episodes.list_episodes(project_id).await?;

        let with_artwork: Vec<(&Episode, &str)> = episodes
            .iter()
            .filter_map(|e| Some((e, e.generated_artwork_url.as_deref()?)))
            .collect();
        if with_artwork.is_empty() {
            return Err(ConfigError::NoGeneratedArtwork(project_id.to_string()).into());
        }

        let mut archive = ArchiveBuilder::new();
        for (episode, url) in with_artwork {
            match self.images.fetch(url).await {
                Ok(image) => archive.add(&archive_entry_name(episode.number.as_deref()), image.bytes),
                Err(e) => warn!(episode = %episode.id, error = %e, "Failed to download artwork"),
            }
        }

        let file_count = archive.len();
        let bytes = tokio::task::spawn_blocking(move || archive.finish())
            .await
            .map_err(|e| CoverstampError::Storage(StorageError::Archive(e.to_string())))??;

        info!(files = file_count, size = bytes.len(), "Built artwork archive");
        Ok(ArtworkArchive {
            filename: archive_file_name(&project.name),
            bytes,
            file_count,
        })
    }

    /// Renumbers every episode of a project from `start`, returning how many
    /// episodes changed.
    #[instrument(skip(self))]
    pub async fn auto_number(&self, project_id: &str, order: RenumberOrder, start: u32) -> Result<usize> {
        self.project(project_id).await?;
        let episodes = self.stores.episodes.list_episodes(project_id).await?;

        let mut changed = 0;
        for assignment in renumber(&episodes, order, start) {
            let Some(episode) = episodes.iter().find(|e| e.id == assignment.episode_id) else {
                continue;
            };
            if episode.number.as_deref() == Some(assignment.number.as_str()) {
                continue;
            }

            let mut updated = episode.clone();
            updated.number = Some(assignment.number);
            self.stores.episodes.update_episode(&updated).await?;
            changed += 1;
        }

        info!(changed, total = episodes.len(), "Renumbered episodes");
        Ok(changed)
    }

    /// Copies episode and season numbers from the project's feed.
    #[instrument(skip(self))]
    pub async fn fix_numbers(&self, project_id: &str) -> Result<FixSummary> {
        let project = self.project(project_id).await?;
        let url = project
            .feed_url
            .ok_or_else(|| ConfigError::MissingFeedUrl(project_id.to_string()))?;

        let feed = self.feeds.fetch(&url).await?;
        let episodes = self.stores.episodes.list_episodes(project_id).await?;

        let fixed = fix_from_feed(&episodes, &feed.episodes);
        for episode in &fixed {
            self.stores.episodes.update_episode(episode).await?;
        }

        info!(updated = fixed.len(), total = episodes.len(), "Fixed episode numbers");
        Ok(FixSummary {
            updated: fixed.len(),
            total: episodes.len(),
        })
    }

    /// Flips an episode's bonus flag and returns the updated episode.
    pub async fn toggle_bonus(&self, episode_id: &str) -> Result<Episode> {
        let mut episode = self.episode(episode_id).await?;
        episode.bonus = !episode.bonus;
        self.stores.episodes.update_episode(&episode).await?;
        Ok(episode)
    }

    /// Points the project's template at a new base artwork.
    pub async fn set_base_artwork(&self, project_id: &str, url: &str) -> Result<Template> {
        self.project(project_id).await?;
        let mut template = self
            .stores
            .templates
            .get_template(project_id)
            .await?
            .unwrap_or_default();
        template.base_artwork_url = Some(url.to_string());
        self.stores.templates.save_template(project_id, &template).await?;
        Ok(template)
    }
}

/// Saves rendered URLs onto their episodes while a batch runs.
struct EpisodeArtworkSink {
    episodes: Arc<dyn EpisodeStore>,
}

#[async_trait]
impl RenderSink for EpisodeArtworkSink {
    async fn rendered(&self, episode_id: &str, url: &str) -> Result<()> {
        let mut episode = self
            .episodes
            .get_episode(episode_id)
            .await?
            .ok_or_else(|| CoverstampError::NotFound(format!("episode {}", episode_id)))?;
        episode.generated_artwork_url = Some(url.to_string());
        self.episodes.update_episode(&episode).await
    }
}

fn episode_from_feed(project_id: &str, entry: &FeedEpisode, number: String) -> Episode {
    let mut episode = Episode::new(project_id, entry.title_or_default());
    episode.description = entry.description.clone();
    episode.audio_url = entry.audio_url.clone();
    episode.published_at = entry.published_at;
    episode.number = Some(number);
    episode.season = entry.season.clone().filter(|s| !s.trim().is_empty());
    episode.guid = entry.guid().map(str::to_string);
    episode.original_artwork_url = entry.artwork_url.clone();
    episode
}
