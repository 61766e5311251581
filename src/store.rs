//! Projects, templates and episodes, and where they are kept.
//!
//! The engine reads and writes through the three store traits. [`JsonStore`]
//! is the bundled implementation: one JSON document per project under
//! `<data_dir>/projects/`.

use crate::compositor::EpisodeInput;
use crate::errors::{CoverstampError, Result};
use crate::numbering::numeric_value;
use crate::style::StyleConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, instrument};
use uuid::Uuid;

/// A podcast project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub feed_url: Option<String>,
    #[serde(default)]
    pub podcast_artwork_url: Option<String>,
    /// Picked up by the periodic feed sync.
    #[serde(default)]
    pub auto_sync: bool,
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The base artwork and style a project renders with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Template {
    pub base_artwork_url: Option<String>,
    pub style: StyleConfig,
}

/// A persisted episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: String,
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub bonus: bool,
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(default)]
    pub original_artwork_url: Option<String>,
    #[serde(default)]
    pub generated_artwork_url: Option<String>,
}

impl Episode {
    /// A new, unnumbered episode with a fresh id.
    pub fn new(project_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            project_id: project_id.into(),
            title: title.into(),
            description: None,
            audio_url: None,
            published_at: None,
            number: None,
            season: None,
            bonus: false,
            guid: None,
            original_artwork_url: None,
            generated_artwork_url: None,
        }
    }

    /// The GUID, if present and not blank.
    pub fn guid(&self) -> Option<&str> {
        self.guid.as_deref().filter(|g| !g.trim().is_empty())
    }

    /// Render input for this episode, or `None` while it has no number.
    pub fn render_input(&self) -> Option<EpisodeInput> {
        let number = self.number.as_deref().map(str::trim).filter(|n| !n.is_empty())?;
        Some(EpisodeInput::new(self.id.clone(), number, self.bonus))
    }
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Creates a project together with its default template.
    async fn create_project(&self, name: &str) -> Result<Project>;

    async fn get_project(&self, id: &str) -> Result<Option<Project>>;

    async fn update_project(&self, project: &Project) -> Result<()>;

    async fn list_projects(&self) -> Result<Vec<Project>>;
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get_template(&self, project_id: &str) -> Result<Option<Template>>;

    async fn save_template(&self, project_id: &str, template: &Template) -> Result<()>;
}

#[async_trait]
pub trait EpisodeStore: Send + Sync {
    /// Episodes of a project, highest number first.
    async fn list_episodes(&self, project_id: &str) -> Result<Vec<Episode>>;

    async fn get_episode(&self, id: &str) -> Result<Option<Episode>>;

    async fn insert_episodes(&self, project_id: &str, episodes: Vec<Episode>) -> Result<()>;

    async fn update_episode(&self, episode: &Episode) -> Result<()>;

    /// Removes every episode of a project, returning how many there were.
    async fn delete_episodes(&self, project_id: &str) -> Result<usize>;
}

/// Orders episodes the way listings show them: numeric value descending,
/// unnumbered last.
pub fn sort_for_listing(episodes: &mut [Episode]) {
    episodes.sort_by_key(|e| Reverse(numeric_value(e.number.as_deref())));
}

#[derive(Debug, Serialize, Deserialize)]
struct ProjectDocument {
    project: Project,
    #[serde(default)]
    template: Option<Template>,
    #[serde(default)]
    episodes: Vec<Episode>,
}

/// File-backed store keeping one JSON document per project.
///
/// Writes go through a single lock so read-modify-write cycles from
/// concurrent batch tasks never interleave.
#[derive(Debug)]
pub struct JsonStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl JsonStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            root: data_dir.as_ref().join("projects"),
            lock: Mutex::new(()),
        }
    }

    fn document_path(&self, project_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", project_id))
    }

    async fn load(&self, project_id: &str) -> Result<Option<ProjectDocument>> {
        // Ids become file names; anything path-like cannot be a project.
        if project_id.is_empty() || project_id.contains(['/', '\\', '.']) {
            return Ok(None);
        }

        match tokio::fs::read(self.document_path(project_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_existing(&self, project_id: &str) -> Result<ProjectDocument> {
        self.load(project_id)
            .await?
            .ok_or_else(|| CoverstampError::NotFound(format!("project {}", project_id)))
    }

    async fn save(&self, document: &ProjectDocument) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;

        let path = self.document_path(&document.project.id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(document)?).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(project = %document.project.id, "Saved project document");
        Ok(())
    }

    async fn documents(&self) -> Result<Vec<ProjectDocument>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut documents = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            documents.push(serde_json::from_slice(&bytes)?);
        }

        Ok(documents)
    }
}

#[async_trait]
impl ProjectStore for JsonStore {
    #[instrument(skip(self))]
    async fn create_project(&self, name: &str) -> Result<Project> {
        let _guard = self.lock.lock().await;

        let project = Project {
            id: Uuid::now_v7().to_string(),
            name: name.to_string(),
            feed_url: None,
            podcast_artwork_url: None,
            auto_sync: false,
            last_synced_at: None,
            created_at: Utc::now(),
        };

        self.save(&ProjectDocument {
            project: project.clone(),
            template: Some(Template::default()),
            episodes: Vec::new(),
        })
        .await?;

        Ok(project)
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        Ok(self.load(id).await?.map(|doc| doc.project))
    }

    async fn update_project(&self, project: &Project) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut document = self.load_existing(&project.id).await?;
        document.project = project.clone();
        self.save(&document).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let mut projects: Vec<Project> = self
            .documents()
            .await?
            .into_iter()
            .map(|doc| doc.project)
            .collect();
        projects.sort_by_key(|p| p.created_at);
        Ok(projects)
    }
}

#[async_trait]
impl TemplateStore for JsonStore {
    async fn get_template(&self, project_id: &str) -> Result<Option<Template>> {
        Ok(self.load(project_id).await?.and_then(|doc| doc.template))
    }

    async fn save_template(&self, project_id: &str, template: &Template) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut document = self.load_existing(project_id).await?;
        document.template = Some(template.clone());
        self.save(&document).await
    }
}

#[async_trait]
impl EpisodeStore for JsonStore {
    async fn list_episodes(&self, project_id: &str) -> Result<Vec<Episode>> {
        let mut episodes = self
            .load(project_id)
            .await?
            .map(|doc| doc.episodes)
            .unwrap_or_default();
        sort_for_listing(&mut episodes);
        Ok(episodes)
    }

    async fn get_episode(&self, id: &str) -> Result<Option<Episode>> {
        Ok(self
            .documents()
            .await?
            .into_iter()
            .flat_map(|doc| doc.episodes)
            .find(|e| e.id == id))
    }

    #[instrument(skip(self, episodes), fields(count = episodes.len()))]
    async fn insert_episodes(&self, project_id: &str, episodes: Vec<Episode>) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut document = self.load_existing(project_id).await?;
        document.episodes.extend(episodes);
        self.save(&document).await
    }

    async fn update_episode(&self, episode: &Episode) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut document = self.load_existing(&episode.project_id).await?;

        let slot = document
            .episodes
            .iter_mut()
            .find(|e| e.id == episode.id)
            .ok_or_else(|| CoverstampError::NotFound(format!("episode {}", episode.id)))?;
        *slot = episode.clone();

        self.save(&document).await
    }

    async fn delete_episodes(&self, project_id: &str) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let mut document = self.load_existing(project_id).await?;
        let removed = document.episodes.len();
        document.episodes.clear();
        self.save(&document).await?;
        Ok(removed)
    }
}
