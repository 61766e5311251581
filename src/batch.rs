//! Batch artwork generation.
//!
//! A run walks the episode list in input order, in waves of `concurrency`
//! episodes. The cancellation token is checked before every wave, so with the
//! default concurrency of one it is checked before every episode. Renders
//! already in flight always finish. One episode failing never stops the run.
//!
//! Each successful render is handed to the run's [`RenderSink`] before the
//! next wave starts, so a run that is dropped halfway keeps what it already
//! published. A dropped run also settles its progress as cancelled.

use crate::compositor::EpisodeInput;
use crate::errors::Result;
use crate::style::StyleConfig;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Renders one episode's artwork and returns its URL.
#[async_trait]
pub trait ArtworkRenderer: Send + Sync {
    async fn render(
        &self,
        base_image: &str,
        episode: &EpisodeInput,
        style: &StyleConfig,
    ) -> Result<String>;
}

/// Receives every successful render while the run is still going.
#[async_trait]
pub trait RenderSink: Send + Sync {
    /// Records `url` for the episode. An error fails that episode.
    async fn rendered(&self, episode_id: &str, url: &str) -> Result<()>;
}

/// Lifecycle of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

impl BatchState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => BatchState::Running,
            2 => BatchState::Completed,
            3 => BatchState::Cancelled,
            _ => BatchState::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            BatchState::Idle => 0,
            BatchState::Running => 1,
            BatchState::Completed => 2,
            BatchState::Cancelled => 3,
        }
    }
}

/// Live counters for one run, safe to read while the run is going.
///
/// `completed + failed` never exceeds `total`, and neither counter ever
/// decreases.
#[derive(Debug)]
pub struct BatchProgress {
    total: usize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    state: AtomicU8,
    errors: Mutex<Vec<String>>,
}

/// Point-in-time copy of [`BatchProgress`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub state: BatchState,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            state: AtomicU8::new(BatchState::Idle.as_u8()),
            errors: Mutex::new(Vec::new()),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> BatchState {
        BatchState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            state: self.state(),
            total: self.total,
            completed: self.completed(),
            failed: self.failed(),
            errors: self.errors(),
        }
    }

    fn set_state(&self, state: BatchState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Moves a run that never settled to `Cancelled`.
    fn abandon(&self) {
        for from in [BatchState::Idle, BatchState::Running] {
            let _ = self.state.compare_exchange(
                from.as_u8(),
                BatchState::Cancelled.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
        }
    }

    fn record_success(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn record_failure(&self, error: String) {
        // Push before counting so a reader never sees a count without its message.
        self.errors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(error);
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

/// How one attempted episode ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum RenderOutcome {
    Success { url: String },
    Failure { message: String },
}

/// The result for one attempted episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResult {
    pub id: String,
    #[serde(flatten)]
    pub outcome: RenderOutcome,
}

impl RenderResult {
    pub fn url(&self) -> Option<&str> {
        match &self.outcome {
            RenderOutcome::Success { url } => Some(url),
            RenderOutcome::Failure { .. } => None,
        }
    }
}

/// An episode queued for a batch, with the title used in error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEpisode {
    pub title: String,
    pub input: EpisodeInput,
}

impl BatchEpisode {
    pub fn new(title: impl Into<String>, input: EpisodeInput) -> Self {
        Self {
            title: title.into(),
            input,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Episodes rendered at once; zero is treated as one.
    pub concurrency: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

/// Final report of a batch run.
///
/// `success` is true whenever the run had episodes to work on, even if some
/// of them failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub processed: usize,
    pub total: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    pub cancelled: bool,
    #[serde(skip)]
    pub results: Vec<RenderResult>,
}

impl BatchSummary {
    /// Report for a run that had no episodes to render.
    pub fn nothing_to_process() -> Self {
        Self {
            success: false,
            message: Some("No episodes to process".to_string()),
            processed: 0,
            total: 0,
            failed: 0,
            errors: Vec::new(),
            cancelled: false,
            results: Vec::new(),
        }
    }
}

/// Settles the progress of a run future dropped before it finished.
struct RunGuard(Arc<BatchProgress>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.abandon();
    }
}

/// Drives an [`ArtworkRenderer`] over a list of episodes.
pub struct BatchOrchestrator {
    renderer: Arc<dyn ArtworkRenderer>,
    sink: Option<Arc<dyn RenderSink>>,
    options: BatchOptions,
}

impl BatchOrchestrator {
    pub fn new(renderer: Arc<dyn ArtworkRenderer>, options: BatchOptions) -> Self {
        Self {
            renderer,
            sink: None,
            options,
        }
    }

    /// Hands every successful render to `sink` as soon as it finishes.
    pub fn with_sink(mut self, sink: Arc<dyn RenderSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Runs the batch to completion or cancellation.
    ///
    /// `progress` must have been created with `episodes.len()` as its total.
    /// Results are returned in input order; episodes never started because of
    /// cancellation have no result. An empty list completes at once with
    /// [`BatchSummary::nothing_to_process`].
    #[instrument(skip_all, fields(total = episodes.len(), concurrency = self.options.concurrency))]
    pub async fn run(
        &self,
        base_image: &str,
        style: &StyleConfig,
        episodes: Vec<BatchEpisode>,
        progress: Arc<BatchProgress>,
        cancel: CancellationToken,
    ) -> BatchSummary {
        let start_time = std::time::Instant::now();
        let wave_size = self.options.concurrency.max(1);
        let total = episodes.len();

        if episodes.is_empty() {
            progress.set_state(BatchState::Completed);
            info!("Batch has no episodes to process");
            return BatchSummary::nothing_to_process();
        }

        let _guard = RunGuard(Arc::clone(&progress));

        let base_image: Arc<str> = Arc::from(base_image);
        let style = Arc::new(style.clone());
        let mut results: Vec<RenderResult> = Vec::with_capacity(total);
        let mut cancelled = false;

        progress.set_state(BatchState::Running);
        info!("Batch started");

        for wave in episodes.chunks(wave_size) {
            if cancel.is_cancelled() {
                cancelled = true;
                info!(attempted = results.len(), "Batch cancelled");
                break;
            }

            let mut tasks = JoinSet::new();
            for (offset, episode) in wave.iter().cloned().enumerate() {
                let renderer = Arc::clone(&self.renderer);
                let sink = self.sink.clone();
                let base_image = Arc::clone(&base_image);
                let style = Arc::clone(&style);
                let progress = Arc::clone(&progress);

                tasks.spawn(async move {
                    let rendered = match renderer.render(&base_image, &episode.input, &style).await {
                        Ok(url) => match &sink {
                            Some(sink) => sink.rendered(&episode.input.id, &url).await.map(|()| url),
                            None => Ok(url),
                        },
                        Err(e) => Err(e),
                    };

                    let outcome = match rendered {
                        Ok(url) => {
                            progress.record_success();
                            debug!(episode = %episode.input.id, "Episode rendered");
                            RenderOutcome::Success { url }
                        }
                        Err(e) => {
                            let message = e.to_string();
                            warn!(episode = %episode.input.id, error = %message, "Episode failed");
                            progress.record_failure(format!("{}: {}", episode.title, message));
                            RenderOutcome::Failure { message }
                        }
                    };

                    (
                        offset,
                        RenderResult {
                            id: episode.input.id,
                            outcome,
                        },
                    )
                });
            }

            let mut finished: Vec<Option<RenderResult>> = vec![None; wave.len()];
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((offset, result)) => finished[offset] = Some(result),
                    Err(e) => warn!(error = %e, "Render task did not finish"),
                }
            }

            // A task that panicked still counts as attempted.
            for (slot, episode) in finished.into_iter().zip(wave) {
                let result = slot.unwrap_or_else(|| {
                    let message = "render task did not finish".to_string();
                    progress.record_failure(format!("{}: {}", episode.title, message));
                    RenderResult {
                        id: episode.input.id.clone(),
                        outcome: RenderOutcome::Failure { message },
                    }
                });
                results.push(result);
            }
        }

        progress.set_state(if cancelled {
            BatchState::Cancelled
        } else {
            BatchState::Completed
        });

        let snapshot = progress.snapshot();
        info!(
            completed = snapshot.completed,
            failed = snapshot.failed,
            cancelled,
            duration = ?start_time.elapsed(),
            "Batch finished"
        );

        BatchSummary {
            success: true,
            message: None,
            processed: snapshot.completed,
            total,
            failed: snapshot.failed,
            errors: snapshot.errors,
            cancelled,
            results,
        }
    }
}

/// Progress and cancellation for one project's run.
#[derive(Debug, Clone)]
pub struct BatchHandle {
    pub progress: Arc<BatchProgress>,
    pub cancel: CancellationToken,
}

/// Tracks the latest run per project so it can be polled and cancelled from
/// elsewhere.
#[derive(Debug, Default)]
pub struct BatchRegistry {
    runs: Mutex<HashMap<String, BatchHandle>>,
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new run, or returns `None` while one is still running.
    pub fn start(&self, project_id: &str, total: usize) -> Option<BatchHandle> {
        let mut runs = self.runs.lock().unwrap_or_else(|p| p.into_inner());

        let busy = runs.get(project_id).is_some_and(|handle| {
            matches!(handle.progress.state(), BatchState::Idle | BatchState::Running)
        });
        if busy {
            return None;
        }

        let handle = BatchHandle {
            progress: Arc::new(BatchProgress::new(total)),
            cancel: CancellationToken::new(),
        };
        runs.insert(project_id.to_string(), handle.clone());
        Some(handle)
    }

    pub fn progress(&self, project_id: &str) -> Option<ProgressSnapshot> {
        self.runs
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(project_id)
            .map(|handle| handle.progress.snapshot())
    }

    /// Signals the project's run to stop at its next wave boundary.
    ///
    /// Returns false when nothing is running.
    pub fn cancel(&self, project_id: &str) -> bool {
        let runs = self.runs.lock().unwrap_or_else(|p| p.into_inner());
        match runs.get(project_id) {
            Some(handle)
                if matches!(handle.progress.state(), BatchState::Idle | BatchState::Running) =>
            {
                handle.cancel.cancel();
                true
            }
            _ => false,
        }
    }
}
