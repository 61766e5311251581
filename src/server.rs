//! HTTP API for artwork generation.
//!
//! Single renders and whole-project batches, progress polling and
//! cancellation for a running batch, feed sync and artwork exports. While the
//! server runs, projects with auto-sync on are synced in the background.

use crate::errors::{CoverstampError, ServerError};
use crate::service::ArtworkService;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared by all handlers
#[derive(Clone)]
struct AppState {
    service: Arc<ArtworkService>,
}

/// Body of a batch request; an empty body renders every episode.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BatchRequest {
    pub episode_ids: Option<Vec<String>>,
}

/// Body of an auto-sync toggle.
#[derive(Debug, Deserialize)]
pub struct AutoSyncRequest {
    pub enabled: bool,
}

impl IntoResponse for CoverstampError {
    fn into_response(self) -> Response {
        let status = StatusCode::from(&self);
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Middleware to add Server header to all responses
async fn add_server_header(request: axum::extract::Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    let server_header = format!("coverstamp/{}", env!("CARGO_PKG_VERSION"));
    if let Ok(header_value) = axum::http::HeaderValue::from_str(&server_header) {
        response
            .headers_mut()
            .insert(axum::http::header::SERVER, header_value);
    }

    response
}

/// Builds the API router.
pub fn router(service: Arc<ArtworkService>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/episodes/{id}/artwork", post(generate_single_handler))
        .route("/projects/{id}/artwork", post(generate_batch_handler))
        .route("/projects/{id}/artwork/progress", get(progress_handler))
        .route("/projects/{id}/artwork/cancel", post(cancel_handler))
        .route("/projects/{id}/artwork/urls", get(artwork_urls_handler))
        .route("/projects/{id}/archive", get(archive_handler))
        .route("/projects/{id}/feed", get(feed_export_handler))
        .route("/projects/{id}/sync", post(sync_handler))
        .route("/projects/{id}/auto-sync", put(auto_sync_handler))
        .layer(middleware::from_fn(add_server_header))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service })
}

/// Parses `host:port`, a bare host or a bare port, filling in the defaults.
pub fn parse_address(
    address: &str,
    default_host: IpAddr,
    default_port: u16,
) -> Result<SocketAddr, ServerError> {
    let address = address.trim();
    if address.is_empty() {
        return Ok(SocketAddr::new(default_host, default_port));
    }

    if let Ok(addr) = address.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = address.trim_matches(['[', ']']).parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, default_port));
    }
    if let Ok(port) = address.trim_start_matches(':').parse::<u16>() {
        return Ok(SocketAddr::new(default_host, port));
    }

    Err(ServerError::InvalidAddress(address.to_string()))
}

/// Starts the HTTP server with graceful shutdown.
///
/// With a `sync_interval`, the feed sync job runs alongside the server and
/// stops with it.
pub async fn start_server(
    addr: SocketAddr,
    service: Arc<ArtworkService>,
    sync_interval: Option<Duration>,
) -> Result<(), ServerError> {
    let app = router(Arc::clone(&service));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::BindError(format!("{}: {}", addr, e)))?;

    let stop_sync = CancellationToken::new();
    let sync_job = sync_interval
        .map(|every| tokio::spawn(crate::autosync::run(service, every, stop_sync.clone())));

    info!("Listening on http://{}", addr);
    info!("Server starting, press Ctrl+C to shut down.");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::BindError(e.to_string()));

    stop_sync.cancel();
    if let Some(job) = sync_job {
        if let Err(e) = job.await {
            tracing::warn!(error = %e, "Feed sync job did not stop cleanly");
        }
    }

    served
}

/// Listens for the shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Ctrl+C received, starting graceful shutdown.");
        },
        _ = terminate => {
            info!("Terminate signal received, starting graceful shutdown.");
        },
    }
}

/// Endpoint: GET /health
async fn health_handler() -> Response {
    ([(axum::http::header::CONTENT_TYPE, "text/plain")], "OK").into_response()
}

/// Endpoint: POST /episodes/{id}/artwork
async fn generate_single_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, CoverstampError> {
    let url = state.service.generate_single(&id).await?;
    Ok(Json(json!({ "url": url })).into_response())
}

/// Endpoint: POST /projects/{id}/artwork
///
/// Blocks until the batch finishes or is cancelled.
async fn generate_batch_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, CoverstampError> {
    let request: BatchRequest = if body.iter().all(u8::is_ascii_whitespace) {
        BatchRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ServerError::InvalidRequest(e.to_string()))?
    };

    let summary = state.service.generate_batch(&id, request.episode_ids).await?;
    Ok(Json(summary).into_response())
}

/// Endpoint: GET /projects/{id}/artwork/progress
async fn progress_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, CoverstampError> {
    let progress = state
        .service
        .batch_progress(&id)
        .ok_or_else(|| CoverstampError::NotFound(format!("batch for project {}", id)))?;
    Ok(Json(progress).into_response())
}

/// Endpoint: POST /projects/{id}/artwork/cancel
async fn cancel_handler(Path(id): Path<String>, State(state): State<AppState>) -> Response {
    let cancelled = state.service.cancel_batch(&id);
    Json(json!({ "cancelled": cancelled })).into_response()
}

/// Endpoint: GET /projects/{id}/artwork/urls
async fn artwork_urls_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, CoverstampError> {
    let list = state.service.artwork_urls(&id).await?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], list).into_response())
}

/// Endpoint: GET /projects/{id}/archive
async fn archive_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, CoverstampError> {
    let archive = state.service.export_archive(&id).await?;
    let disposition = format!("attachment; filename=\"{}\"", archive.filename);

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        archive.bytes,
    )
        .into_response())
}

/// Endpoint: GET /projects/{id}/feed
async fn feed_export_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, CoverstampError> {
    let export = state.service.export_feed(&id).await?;
    Ok(Json(export).into_response())
}

/// Endpoint: POST /projects/{id}/sync
async fn sync_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, CoverstampError> {
    let summary = state.service.sync_feed(&id).await?;
    Ok(Json(summary).into_response())
}

/// Endpoint: PUT /projects/{id}/auto-sync
async fn auto_sync_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, CoverstampError> {
    let request: AutoSyncRequest =
        serde_json::from_slice(&body).map_err(|e| ServerError::InvalidRequest(e.to_string()))?;

    let project = state.service.set_auto_sync(&id, request.enabled).await?;
    Ok(Json(project).into_response())
}
