//! Periodic feed sync for projects with auto-sync turned on.
//!
//! Runs [`ArtworkService::sync_all`] once at startup and then on a fixed
//! interval until cancelled.

use crate::service::ArtworkService;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Run the sync loop until `cancel` is triggered.
pub async fn run(service: Arc<ArtworkService>, every: Duration, cancel: CancellationToken) {
    info!(interval_secs = every.as_secs(), "Feed sync job started");

    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Feed sync job stopping");
                break;
            }
            _ = interval.tick() => {
                match service.sync_all().await {
                    Ok(results) => {
                        let imported: usize = results
                            .iter()
                            .filter_map(|r| r.summary.as_ref())
                            .map(|s| s.count)
                            .sum();
                        let failed = results.iter().filter(|r| r.error.is_some()).count();
                        if imported > 0 || failed > 0 {
                            info!(projects = results.len(), imported, failed, "Feed sync pass finished");
                        } else {
                            debug!(projects = results.len(), "Feed sync pass found nothing new");
                        }
                    }
                    Err(e) => error!(error = %e, "Feed sync pass failed"),
                }
            }
        }
    }
}
