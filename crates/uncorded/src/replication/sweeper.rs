//! Background expiry sweep.

use std::sync::Arc;
use std::time::Duration;

use super::SetRegistry;

/// Periodically garbage-collect every registered collection until shutdown
pub async fn gc_worker(
    registry: Arc<SetRegistry>,
    interval: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    tracing::info!(interval = ?interval, "GC sweeper started");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let removed = registry.gc_all();
                if removed > 0 {
                    tracing::debug!(removed, "Swept expired records");
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("GC sweeper shutting down");
                break;
            }
        }
    }
}
