//! Periodic expiry of silent peers.

use peerdex_registry::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Runs [`Registry::sweep`] every `interval` until `shutdown` fires.
///
/// The first sweep happens one full interval after start.
pub async fn run_sweeper(
    registry: Arc<Registry>,
    interval: Duration,
    timeout: Duration,
    shutdown: CancellationToken,
) {
    info!(
        interval_ms = interval.as_millis(),
        timeout_secs = timeout.as_secs(),
        "Sweeper started"
    );

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let removed = registry.sweep(timeout);
                if removed > 0 {
                    let stats = registry.stats();
                    info!(
                        removed,
                        peers = stats.peers,
                        files = stats.files,
                        "Expired silent peers"
                    );
                } else {
                    debug!("Sweep found no expired peers");
                }
            }
        }
    }

    info!("Sweeper stopped");
}
