//! Periodic background refresh of expired sources.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::RiskEngine;

/// Sweep all categories every `interval` until `cancel` fires.
///
/// The first sweep runs immediately. A sweep interrupted by cancellation
/// leaves no partial entries: cache entries are written whole after a fetch
/// resolves.
pub fn spawn_refresh_loop(
    engine: RiskEngine,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Refresh loop started (every {}s)", interval.as_secs());

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                report = engine.sweep() => {
                    if report.success() {
                        info!("Refresh sweep: {} sources current", report.refreshed.len());
                    } else {
                        warn!(
                            "Refresh sweep: {} current, {} failed",
                            report.refreshed.len(),
                            report.failed.len()
                        );
                    }
                }
            }
        }

        info!("Refresh loop stopped");
    })
}
