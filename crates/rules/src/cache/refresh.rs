//! Periodic cache refresh.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::CollectionCache;

/// Refresh `cache` every `period` until `shutdown` flips to `true`.
///
/// The first refresh happens one period after the call; load the cache
/// once before spawning. Failed refreshes are logged by the cache and the
/// loop keeps going. A slow refresh delays the next tick instead of
/// bursting to catch up.
pub fn spawn_refresh_task(
    cache: Arc<CollectionCache>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period_secs = period.as_secs_f64(), "collection refresh task started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Ok(count) = cache.refresh().await {
                        debug!(collections = count, "scheduled refresh complete");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("collection refresh task stopped");
    })
}
