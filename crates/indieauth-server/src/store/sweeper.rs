//! Background garbage collection for expiring stores.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use super::Expiring;

/// Sweep `store` every `period` until `shutdown` turns `true` or its sender
/// is dropped.
pub fn spawn(
    name: &'static str,
    store: Arc<dyn Expiring>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(store = name, period_ms = period.as_millis(), "Sweeper started");

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match store.gc().await {
                        Ok(0) => {}
                        Ok(removed) => debug!(store = name, removed, "Swept expired entries"),
                        Err(e) => warn!(store = name, error = %e, "Sweep failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(store = name, "Sweeper shutting down");
                        break;
                    }
                }
            }
        }
    })
}
