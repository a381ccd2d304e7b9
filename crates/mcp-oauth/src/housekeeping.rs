//! Periodic expired token cleanup.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::token::OpaqueTokenService;

/// Spawns a task that purges expired tokens every `interval`.
///
/// The first run happens one `interval` after spawning. The task exits when
/// the `shutdown` receiver fires or its sender is dropped.
pub fn spawn_cleanup_task(
    service: Arc<OpaqueTokenService>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval = ?interval, "Token cleanup task started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    service.cleanup_expired_tokens().await;
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Token cleanup task shutting down");
                    break;
                }
            }
        }
    })
}
