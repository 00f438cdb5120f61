use std::time::Duration;

use tokio::sync::watch;
use tokio::time::interval;

use crate::ServiceState;

/// What one sweep removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Swept {
    pub sessions: usize,
    pub buckets: usize,
}

/// Drop expired session keys and rate-limit buckets with nothing left in
/// their window
pub fn sweep(state: &ServiceState) -> Swept {
    Swept {
        sessions: state.sessions().purge_expired(),
        buckets: state.limiter().prune(),
    }
}

/// Sweep every `period` until `shutdown_rx` fires
pub async fn run(state: ServiceState, period: Duration, mut shutdown_rx: watch::Receiver<()>) {
    let mut timer = interval(period);
    // the first tick completes immediately
    timer.tick().await;

    tracing::info!(period_secs = period.as_secs(), "session sweeper started");
    loop {
        tokio::select! {
            _ = timer.tick() => {
                let swept = sweep(&state);
                if swept != Swept::default() {
                    tracing::debug!(
                        sessions = swept.sessions,
                        buckets = swept.buckets,
                        "swept expired entries"
                    );
                }
            }
            _ = shutdown_rx.changed() => {
                tracing::info!("session sweeper shutting down");
                break;
            }
        }
    }
}
