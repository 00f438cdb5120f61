use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const REQUEST_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Process-wide shutdown fan-out
///
/// `waiter` finishes once SIGINT or SIGTERM arrives, after notifying every
/// receiver. Workers hold a [`subscribe`](Self::subscribe)d receiver and stop
/// on its first change.
pub struct ShutdownSignal {
    pub waiter: JoinHandle<()>,
    trigger: watch::Sender<()>,
    receiver: watch::Receiver<()>,
}

impl ShutdownSignal {
    /// Install the SIGINT and SIGTERM handlers and spawn the waiter
    pub fn install() -> std::io::Result<Self> {
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        let (trigger, receiver) = watch::channel(());
        let signal_tx = trigger.clone();

        let waiter = tokio::spawn(async move {
            tokio::select! {
                _ = sigint.recv() => {
                    tracing::debug!("gracefully exiting immediately on SIGINT");
                }
                _ = sigterm.recv() => {
                    tokio::time::sleep(REQUEST_GRACE_PERIOD).await;
                    tracing::debug!("initiating graceful shutdown with delay on SIGTERM");
                }
            }

            let _ = signal_tx.send(());
        });

        Ok(Self {
            waiter,
            trigger,
            receiver,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<()> {
        self.receiver.clone()
    }

    /// Stop every subscriber without waiting for a signal
    pub fn trigger(&self) {
        let _ = self.trigger.send(());
    }
}

/// Registers a panic hook that logs panics using the `tracing` crate
pub fn register_panic_logger() {
    std::panic::set_hook(Box::new(|panic| match panic.location() {
        Some(loc) => {
            tracing::error!(
                message = %panic,
                panic.file = loc.file(),
                panic.line = loc.line(),
                panic.column = loc.column(),
            );
        }
        None => tracing::error!(message = %panic),
    }));
}

pub fn report_build_info() {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        build_profile = if cfg!(debug_assertions) { "debug" } else { "release" },
        "service starting up"
    );
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_subscribers() {
        let shutdown = ShutdownSignal::install().unwrap();
        let mut first = shutdown.subscribe();
        let mut second = shutdown.subscribe();

        shutdown.trigger();
        assert!(first.changed().await.is_ok());
        assert!(second.changed().await.is_ok());
        assert!(!shutdown.waiter.is_finished());
        shutdown.waiter.abort();
    }
}
