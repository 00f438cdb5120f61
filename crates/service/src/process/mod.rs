mod sweeper;
mod utils;

use std::time::Duration;

use futures::future::join_all;
use tokio::time::timeout;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use sweeper::{sweep, Swept};

use crate::http_server;
use crate::{Config, ServiceState};

const FINAL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

const LOG_FILE_PREFIX: &str = "securemail.log";

/// Install the global subscriber: compact stdout, plus a daily rolling file
/// when `log_dir` is set. The returned guards flush on drop.
pub fn init_logging(config: &Config) -> Vec<WorkerGuard> {
    let mut guards = Vec::new();
    let env_filter = || {
        EnvFilter::builder()
            .with_default_directive(config.log_level.into())
            .from_env_lossy()
    };

    let (stdout_writer, guard) = tracing_appender::non_blocking(std::io::stdout());
    guards.push(guard);
    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stdout_writer)
        .with_filter(env_filter());

    let file_layer = config.log_dir.as_ref().map(|log_dir| {
        let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
        let (file_writer, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_writer)
            .with_filter(env_filter())
    });

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    guards
}

/// Run the service until SIGINT or SIGTERM
pub async fn spawn_service(config: &Config) {
    let _guards = init_logging(config);

    utils::register_panic_logger();
    utils::report_build_info();

    let shutdown = match utils::ShutdownSignal::install() {
        Ok(shutdown) => shutdown,
        Err(e) => {
            tracing::error!("unable to install signal handlers: {}", e);
            std::process::exit(2);
        }
    };

    let state = match ServiceState::from_config(config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("error creating server state: {}", e);
            std::process::exit(3);
        }
    };

    let mut handles = Vec::new();

    let api_state = state.clone();
    let api_rx = shutdown.subscribe();
    handles.push(tokio::spawn(async move {
        if let Err(e) = http_server::run(api_state, api_rx).await {
            tracing::error!("API server error: {}", e);
        }
    }));

    let sweep_period = Duration::from_secs(config.sweep_interval_secs);
    handles.push(tokio::spawn(sweeper::run(
        state.clone(),
        sweep_period,
        shutdown.subscribe(),
    )));

    let _ = shutdown.waiter.await;

    if timeout(FINAL_SHUTDOWN_TIMEOUT, join_all(handles))
        .await
        .is_err()
    {
        tracing::error!(
            "Failed to shut down within {} seconds",
            FINAL_SHUTDOWN_TIMEOUT.as_secs()
        );
        std::process::exit(4);
    }
}
