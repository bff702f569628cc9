//! Insurance worker entry point.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use extask_core::{HandlerRegistry, WorkerConfig, WorkerError, WorkerPool};
use extask_worker::handlers::{self, notify::LogNotifier};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "worker failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), WorkerError> {
    let config = WorkerConfig::from_env()?;
    let mut registry = HandlerRegistry::new();
    handlers::register_all(&mut registry, Arc::new(LogNotifier))?;

    let pool = WorkerPool::start(config, registry)?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for the shutdown signal");
    }
    info!("shutdown requested");
    pool.shutdown_and_join().await;
    Ok(())
}
