//! Worker pool: owns the schedulers and the shutdown signal.
//!
//! The pool validates its inputs once, spawns the configured number of
//! schedulers, and hands back a handle whose only jobs are flipping the
//! shutdown flag and waiting for everything to wind down.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::client::{EngineClient, LeaseClient};
use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::registry::HandlerRegistry;
use crate::scheduler::PollScheduler;

/// Running worker: a set of schedulers sharing one registry and one client.
#[derive(Debug)]
pub struct WorkerPool {
    shutdown: watch::Sender<bool>,
    schedulers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start against a real engine, building the HTTP client from config.
    pub fn start(config: WorkerConfig, registry: HandlerRegistry) -> Result<Self, WorkerError> {
        let client = Arc::new(EngineClient::new(&config)?);
        Self::start_with_client(config, registry, client)
    }

    /// Start with an explicit client. This is also the test seam.
    pub fn start_with_client(
        config: WorkerConfig,
        registry: HandlerRegistry,
        client: Arc<dyn LeaseClient>,
    ) -> Result<Self, WorkerError> {
        config.validate()?;
        if registry.is_empty() {
            return Err(WorkerError::EmptyRegistry);
        }

        info!(
            worker_id = %config.worker_id,
            engine = %config.base_url,
            topics = ?registry.topics(),
            schedulers = config.schedulers,
            "starting worker pool"
        );

        let registry = Arc::new(registry);
        let (shutdown, _) = watch::channel(false);
        let schedulers = (0..config.schedulers)
            .map(|id| {
                let scheduler = PollScheduler::new(
                    id,
                    Arc::clone(&client),
                    Arc::clone(&registry),
                    config.clone(),
                );
                tokio::spawn(scheduler.run(shutdown.subscribe()))
            })
            .collect();

        Ok(Self {
            shutdown,
            schedulers,
        })
    }

    /// Flip the shutdown flag without waiting. Safe to call more than once.
    pub fn request_shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Signal shutdown and wait until every scheduler has drained.
    pub async fn shutdown_and_join(self) {
        let _ = self.shutdown.send(true);
        for handle in self.schedulers {
            let _ = handle.await;
        }
        info!("worker pool stopped");
    }
}
