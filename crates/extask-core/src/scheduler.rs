//! Poll scheduler: the fetch/dispatch loop of one worker.
//!
//! Each scheduler owns a semaphore sized to its concurrency ceiling and
//! never asks the engine for more tasks than it has permits free, so
//! back-pressure happens at the fetch boundary instead of in a local queue.
//! Claims are dispatched into a [`JoinSet`]; on shutdown the set is drained
//! within the grace window and whatever is still running gets aborted and
//! left to lock expiry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::client::{LeaseClient, TopicLease};
use crate::config::WorkerConfig;
use crate::domain::{Outcome, TaskClaim};
use crate::executor::TaskExecutor;
use crate::registry::HandlerRegistry;

pub(crate) struct PollScheduler {
    id: u32,
    client: Arc<dyn LeaseClient>,
    registry: Arc<HandlerRegistry>,
    executor: Arc<TaskExecutor>,
    config: WorkerConfig,
    topics: Vec<TopicLease>,
    semaphore: Arc<Semaphore>,
}

impl PollScheduler {
    pub(crate) fn new(
        id: u32,
        client: Arc<dyn LeaseClient>,
        registry: Arc<HandlerRegistry>,
        config: WorkerConfig,
    ) -> Self {
        let topics = TopicLease::from_registry(&registry);
        let executor = Arc::new(TaskExecutor::new(
            Arc::clone(&client),
            config.lock_safety_margin,
        ));
        let semaphore = Arc::new(Semaphore::new(config.max_tasks as usize));
        Self {
            id,
            client,
            registry,
            executor,
            config,
            topics,
            semaphore,
        }
    }

    /// Run until the shutdown signal flips, then drain in-flight work.
    pub(crate) async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            scheduler = self.id,
            topics = self.topics.len(),
            max_tasks = self.config.max_tasks,
            "scheduler started"
        );

        let mut in_flight: JoinSet<()> = JoinSet::new();

        loop {
            while in_flight.try_join_next().is_some() {}

            // Fully saturated: wait for a slot instead of polling for zero.
            if self.semaphore.available_permits() == 0 {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    permit = self.semaphore.acquire() => {
                        let Ok(permit) = permit else { break };
                        drop(permit);
                    }
                }
            }

            let capacity = (self.semaphore.available_permits() as u32).min(self.config.max_tasks);
            let fetched = tokio::select! {
                _ = shutdown.changed() => break,
                result = self.client.fetch_and_lock(&self.topics, capacity) => result,
            };

            match fetched {
                Err(e) => {
                    // Transport faults and rejections alike: log, back off a
                    // full interval, poll again. The loop never dies on them.
                    warn!(scheduler = self.id, error = %e, "fetch-and-lock failed");
                    if idle(&mut shutdown, self.config.poll_interval).await {
                        break;
                    }
                }
                Ok(claims) if claims.is_empty() => {
                    debug!(scheduler = self.id, "no tasks available");
                    if idle(&mut shutdown, self.config.poll_interval).await {
                        break;
                    }
                }
                Ok(claims) => {
                    for claim in claims {
                        self.dispatch(claim, &mut in_flight).await;
                    }
                    // Short jittered pause so parallel schedulers on the same
                    // engine do not fetch in lockstep.
                    if idle(&mut shutdown, jittered(self.config.min_poll_spacing)).await {
                        break;
                    }
                }
            }
        }

        self.drain(in_flight).await;
        info!(scheduler = self.id, "scheduler stopped");
    }

    /// Hand one claim to its handler under a concurrency permit.
    async fn dispatch(&self, claim: TaskClaim, in_flight: &mut JoinSet<()>) {
        let Some(registration) = self.registry.get(&claim.topic_name) else {
            // Fetch only asks for registered topics, so this is an engine or
            // deployment mismatch. Hand the task back with no retries left so
            // it surfaces as an incident instead of looping.
            error!(
                scheduler = self.id,
                task_id = %claim.id,
                topic = %claim.topic_name,
                "claim for unregistered topic"
            );
            let outcome = Outcome::technical_failure(
                format!("worker has no handler for topic '{}'", claim.topic_name),
                0,
                Duration::ZERO,
            );
            self.executor.report(&claim.id, outcome).await;
            return;
        };

        let Ok(permit) = Arc::clone(&self.semaphore).acquire_owned().await else {
            return;
        };
        let executor = Arc::clone(&self.executor);
        let registration = registration.clone();
        in_flight.spawn(async move {
            executor.execute(claim, &registration).await;
            drop(permit);
        });
    }

    /// Let in-flight executions finish within the grace window, then abort.
    async fn drain(&self, mut in_flight: JoinSet<()>) {
        if in_flight.is_empty() {
            return;
        }
        info!(
            scheduler = self.id,
            in_flight = in_flight.len(),
            "draining in-flight tasks"
        );
        let all_done = async {
            while in_flight.join_next().await.is_some() {}
        };
        if tokio::time::timeout(self.config.shutdown_grace, all_done)
            .await
            .is_err()
        {
            warn!(
                scheduler = self.id,
                abandoned = in_flight.len(),
                "shutdown grace expired, abandoning tasks to lock expiry"
            );
            in_flight.shutdown().await;
        }
    }
}

/// Sleep that loses the race against shutdown. Returns true on shutdown.
async fn idle(shutdown: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        _ = shutdown.changed() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

/// Base spacing plus up to 50% random jitter.
fn jittered(base: Duration) -> Duration {
    base + base.mul_f64(rand::random::<f64>() * 0.5)
}
