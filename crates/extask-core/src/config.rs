//! Worker configuration.
//!
//! One explicit struct, read from the environment once at startup, validated
//! once, immutable afterwards. No process-wide singletons: the supervisor
//! takes the config at construction and everything downstream borrows from
//! there.

use std::time::Duration;

use ulid::Ulid;

use crate::error::WorkerError;

/// Configuration for one worker process.
///
/// The defaults are operational tuning values (300 s lock, 5 s poll, 5 max
/// tasks), not algorithmic constraints — deployments override them through
/// the environment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Engine REST base URL, e.g. `http://localhost:8080/engine-rest`.
    pub base_url: String,

    /// Worker identity sent with every engine call.
    pub worker_id: String,

    /// Default lock duration requested per topic.
    pub lock_duration: Duration,

    /// Pause between polls when a round produced nothing.
    pub poll_interval: Duration,

    /// Concurrency ceiling per scheduler: executions in flight at once.
    pub max_tasks: u32,

    /// Long-poll wait window for fetch-and-lock.
    pub fetch_wait: Duration,

    /// How long in-flight executions may keep running after shutdown.
    pub shutdown_grace: Duration,

    /// Margin subtracted from the lock window to form the execution deadline,
    /// leaving room for the report call itself.
    pub lock_safety_margin: Duration,

    /// Lower bound between consecutive polls after a productive round.
    pub min_poll_spacing: Duration,

    /// Number of scheduler instances sharing the registry.
    pub schedulers: u32,

    /// Opaque credential header value sent with every call, if configured.
    pub auth_header: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/engine-rest".to_string(),
            worker_id: default_worker_id(),
            lock_duration: Duration::from_millis(300_000),
            poll_interval: Duration::from_secs(5),
            max_tasks: 5,
            fetch_wait: Duration::from_millis(30_000),
            shutdown_grace: Duration::from_secs(30),
            lock_safety_margin: Duration::from_secs(5),
            min_poll_spacing: Duration::from_millis(200),
            schedulers: 1,
            auth_header: None,
        }
    }
}

fn default_worker_id() -> String {
    format!("extask-{}", Ulid::new())
}

impl WorkerConfig {
    /// Read configuration from the environment, falling back to defaults.
    ///
    /// Unparseable values are startup errors, not silent fallbacks.
    pub fn from_env() -> Result<Self, WorkerError> {
        let defaults = Self::default();
        Ok(Self {
            base_url: env_string("ENGINE_URL").unwrap_or(defaults.base_url),
            worker_id: env_string("WORKER_ID").unwrap_or(defaults.worker_id),
            lock_duration: env_millis("LOCK_DURATION_MS")?.unwrap_or(defaults.lock_duration),
            poll_interval: env_secs("POLL_INTERVAL_SECS")?.unwrap_or(defaults.poll_interval),
            max_tasks: env_u32("MAX_TASKS")?.unwrap_or(defaults.max_tasks),
            fetch_wait: env_millis("FETCH_WAIT_MS")?.unwrap_or(defaults.fetch_wait),
            shutdown_grace: env_secs("SHUTDOWN_GRACE_SECS")?.unwrap_or(defaults.shutdown_grace),
            lock_safety_margin: env_secs("LOCK_SAFETY_MARGIN_SECS")?
                .unwrap_or(defaults.lock_safety_margin),
            min_poll_spacing: env_millis("MIN_POLL_SPACING_MS")?
                .unwrap_or(defaults.min_poll_spacing),
            schedulers: env_u32("SCHEDULERS")?.unwrap_or(defaults.schedulers),
            auth_header: env_string("ENGINE_AUTH_HEADER"),
        })
    }

    /// Validate once at startup; an invalid config is fatal.
    pub fn validate(&self) -> Result<(), WorkerError> {
        if reqwest::Url::parse(&self.base_url).is_err() {
            return Err(WorkerError::InvalidConfig(format!(
                "ENGINE_URL is not a valid URL: {}",
                self.base_url
            )));
        }
        if self.worker_id.is_empty() {
            return Err(WorkerError::InvalidConfig("worker id must not be empty".into()));
        }
        if self.max_tasks == 0 {
            return Err(WorkerError::InvalidConfig("max_tasks must be at least 1".into()));
        }
        if self.schedulers == 0 {
            return Err(WorkerError::InvalidConfig("schedulers must be at least 1".into()));
        }
        if self.lock_duration <= self.lock_safety_margin {
            return Err(WorkerError::InvalidConfig(
                "lock duration must exceed the safety margin".into(),
            ));
        }
        Ok(())
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_u32(name: &str) -> Result<Option<u32>, WorkerError> {
    match env_string(name) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u32>()
            .map(Some)
            .map_err(|e| WorkerError::InvalidConfig(format!("{name}={raw}: {e}"))),
    }
}

fn env_u64(name: &str) -> Result<Option<u64>, WorkerError> {
    match env_string(name) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|e| WorkerError::InvalidConfig(format!("{name}={raw}: {e}"))),
    }
}

fn env_millis(name: &str) -> Result<Option<Duration>, WorkerError> {
    Ok(env_u64(name)?.map(Duration::from_millis))
}

fn env_secs(name: &str) -> Result<Option<Duration>, WorkerError> {
    Ok(env_u64(name)?.map(Duration::from_secs))
}
