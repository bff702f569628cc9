//! Topic registry: topic name → handler + execution configuration.
//!
//! Design:
//! - Built during initialization (mutable).
//! - Used during polling (immutable, behind `Arc`).
//! This avoids locks during operation and makes a claim for an unregistered
//! topic a startup-time impossibility rather than a runtime lookup failure:
//! the worker only ever subscribes to the topics registered here.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::WorkerError;
use crate::handler::{Handler, TopicHandler, TopicPayload, TypedHandler};
use crate::retry::RetryPolicy;

/// Per-topic execution configuration, fixed at registration.
#[derive(Debug, Clone)]
pub struct TopicConfig {
    /// Exclusivity window requested when claiming tasks of this topic.
    pub lock_duration: Duration,

    /// Technical retries granted when the engine has not counted one yet.
    pub max_retries: u32,

    /// Backoff shaping for technical failure reports.
    pub retry_backoff: RetryPolicy,

    /// Variable names to fetch; `None` fetches all of them.
    pub fetch_variables: Option<Vec<String>>,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            lock_duration: Duration::from_millis(300_000),
            max_retries: 3,
            retry_backoff: RetryPolicy::default(),
            fetch_variables: None,
        }
    }
}

impl TopicConfig {
    pub fn with_lock_duration(lock_duration: Duration) -> Self {
        Self {
            lock_duration,
            ..Self::default()
        }
    }
}

/// One registered topic: the handler plus its configuration.
#[derive(Clone)]
pub struct Registration {
    pub topic: String,
    pub config: TopicConfig,
    pub handler: Arc<dyn TopicHandler>,
}

/// Registry of handlers (topic → registration).
#[derive(Default)]
pub struct HandlerRegistry {
    topics: HashMap<String, Registration>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            topics: HashMap::new(),
        }
    }

    /// Register a raw handler for a topic.
    ///
    /// Registering the same topic twice is a configuration error, caught at
    /// startup rather than silently overwriting.
    pub fn register(
        &mut self,
        topic: impl Into<String>,
        config: TopicConfig,
        handler: Arc<dyn TopicHandler>,
    ) -> Result<(), WorkerError> {
        let topic = topic.into();
        if self.topics.contains_key(&topic) {
            return Err(WorkerError::DuplicateTopic(topic));
        }
        self.topics.insert(
            topic.clone(),
            Registration {
                topic,
                config,
                handler,
            },
        );
        Ok(())
    }

    /// Register a typed handler; the topic comes from the payload type.
    pub fn register_typed<T, H>(&mut self, config: TopicConfig, handler: H) -> Result<(), WorkerError>
    where
        T: TopicPayload + 'static,
        H: Handler<T> + 'static,
    {
        self.register(T::TOPIC, config, Arc::new(TypedHandler::new(handler)))
    }

    pub fn get(&self, topic: &str) -> Option<&Registration> {
        self.topics.get(topic)
    }

    /// All registrations, in stable (sorted) topic order.
    pub fn registrations(&self) -> Vec<&Registration> {
        let mut all: Vec<&Registration> = self.topics.values().collect();
        all.sort_by(|a, b| a.topic.cmp(&b.topic));
        all
    }

    pub fn topics(&self) -> Vec<String> {
        self.registrations().iter().map(|r| r.topic.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
