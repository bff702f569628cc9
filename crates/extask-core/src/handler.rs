//! Handler traits: the seam between the worker machinery and domain logic.
//!
//! Two levels:
//! - [`TopicHandler`] works on the raw claim and its variable map. This is
//!   what the registry stores and the executor invokes.
//! - [`Handler<T>`] is the typed layer: a payload struct deriving
//!   `Deserialize` names its topic via [`TopicPayload`], and
//!   [`TypedHandler`] erases the type so it can live in the same registry.

use std::marker::PhantomData;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{TaskClaim, Variables};

/// How a handler invocation can fail.
///
/// `Business` is an expected, modeled domain rejection — it is reported on
/// the dedicated channel and never consumes the technical retry budget.
/// `Technical` is everything unexpected and does.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("business error {code}: {message}")]
    Business {
        code: String,
        message: String,
        variables: Variables,
    },

    #[error("{0}")]
    Technical(String),
}

impl HandlerError {
    pub fn business(code: impl Into<String>, message: impl Into<String>) -> Self {
        HandlerError::Business {
            code: code.into(),
            message: message.into(),
            variables: Variables::new(),
        }
    }

    pub fn technical(message: impl Into<String>) -> Self {
        HandlerError::Technical(message.into())
    }
}

/// A handler for one topic.
///
/// Takes the whole claim so the handler can read variables (and metadata
/// like the process instance id) as it likes; returns the output variables
/// reported on completion.
#[async_trait]
pub trait TopicHandler: Send + Sync {
    async fn handle(&self, task: &TaskClaim) -> Result<Variables, HandlerError>;
}

/// Marker for a typed payload: names the topic its handler serves.
pub trait TopicPayload: serde::de::DeserializeOwned + Send {
    const TOPIC: &'static str;
}

/// Typed handler: receives the decoded payload instead of a raw map.
#[async_trait]
pub trait Handler<T: TopicPayload>: Send + Sync {
    async fn handle(&self, input: T) -> Result<Variables, HandlerError>;
}

/// Type-erasing adapter from `Handler<T>` to [`TopicHandler`].
///
/// A payload that fails to decode is a technical failure: the variables the
/// process supplied do not match what the handler declared it needs.
pub struct TypedHandler<T: TopicPayload, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T: TopicPayload, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: TopicPayload, H: Handler<T>> TopicHandler for TypedHandler<T, H> {
    async fn handle(&self, task: &TaskClaim) -> Result<Variables, HandlerError> {
        let input: T = task
            .variables
            .decode()
            .map_err(|e| HandlerError::technical(format!("variable decode: {e}")))?;
        self.handler.handle(input).await
    }
}
