//! extask-core
//!
//! Runtime for external task workers: poll a process engine for leased
//! tasks, run the registered handler for each topic, and report exactly one
//! outcome per claim.
//!
//! # Modules
//! - **domain**: data model (variables, task claims, outcomes)
//! - **client**: engine REST surface ([`LeaseClient`] port, [`EngineClient`])
//! - **handler**: handler traits, raw and typed
//! - **registry**: topic → handler + per-topic configuration
//! - **config**: worker configuration, read from the environment
//! - **retry**: backoff shaping for technical failures
//! - **supervisor**: the [`WorkerPool`] entry point
//!
//! The scheduler and executor internals stay private; a worker binary only
//! needs a registry, a config, and [`WorkerPool::start`].

pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod handler;
pub mod registry;
pub mod retry;
pub mod supervisor;

mod executor;
mod scheduler;

pub use client::{EngineClient, LeaseClient, TopicLease};
pub use config::WorkerConfig;
pub use domain::{Outcome, TaskClaim, Value, Variables};
pub use error::{ClientError, WorkerError};
pub use handler::{Handler, HandlerError, TopicHandler, TopicPayload, TypedHandler};
pub use registry::{HandlerRegistry, Registration, TopicConfig};
pub use retry::RetryPolicy;
pub use supervisor::WorkerPool;
