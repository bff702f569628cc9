//! Error taxonomy for the worker.
//!
//! Faults split along containment lines:
//! - [`ClientError`] covers the wire: transport faults are retried on the
//!   next poll, a lost lock means the engine already owns the task's next
//!   state, and anything else is an unexpected rejection.
//! - [`WorkerError`] covers startup: these are fatal and prevent the worker
//!   from running at all.
//!
//! Handler-level faults have their own type next to the handler trait
//! (`handler::HandlerError`); nothing handler-related ever escapes the
//! executor boundary.

use thiserror::Error;

/// Failures on the engine's request surface.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network fault or 5xx from the engine. Never fatal: the caller treats
    /// this as "no tasks this round" and retries on the next poll.
    #[error("transport failure talking to the engine: {0}")]
    Transport(String),

    /// The engine rejected a report because our lock already expired. The
    /// report is dropped; retrying would be destructive.
    #[error("lock lost for task {task_id} (engine answered {status})")]
    LockLost { task_id: String, status: u16 },

    /// A 4xx we do not recognize. Logged and dropped like a lost lock on the
    /// report path; treated like a transport fault on the fetch path.
    #[error("engine rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

impl ClientError {
    pub fn is_lock_lost(&self) -> bool {
        matches!(self, ClientError::LockLost { .. })
    }
}

/// Fatal startup problems. The worker refuses to start on any of these.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("duplicate handler registered for topic '{0}'")]
    DuplicateTopic(String),

    #[error("no topic handlers registered")]
    EmptyRegistry,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
