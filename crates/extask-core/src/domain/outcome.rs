//! Outcome model: the one result every claim execution resolves to.
//!
//! This module does not assume a client or a scheduler. It only defines the
//! "shape" of results the executor can produce and the reporter can send.

use std::time::Duration;

use super::Variables;

/// The single classification of an executed claim.
///
/// Exactly one of these is produced per claim and exactly one report call is
/// made for it. A `BusinessFailure` is an expected, modeled domain rejection
/// and never touches the technical retry budget; a `TechnicalFailure`
/// decrements it and eventually becomes an engine-side incident.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        variables: Variables,
    },
    BusinessFailure {
        code: String,
        message: String,
        variables: Variables,
    },
    TechnicalFailure {
        message: String,
        /// Countdown passed through to the engine; 0 raises an incident.
        retries_remaining: u32,
        /// How long the engine should wait before redelivering.
        retry_delay: Duration,
    },
}

impl Outcome {
    pub fn success(variables: Variables) -> Self {
        Outcome::Success { variables }
    }

    pub fn business_failure(
        code: impl Into<String>,
        message: impl Into<String>,
        variables: Variables,
    ) -> Self {
        Outcome::BusinessFailure {
            code: code.into(),
            message: message.into(),
            variables,
        }
    }

    pub fn technical_failure(
        message: impl Into<String>,
        retries_remaining: u32,
        retry_delay: Duration,
    ) -> Self {
        Outcome::TechnicalFailure {
            message: message.into(),
            retries_remaining,
            retry_delay,
        }
    }

    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::BusinessFailure { .. } => "business-failure",
            Outcome::TechnicalFailure { .. } => "technical-failure",
        }
    }
}
