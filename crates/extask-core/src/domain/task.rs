//! Task claim: one leased unit of work handed out by the engine.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Variables;

/// One external task as returned by a fetch-and-lock call.
///
/// A claim is owned exclusively by the worker that fetched it until exactly
/// one report lands or the lock expires, whichever happens first. After
/// expiry the engine is free to hand the same task to someone else, which is
/// why report calls must treat a lock-lost rejection as final.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskClaim {
    /// Opaque engine-assigned identifier, unique per claim.
    pub id: String,

    /// Topic that selects the handler.
    pub topic_name: String,

    /// Input variables, consumed read-only by the handler.
    #[serde(default)]
    pub variables: Variables,

    /// Absolute instant after which the lock is no longer exclusive.
    #[serde(default, with = "engine_time")]
    pub lock_expiration_time: Option<DateTime<Utc>>,

    /// Technical retries left. `None` means the engine has not counted a
    /// failure for this task yet.
    #[serde(default)]
    pub retries: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_instance_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_definition_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
}

impl TaskClaim {
    /// Time left on the lock as of `now`, zero if already expired.
    ///
    /// `None` when the engine did not report an expiry timestamp; callers
    /// fall back to the topic's configured lock duration.
    pub fn lock_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let expires_at = self.lock_expiration_time?;
        Some((expires_at - now).to_std().unwrap_or(Duration::ZERO))
    }
}

/// The engine formats timestamps as `2025-08-23T12:00:00.000+0000` — close
/// to RFC 3339 but with a colon-less offset, so chrono needs an explicit
/// format string. RFC 3339 input is accepted too.
mod engine_time {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => serializer.serialize_str(&dt.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let parsed = DateTime::parse_from_str(&raw, FORMAT)
            .or_else(|_| DateTime::parse_from_rfc3339(&raw))
            .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{raw}': {e}")))?;
        Ok(Some(parsed.with_timezone(&Utc)))
    }
}
