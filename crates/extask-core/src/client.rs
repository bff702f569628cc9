//! Lease client: the engine's fetch/lock, complete, and failure-report
//! surface.
//!
//! [`LeaseClient`] is the port; [`EngineClient`] is the reqwest
//! implementation against the engine's REST API. Schedulers and executors
//! only see the trait, which is the seam the tests use to substitute a
//! scripted engine.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

use crate::config::WorkerConfig;
use crate::domain::{TaskClaim, Variables};
use crate::error::{ClientError, WorkerError};
use crate::registry::HandlerRegistry;

/// One topic entry of a fetch-and-lock request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicLease {
    pub topic_name: String,
    /// Lock duration in milliseconds, from the topic's registration.
    pub lock_duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Vec<String>>,
}

impl TopicLease {
    /// Build the request entries for every registered topic.
    pub fn from_registry(registry: &HandlerRegistry) -> Vec<TopicLease> {
        registry
            .registrations()
            .into_iter()
            .map(|r| TopicLease {
                topic_name: r.topic.clone(),
                lock_duration: r.config.lock_duration.as_millis() as u64,
                variables: r.config.fetch_variables.clone(),
            })
            .collect()
    }
}

/// Port for the engine's task-queue API.
#[async_trait]
pub trait LeaseClient: Send + Sync {
    /// Claim up to `max_tasks` tasks across the given topics.
    ///
    /// Long-polls up to the configured wait window; an empty list (not an
    /// error) means nothing was available. A [`ClientError::Transport`] must
    /// be treated by the caller as "no tasks this round", never as fatal.
    async fn fetch_and_lock(
        &self,
        topics: &[TopicLease],
        max_tasks: u32,
    ) -> Result<Vec<TaskClaim>, ClientError>;

    /// Report success with the handler's output variables.
    async fn complete(&self, task_id: &str, variables: &Variables) -> Result<(), ClientError>;

    /// Report a technical failure and pass the retry countdown through.
    /// `retries` reaching 0 raises an incident on the engine side.
    async fn fail(
        &self,
        task_id: &str,
        message: &str,
        retries: u32,
        retry_timeout: Duration,
    ) -> Result<(), ClientError>;

    /// Report an expected domain rejection on the dedicated error channel.
    async fn bpmn_error(
        &self,
        task_id: &str,
        code: &str,
        message: &str,
        variables: &Variables,
    ) -> Result<(), ClientError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FetchAndLockRequest<'a> {
    worker_id: &'a str,
    max_tasks: u32,
    use_priority: bool,
    async_response_timeout: u64,
    topics: &'a [TopicLease],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteRequest<'a> {
    worker_id: &'a str,
    variables: &'a Variables,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FailureRequest<'a> {
    worker_id: &'a str,
    error_message: &'a str,
    retries: u32,
    retry_timeout: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BpmnErrorRequest<'a> {
    worker_id: &'a str,
    error_code: &'a str,
    error_message: &'a str,
    variables: &'a Variables,
}

/// Longest error message forwarded to the engine; the engine truncates
/// anyway and oversized bodies get report calls rejected.
const MAX_ERROR_MESSAGE: usize = 500;

/// Extra headroom on the HTTP timeout beyond the long-poll wait window.
const FETCH_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

/// reqwest-backed implementation of [`LeaseClient`].
pub struct EngineClient {
    http: reqwest::Client,
    base_url: String,
    worker_id: String,
    fetch_wait: Duration,
    auth_header: Option<String>,
}

impl EngineClient {
    pub fn new(config: &WorkerConfig) -> Result<Self, WorkerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| WorkerError::InvalidConfig(format!("http client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            worker_id: config.worker_id.clone(),
            fetch_wait: config.fetch_wait,
            auth_header: config.auth_header.clone(),
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut request = self.http.post(format!("{}/{path}", self.base_url));
        if let Some(credential) = &self.auth_header {
            request = request.header(reqwest::header::AUTHORIZATION, credential);
        }
        request
    }

    /// Map a report response: 204 on success, 404/409 when the lock was
    /// already lost server-side.
    async fn expect_no_content(
        task_id: &str,
        response: reqwest::Response,
    ) -> Result<(), ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::NOT_FOUND || status == StatusCode::CONFLICT {
            return Err(ClientError::LockLost {
                task_id: task_id.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            return Err(ClientError::Transport(format!("engine answered {status}: {body}")));
        }
        Err(ClientError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl LeaseClient for EngineClient {
    async fn fetch_and_lock(
        &self,
        topics: &[TopicLease],
        max_tasks: u32,
    ) -> Result<Vec<TaskClaim>, ClientError> {
        let request = FetchAndLockRequest {
            worker_id: &self.worker_id,
            max_tasks,
            use_priority: true,
            async_response_timeout: self.fetch_wait.as_millis() as u64,
            topics,
        };

        let response = self
            .post("external-task/fetchAndLock")
            .timeout(self.fetch_wait + FETCH_TIMEOUT_MARGIN)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(ClientError::Transport(format!("engine answered {status}: {body}")));
            }
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let claims: Vec<TaskClaim> = response
            .json()
            .await
            .map_err(|e| ClientError::Transport(format!("invalid fetch response: {e}")))?;
        debug!(claims = claims.len(), "fetch-and-lock round finished");
        Ok(claims)
    }

    async fn complete(&self, task_id: &str, variables: &Variables) -> Result<(), ClientError> {
        let request = CompleteRequest {
            worker_id: &self.worker_id,
            variables,
        };
        let response = self
            .post(&format!("external-task/{task_id}/complete"))
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Self::expect_no_content(task_id, response).await
    }

    async fn fail(
        &self,
        task_id: &str,
        message: &str,
        retries: u32,
        retry_timeout: Duration,
    ) -> Result<(), ClientError> {
        let truncated: String = message.chars().take(MAX_ERROR_MESSAGE).collect();
        let request = FailureRequest {
            worker_id: &self.worker_id,
            error_message: &truncated,
            retries,
            retry_timeout: retry_timeout.as_millis() as u64,
        };
        let response = self
            .post(&format!("external-task/{task_id}/failure"))
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Self::expect_no_content(task_id, response).await
    }

    async fn bpmn_error(
        &self,
        task_id: &str,
        code: &str,
        message: &str,
        variables: &Variables,
    ) -> Result<(), ClientError> {
        let request = BpmnErrorRequest {
            worker_id: &self.worker_id,
            error_code: code,
            error_message: message,
            variables,
        };
        let response = self
            .post(&format!("external-task/{task_id}/bpmnError"))
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Self::expect_no_content(task_id, response).await
    }
}
