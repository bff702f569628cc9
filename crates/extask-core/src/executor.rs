//! Task executor: runs one claimed task to exactly one reported outcome.
//!
//! The executor is the containment boundary around handler code. Whatever a
//! handler does — return, fail, panic, or never come back — the claim
//! resolves to exactly one [`Outcome`] and exactly one report call.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::client::LeaseClient;
use crate::domain::{Outcome, TaskClaim};
use crate::handler::HandlerError;
use crate::registry::Registration;

pub(crate) struct TaskExecutor {
    client: Arc<dyn LeaseClient>,
    /// Headroom reserved out of the lock window for the report call itself.
    safety_margin: Duration,
}

impl TaskExecutor {
    pub(crate) fn new(client: Arc<dyn LeaseClient>, safety_margin: Duration) -> Self {
        Self {
            client,
            safety_margin,
        }
    }

    /// Run the claim through its handler and report the outcome.
    ///
    /// The handler runs in its own task so a panic is contained as a
    /// technical failure instead of taking the scheduler down. Execution is
    /// bounded by the remaining lock window minus the safety margin; a
    /// handler that overruns it is aborted and the task is handed back to
    /// the engine via a failure report.
    pub(crate) async fn execute(&self, claim: TaskClaim, registration: &Registration) {
        let deadline = claim
            .lock_remaining(Utc::now())
            .unwrap_or(registration.config.lock_duration)
            .saturating_sub(self.safety_margin);

        let handler = Arc::clone(&registration.handler);
        let task = claim.clone();
        let mut join = tokio::spawn(async move { handler.handle(&task).await });

        let outcome = match tokio::time::timeout(deadline, &mut join).await {
            Err(_) => {
                join.abort();
                warn!(
                    task_id = %claim.id,
                    topic = %claim.topic_name,
                    "execution exceeded lock window, aborting handler"
                );
                self.technical_outcome(&claim, registration, "execution exceeded lock window".into())
            }
            Ok(Err(join_error)) => {
                let message = if join_error.is_panic() {
                    format!("handler panicked: {join_error}")
                } else {
                    "handler task was cancelled".to_string()
                };
                error!(task_id = %claim.id, topic = %claim.topic_name, "{message}");
                self.technical_outcome(&claim, registration, message)
            }
            Ok(Ok(Ok(variables))) => Outcome::success(variables),
            Ok(Ok(Err(HandlerError::Business {
                code,
                message,
                variables,
            }))) => Outcome::BusinessFailure {
                code,
                message,
                variables,
            },
            Ok(Ok(Err(HandlerError::Technical(message)))) => {
                self.technical_outcome(&claim, registration, message)
            }
        };

        info!(
            task_id = %claim.id,
            topic = %claim.topic_name,
            outcome = outcome.label(),
            "task finished"
        );
        self.report(&claim.id, outcome).await;
    }

    /// Build the failure outcome with the retry countdown passed through.
    ///
    /// The engine owns the retry counter: `retries` on the claim is what is
    /// left *before* this attempt, so the report decrements it. A claim the
    /// engine has not counted yet starts from the topic's budget.
    fn technical_outcome(
        &self,
        claim: &TaskClaim,
        registration: &Registration,
        message: String,
    ) -> Outcome {
        let budget = registration.config.max_retries;
        let remaining = claim
            .retries
            .map(|r| r.saturating_sub(1))
            .unwrap_or(budget);
        let attempt = budget.saturating_sub(remaining).max(1);
        let delay = registration.config.retry_backoff.next_delay(attempt);
        Outcome::technical_failure(message, remaining, delay)
    }

    /// Send exactly one report for the outcome.
    ///
    /// A lost lock means the engine already redelivered or cancelled the
    /// task; the report is dropped with a warning. Any other report failure
    /// is logged and the claim is left to lock expiry — at-least-once
    /// delivery means the engine hands it out again.
    pub(crate) async fn report(&self, task_id: &str, outcome: Outcome) {
        let result = match &outcome {
            Outcome::Success { variables } => self.client.complete(task_id, variables).await,
            Outcome::BusinessFailure {
                code,
                message,
                variables,
            } => self.client.bpmn_error(task_id, code, message, variables).await,
            Outcome::TechnicalFailure {
                message,
                retries_remaining,
                retry_delay,
            } => {
                self.client
                    .fail(task_id, message, *retries_remaining, *retry_delay)
                    .await
            }
        };

        match result {
            Ok(()) => {}
            Err(e) if e.is_lock_lost() => {
                warn!(task_id, outcome = outcome.label(), "report dropped, lock already lost");
            }
            Err(e) => {
                error!(
                    task_id,
                    outcome = outcome.label(),
                    error = %e,
                    "report failed, task will be redelivered after lock expiry"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    use crate::client::TopicLease;
    use crate::domain::Variables;
    use crate::error::ClientError;
    use crate::handler::TopicHandler;
    use crate::registry::TopicConfig;
    use crate::retry::RetryPolicy;

    /// Records every report call; fetch is never used by the executor.
    #[derive(Default)]
    struct RecordingClient {
        reports: Mutex<Vec<Report>>,
        lock_lost: bool,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Report {
        Complete { task_id: String, variables: Variables },
        Fail { task_id: String, retries: u32, retry_timeout: Duration, message: String },
        BpmnError { task_id: String, code: String },
    }

    #[async_trait]
    impl LeaseClient for RecordingClient {
        async fn fetch_and_lock(
            &self,
            _topics: &[TopicLease],
            _max_tasks: u32,
        ) -> Result<Vec<TaskClaim>, ClientError> {
            Ok(vec![])
        }

        async fn complete(&self, task_id: &str, variables: &Variables) -> Result<(), ClientError> {
            if self.lock_lost {
                return Err(ClientError::LockLost {
                    task_id: task_id.to_string(),
                    status: 409,
                });
            }
            self.reports.lock().unwrap().push(Report::Complete {
                task_id: task_id.to_string(),
                variables: variables.clone(),
            });
            Ok(())
        }

        async fn fail(
            &self,
            task_id: &str,
            message: &str,
            retries: u32,
            retry_timeout: Duration,
        ) -> Result<(), ClientError> {
            self.reports.lock().unwrap().push(Report::Fail {
                task_id: task_id.to_string(),
                retries,
                retry_timeout,
                message: message.to_string(),
            });
            Ok(())
        }

        async fn bpmn_error(
            &self,
            task_id: &str,
            code: &str,
            _message: &str,
            _variables: &Variables,
        ) -> Result<(), ClientError> {
            self.reports.lock().unwrap().push(Report::BpmnError {
                task_id: task_id.to_string(),
                code: code.to_string(),
            });
            Ok(())
        }
    }

    struct ScriptedHandler(fn() -> Result<Variables, HandlerError>);

    #[async_trait]
    impl TopicHandler for ScriptedHandler {
        async fn handle(&self, _task: &TaskClaim) -> Result<Variables, HandlerError> {
            (self.0)()
        }
    }

    struct StuckHandler;

    #[async_trait]
    impl TopicHandler for StuckHandler {
        async fn handle(&self, _task: &TaskClaim) -> Result<Variables, HandlerError> {
            std::future::pending().await
        }
    }

    struct PanickingHandler;

    #[async_trait]
    impl TopicHandler for PanickingHandler {
        async fn handle(&self, _task: &TaskClaim) -> Result<Variables, HandlerError> {
            panic!("boom");
        }
    }

    fn registration(handler: Arc<dyn TopicHandler>) -> Registration {
        Registration {
            topic: "t".to_string(),
            config: TopicConfig {
                lock_duration: Duration::from_secs(60),
                max_retries: 3,
                retry_backoff: RetryPolicy::default(),
                fetch_variables: None,
            },
            handler,
        }
    }

    fn claim(retries: Option<u32>) -> TaskClaim {
        serde_json::from_value(json!({
            "id": "task-1",
            "topicName": "t",
            "retries": retries,
        }))
        .unwrap()
    }

    fn executor(client: &Arc<RecordingClient>) -> TaskExecutor {
        TaskExecutor::new(
            Arc::clone(client) as Arc<dyn LeaseClient>,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn success_is_reported_as_completion() {
        let client = Arc::new(RecordingClient::default());
        let reg = registration(Arc::new(ScriptedHandler(|| {
            Ok(Variables::new().with("out", 1i64))
        })));

        executor(&client).execute(claim(None), &reg).await;

        let reports = client.reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(matches!(
            &reports[0],
            Report::Complete { task_id, variables }
                if task_id == "task-1" && variables.get_i64("out") == Some(1)
        ));
    }

    #[tokio::test]
    async fn business_error_goes_to_the_error_channel() {
        let client = Arc::new(RecordingClient::default());
        let reg = registration(Arc::new(ScriptedHandler(|| {
            Err(HandlerError::business("unsupported-vehicle", "no quote"))
        })));

        executor(&client).execute(claim(None), &reg).await;

        let reports = client.reports.lock().unwrap();
        assert!(matches!(
            &reports[0],
            Report::BpmnError { code, .. } if code == "unsupported-vehicle"
        ));
    }

    #[tokio::test]
    async fn first_technical_failure_starts_from_the_topic_budget() {
        let client = Arc::new(RecordingClient::default());
        let reg = registration(Arc::new(ScriptedHandler(|| {
            Err(HandlerError::technical("db down"))
        })));

        executor(&client).execute(claim(None), &reg).await;

        let reports = client.reports.lock().unwrap();
        assert!(matches!(
            &reports[0],
            // uncounted claim: budget 3 stays, first-attempt delay
            Report::Fail { retries, retry_timeout, .. }
                if *retries == 3 && *retry_timeout == Duration::from_secs(10)
        ));
    }

    #[tokio::test]
    async fn repeated_failures_count_down_and_back_off() {
        let client = Arc::new(RecordingClient::default());
        let reg = registration(Arc::new(ScriptedHandler(|| {
            Err(HandlerError::technical("db down"))
        })));

        // engine says 2 retries were left before this attempt
        executor(&client).execute(claim(Some(2)), &reg).await;

        let reports = client.reports.lock().unwrap();
        assert!(matches!(
            &reports[0],
            // 3-retry budget, 1 remaining after this: second backoff step
            Report::Fail { retries, retry_timeout, .. }
                if *retries == 1 && *retry_timeout == Duration::from_secs(20)
        ));
    }

    #[tokio::test]
    async fn panic_is_contained_as_a_technical_failure() {
        let client = Arc::new(RecordingClient::default());
        let reg = registration(Arc::new(PanickingHandler));

        executor(&client).execute(claim(Some(1)), &reg).await;

        let reports = client.reports.lock().unwrap();
        assert!(matches!(
            &reports[0],
            Report::Fail { retries, message, .. }
                if *retries == 0 && message.contains("panicked")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn overrunning_handler_is_aborted_at_the_lock_deadline() {
        let client = Arc::new(RecordingClient::default());
        let reg = registration(Arc::new(StuckHandler));

        executor(&client).execute(claim(None), &reg).await;

        let reports = client.reports.lock().unwrap();
        assert!(matches!(
            &reports[0],
            Report::Fail { message, .. } if message == "execution exceeded lock window"
        ));
    }

    #[tokio::test]
    async fn lost_lock_on_report_is_swallowed() {
        let client = Arc::new(RecordingClient {
            lock_lost: true,
            ..RecordingClient::default()
        });
        let reg = registration(Arc::new(ScriptedHandler(|| Ok(Variables::new()))));

        // must not error or retry; the report is simply dropped
        executor(&client).execute(claim(None), &reg).await;
        assert!(client.reports.lock().unwrap().is_empty());
    }
}
