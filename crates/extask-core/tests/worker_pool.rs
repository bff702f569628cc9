//! End-to-end worker pool tests against a mock engine.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use extask_core::{
    HandlerError, HandlerRegistry, TaskClaim, TopicConfig, TopicHandler, Variables, WorkerConfig,
    WorkerPool,
};

/// Config tuned for fast test loops against a local mock.
fn test_config(server: &MockServer, schedulers: u32) -> WorkerConfig {
    WorkerConfig {
        base_url: server.uri(),
        worker_id: "test-worker".to_string(),
        fetch_wait: Duration::from_millis(50),
        poll_interval: Duration::from_millis(50),
        min_poll_spacing: Duration::from_millis(10),
        shutdown_grace: Duration::from_secs(5),
        max_tasks: 2,
        schedulers,
        ..WorkerConfig::default()
    }
}

struct EchoRating;

#[async_trait]
impl TopicHandler for EchoRating {
    async fn handle(&self, _task: &TaskClaim) -> Result<Variables, HandlerError> {
        Ok(Variables::new().with("riskRating", "Green"))
    }
}

fn registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry
        .register("determine-riskgroup", TopicConfig::default(), Arc::new(EchoRating))
        .unwrap();
    registry
}

fn claim_body(id: &str) -> serde_json::Value {
    json!([{
        "id": id,
        "topicName": "determine-riskgroup",
        "variables": {"age": {"value": 40, "type": "Integer"}},
        "lockExpirationTime": "2099-01-01T00:00:00.000+0000",
    }])
}

/// Hands out up to `total` uniquely numbered claims, one per fetch, then
/// reports an empty queue.
struct FiniteQueue {
    issued: AtomicU32,
    total: u32,
}

impl Respond for FiniteQueue {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        if n < self.total {
            ResponseTemplate::new(200).set_body_json(claim_body(&format!("task-{n}")))
        } else {
            ResponseTemplate::new(200).set_body_json(json!([]))
        }
    }
}

async fn mount_complete_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path_regex(r"^/external-task/[^/]+/complete$"))
        .respond_with(ResponseTemplate::new(204))
        .mount(server)
        .await;
}

async fn completed_task_ids(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(|r| {
            let p = r.url.path();
            p.strip_prefix("/external-task/")?
                .strip_suffix("/complete")
                .map(str::to_string)
        })
        .collect()
}

#[tokio::test]
async fn completes_a_fetched_task_with_handler_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/external-task/fetchAndLock"))
        .respond_with(FiniteQueue {
            issued: AtomicU32::new(0),
            total: 1,
        })
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/external-task/task-0/complete"))
        .and(body_partial_json(json!({
            "workerId": "test-worker",
            "variables": {"riskRating": {"value": "Green", "type": "String"}},
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let pool = WorkerPool::start(test_config(&server, 1), registry()).unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    pool.shutdown_and_join().await;
}

#[tokio::test]
async fn parallel_schedulers_complete_each_claim_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/external-task/fetchAndLock"))
        .respond_with(FiniteQueue {
            issued: AtomicU32::new(0),
            total: 6,
        })
        .mount(&server)
        .await;
    mount_complete_ok(&server).await;

    let pool = WorkerPool::start(test_config(&server, 2), registry()).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    pool.shutdown_and_join().await;

    let mut completed = completed_task_ids(&server).await;
    completed.sort();
    let expected: Vec<String> = (0..6).map(|n| format!("task-{n}")).collect();
    assert_eq!(completed, expected);
}

#[tokio::test]
async fn survives_engine_outage_and_resumes_polling() {
    let server = MockServer::start().await;

    struct OutageThenQueue {
        calls: AtomicU32,
    }
    impl Respond for OutageThenQueue {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            match self.calls.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => ResponseTemplate::new(503),
                2 => ResponseTemplate::new(200).set_body_json(claim_body("task-after-outage")),
                _ => ResponseTemplate::new(200).set_body_json(json!([])),
            }
        }
    }

    Mock::given(method("POST"))
        .and(path("/external-task/fetchAndLock"))
        .respond_with(OutageThenQueue {
            calls: AtomicU32::new(0),
        })
        .mount(&server)
        .await;
    mount_complete_ok(&server).await;

    let pool = WorkerPool::start(test_config(&server, 1), registry()).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    pool.shutdown_and_join().await;

    assert_eq!(completed_task_ids(&server).await, vec!["task-after-outage"]);
}
