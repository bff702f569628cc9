//! Insurance process flow against a mock engine.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use extask_core::{HandlerRegistry, WorkerConfig, WorkerPool};
use extask_worker::handlers::{self, notify::LogNotifier};

fn config(server: &MockServer) -> WorkerConfig {
    WorkerConfig {
        base_url: server.uri(),
        worker_id: "insurance-test-worker".to_string(),
        fetch_wait: Duration::from_millis(50),
        poll_interval: Duration::from_millis(50),
        min_poll_spacing: Duration::from_millis(10),
        shutdown_grace: Duration::from_secs(5),
        ..WorkerConfig::default()
    }
}

fn registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    handlers::register_all(&mut registry, Arc::new(LogNotifier)).unwrap();
    registry
}

async fn mount_single_claim(server: &MockServer, topic: &str, variables: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/external-task/fetchAndLock"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "claim-1",
            "topicName": topic,
            "variables": variables,
            "lockExpirationTime": "2099-01-01T00:00:00.000+0000",
        }])))
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/external-task/fetchAndLock"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

async fn run_briefly(server: &MockServer) {
    let pool = WorkerPool::start(config(server), registry()).unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    pool.shutdown_and_join().await;
}

#[tokio::test]
async fn low_risk_application_is_rated_green_and_completed() {
    let server = MockServer::start().await;
    mount_single_claim(
        &server,
        "determine-riskgroup",
        json!({
            "age": {"value": 40, "type": "Integer"},
            "carMake": {"value": "Toyota", "type": "String"},
            "carModel": {"value": "Corolla", "type": "String"},
            "region": {"value": "rural Kent", "type": "String"},
            "applicantName": {"value": "Ada Lovelace", "type": "String"},
        }),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/external-task/claim-1/complete"))
        .and(body_partial_json(json!({
            "workerId": "insurance-test-worker",
            "variables": {
                "riskRating": {"value": "Green", "type": "String"},
                "riskScore": {"value": 15, "type": "Integer"},
                "calculatedPremium": {"value": 340.0, "type": "Double"},
            },
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    run_briefly(&server).await;
}

#[tokio::test]
async fn exotic_vehicle_is_reported_on_the_error_channel() {
    let server = MockServer::start().await;
    mount_single_claim(
        &server,
        "determine-riskgroup",
        json!({
            "age": {"value": 22, "type": "Integer"},
            "carMake": {"value": "Porsche", "type": "String"},
            "carModel": {"value": "911", "type": "String"},
            "region": {"value": "London", "type": "String"},
        }),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/external-task/claim-1/bpmnError"))
        .and(body_partial_json(json!({
            "errorCode": "unsupported-vehicle",
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    run_briefly(&server).await;

    // the rejection is modeled, not technical: no failure report happens
    let failure_calls = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path().ends_with("/failure"))
        .count();
    assert_eq!(failure_calls, 0);
}

#[tokio::test]
async fn detailed_assessment_is_auto_approved_for_a_low_risk_profile() {
    let server = MockServer::start().await;
    mount_single_claim(
        &server,
        "calculate-detailed-risk",
        json!({
            "age": {"value": 40, "type": "Integer"},
            "carMake": {"value": "Toyota", "type": "String"},
            "carModel": {"value": "Corolla", "type": "String"},
            "region": {"value": "rural Hampshire", "type": "String"},
            "claimsCount": {"value": 0, "type": "Integer"},
        }),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/external-task/claim-1/complete"))
        .and(body_partial_json(json!({
            "workerId": "insurance-test-worker",
            "variables": {
                "riskRating": {"value": "Green", "type": "String"},
                "riskLevel": {"value": "LOW", "type": "String"},
                "recommendedAction": {"value": "AUTO_APPROVE", "type": "String"},
                "premiumMultiplier": {"value": 0.85, "type": "Double"},
            },
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    run_briefly(&server).await;
}

#[tokio::test]
async fn fetch_requests_scope_each_topic_to_its_handler_variables() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/external-task/fetchAndLock"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    run_briefly(&server).await;

    let requests = server.received_requests().await.unwrap_or_default();
    let body: serde_json::Value = requests
        .iter()
        .find(|r| r.url.path().ends_with("/fetchAndLock"))
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .expect("no fetch request was issued");

    let topics = body["topics"].as_array().unwrap();
    assert_eq!(topics.len(), 8);
    for topic in topics {
        let filter = topic["variables"].as_array().unwrap_or_else(|| {
            panic!("{} subscribed without a variable filter", topic["topicName"])
        });
        assert!(!filter.is_empty());
    }
    let detailed = topics
        .iter()
        .find(|t| t["topicName"] == "calculate-detailed-risk")
        .unwrap();
    assert!(detailed["variables"]
        .as_array()
        .unwrap()
        .contains(&json!("claimsCount")));
}
