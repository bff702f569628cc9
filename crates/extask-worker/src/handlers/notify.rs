//! Notification handlers: policyholder messages, manager review alerts, and
//! document requests.
//!
//! Delivery goes through the [`Notifier`] seam. The default [`LogNotifier`]
//! runs in mock mode — it logs the message instead of sending it — so the
//! process can be exercised end to end without a mail transport. Each
//! handler reports the delivery flag back as an output variable; a failed
//! delivery is process data, not a technical failure.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use extask_core::{HandlerError, TaskClaim, TopicHandler, Value, Variables};

use super::timestamp;

const DEFAULT_REJECTION_REASON: &str = "Application did not meet underwriting criteria.";
const DEFAULT_DOCUMENTS: [&str; 3] = ["driving_license", "proof_of_address", "vehicle_registration"];

/// Outbound notification channel.
pub trait Notifier: Send + Sync {
    fn approval(&self, to: &str, name: &str, policy_number: &str, premium: f64) -> bool;
    fn rejection(&self, to: &str, name: &str, reason: &str) -> bool;
    fn manager_review(
        &self,
        application_id: &str,
        name: &str,
        rating: &str,
        score: f64,
        premium: f64,
    ) -> bool;
    fn document_request(&self, to: &str, name: &str, documents: &[String], application_id: &str)
        -> bool;
}

/// Mock-mode notifier: logs every message and reports it delivered.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn approval(&self, to: &str, name: &str, policy_number: &str, premium: f64) -> bool {
        info!(to, name, policy_number, premium, "approval notification");
        true
    }

    fn rejection(&self, to: &str, name: &str, reason: &str) -> bool {
        info!(to, name, reason, "rejection notification");
        true
    }

    fn manager_review(
        &self,
        application_id: &str,
        name: &str,
        rating: &str,
        score: f64,
        premium: f64,
    ) -> bool {
        info!(application_id, name, rating, score, premium, "manager review alert");
        true
    }

    fn document_request(
        &self,
        to: &str,
        name: &str,
        documents: &[String],
        application_id: &str,
    ) -> bool {
        info!(to, name, ?documents, application_id, "document request");
        true
    }
}

/// `send-policyholder-message`: approval or rejection, chosen by the
/// `approved` variable the review set upstream.
pub struct PolicyholderMessage {
    notifier: Arc<dyn Notifier>,
}

impl PolicyholderMessage {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl TopicHandler for PolicyholderMessage {
    async fn handle(&self, task: &TaskClaim) -> Result<Variables, HandlerError> {
        let vars = &task.variables;
        let name = vars.get_str("applicantName").unwrap_or("Customer");
        let email = vars.get_str("applicantEmail").unwrap_or("");
        // Review forms sometimes hand the flag through as a string.
        let approved = vars.get_bool("approved").unwrap_or_else(|| {
            vars.get_str("approved")
                .map(|s| s.eq_ignore_ascii_case("true"))
                .unwrap_or(false)
        });

        let (sent, notification_type) = if approved {
            let premium = vars.get_f64("calculatedPremium").unwrap_or(500.0);
            let policy_number = vars.get_str("policyNumber").unwrap_or("POL-UNKNOWN");
            (
                self.notifier.approval(email, name, policy_number, premium),
                "APPROVAL",
            )
        } else {
            let reason = vars
                .get_str("rejectionReason")
                .unwrap_or(DEFAULT_REJECTION_REASON);
            (self.notifier.rejection(email, name, reason), "REJECTION")
        };

        Ok(Variables::new()
            .with("emailSent", sent)
            .with("notificationType", notification_type)
            .with("timestamp", timestamp()))
    }
}

/// `inform-manager`: review alert for applications the gateway rated Yellow.
pub struct InformManager {
    notifier: Arc<dyn Notifier>,
}

impl InformManager {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl TopicHandler for InformManager {
    async fn handle(&self, task: &TaskClaim) -> Result<Variables, HandlerError> {
        let vars = &task.variables;
        let name = vars.get_str("applicantName").unwrap_or("Unknown");
        let rating = vars.get_str("riskRating").unwrap_or("Yellow");
        let score = vars.get_f64("riskScore").unwrap_or(50.0);
        let application_id = vars.get_str("applicationId").unwrap_or("UNKNOWN");
        let premium = vars.get_f64("calculatedPremium").unwrap_or(500.0);

        let notified = self
            .notifier
            .manager_review(application_id, name, rating, score, premium);

        Ok(Variables::new()
            .with("managerNotified", notified)
            .with("timestamp", timestamp()))
    }
}

/// `request-documents`: asks the applicant for whatever is missing.
pub struct RequestDocuments {
    notifier: Arc<dyn Notifier>,
}

impl RequestDocuments {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// `missingDocuments` may arrive as a Json array, a JSON-encoded string,
    /// or a single bare name.
    fn documents(value: Option<&Value>) -> Vec<String> {
        let parsed = match value {
            Some(Value::Json(serde_json::Value::Array(items))) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(raw)) => serde_json::from_str::<Vec<String>>(raw)
                .unwrap_or_else(|_| vec![raw.clone()]),
            _ => Vec::new(),
        };
        if parsed.is_empty() {
            DEFAULT_DOCUMENTS.iter().map(|d| d.to_string()).collect()
        } else {
            parsed
        }
    }
}

#[async_trait]
impl TopicHandler for RequestDocuments {
    async fn handle(&self, task: &TaskClaim) -> Result<Variables, HandlerError> {
        let vars = &task.variables;
        let name = vars.get_str("applicantName").unwrap_or("Customer");
        let email = vars.get_str("applicantEmail").unwrap_or("");
        let application_id = vars.get_str("applicationId").unwrap_or("UNKNOWN");
        let documents = Self::documents(vars.get("missingDocuments"));

        let sent = self
            .notifier
            .document_request(email, name, &documents, application_id);

        Ok(Variables::new()
            .with("documentRequestSent", sent)
            .with("requestedDocuments", json!(documents))
            .with("timestamp", timestamp()))
    }
}
