//! Topic handlers for the insurance application process.
//!
//! Insurance worker topics:
//! - `determine-riskgroup`: risk scoring and premium calculation
//! - `send-policyholder-message`: approval/rejection notification
//! - `inform-manager`: review alert for Yellow-rated applications
//! - `request-documents`: missing-document request
//!
//! Detailed assessment topics:
//! - `calculate-detailed-risk`: weighted multi-factor risk assessment
//! - `evaluate-premium`: premium pricing from score/coverage/deductible
//! - `check-fraud-indicators`: fraud screen
//! - `validate-risk-data`: input validation

pub mod assessment;
pub mod notify;
pub mod risk;

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use extask_core::{HandlerRegistry, TopicConfig, WorkerError};

use assessment::{
    DataValidator, DetailedRiskAssessor, DetailedRiskRequest, FraudScreen, FraudScreenRequest,
    PremiumEvaluator, PremiumRequest, ValidationRequest,
};
use notify::{InformManager, Notifier, PolicyholderMessage, RequestDocuments};
use risk::{RiskApplication, RiskAssessor};

/// Register every topic this worker serves.
pub fn register_all(
    registry: &mut HandlerRegistry,
    notifier: Arc<dyn Notifier>,
) -> Result<(), WorkerError> {
    register_insurance(registry, notifier)?;
    register_assessment(registry)?;
    Ok(())
}

/// Insurance application topics (scoring plus notifications).
pub fn register_insurance(
    registry: &mut HandlerRegistry,
    notifier: Arc<dyn Notifier>,
) -> Result<(), WorkerError> {
    registry.register_typed::<RiskApplication, _>(
        topic_config(&[
            "age",
            "carMake",
            "carModel",
            "region",
            "applicantName",
            "applicantEmail",
        ]),
        RiskAssessor,
    )?;
    registry.register(
        "send-policyholder-message",
        topic_config(&[
            "applicantName",
            "applicantEmail",
            "approved",
            "riskRating",
            "calculatedPremium",
            "policyNumber",
            "rejectionReason",
        ]),
        Arc::new(PolicyholderMessage::new(Arc::clone(&notifier))),
    )?;
    registry.register(
        "inform-manager",
        topic_config(&[
            "applicantName",
            "applicantEmail",
            "riskRating",
            "riskScore",
            "applicationId",
            "calculatedPremium",
        ]),
        Arc::new(InformManager::new(Arc::clone(&notifier))),
    )?;
    registry.register(
        "request-documents",
        topic_config(&[
            "applicantName",
            "applicantEmail",
            "missingDocuments",
            "applicationId",
        ]),
        Arc::new(RequestDocuments::new(notifier)),
    )?;
    Ok(())
}

/// Detailed risk assessment topics.
pub fn register_assessment(registry: &mut HandlerRegistry) -> Result<(), WorkerError> {
    registry.register_typed::<DetailedRiskRequest, _>(
        topic_config(&[
            "age",
            "carMake",
            "carModel",
            "region",
            "claimsCount",
            "drivingYears",
        ]),
        DetailedRiskAssessor,
    )?;
    registry.register_typed::<PremiumRequest, _>(
        topic_config(&["riskScore", "basePremium", "coverageLevel", "deductible"]),
        PremiumEvaluator,
    )?;
    registry.register_typed::<FraudScreenRequest, _>(topic_config(&["applicantId"]), FraudScreen)?;
    registry.register_typed::<ValidationRequest, _>(
        topic_config(&["age", "carMake", "carModel", "region"]),
        DataValidator,
    )?;
    Ok(())
}

/// Topic configuration scoped to the variables the handler actually reads,
/// so the engine does not ship the whole process state with every claim.
fn topic_config(variables: &[&str]) -> TopicConfig {
    TopicConfig {
        fetch_variables: Some(variables.iter().map(|v| (*v).to_string()).collect()),
        ..TopicConfig::default()
    }
}

/// UTC timestamp reported in output variables.
pub(crate) fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Round to two decimal places (currency and reported scores).
pub(crate) fn round2(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::notify::LogNotifier;

    fn full_registry() -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        register_all(&mut registry, Arc::new(LogNotifier)).unwrap();
        registry
    }

    #[test]
    fn registers_both_topic_families() {
        let registry = full_registry();
        assert_eq!(
            registry.topics(),
            vec![
                "calculate-detailed-risk",
                "check-fraud-indicators",
                "determine-riskgroup",
                "evaluate-premium",
                "inform-manager",
                "request-documents",
                "send-policyholder-message",
                "validate-risk-data",
            ]
        );
    }

    #[test]
    fn every_topic_carries_a_variable_filter() {
        let registry = full_registry();
        for registration in registry.registrations() {
            let filter = registration
                .config
                .fetch_variables
                .as_ref()
                .unwrap_or_else(|| panic!("{} fetches all variables", registration.topic));
            assert!(!filter.is_empty(), "{} has an empty filter", registration.topic);
        }
    }

    #[test]
    fn riskgroup_filter_names_the_scoring_inputs() {
        let registry = full_registry();
        let filter = registry
            .get("determine-riskgroup")
            .unwrap()
            .config
            .fetch_variables
            .clone()
            .unwrap();
        for name in ["age", "carMake", "carModel", "region"] {
            assert!(filter.iter().any(|v| v == name), "missing {name}");
        }
    }
}
