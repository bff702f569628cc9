//! Risk scoring for `determine-riskgroup`.
//!
//! Scores an application from age, vehicle, and region, maps the score onto
//! the Green/Yellow/Red gateway values, and prices the premium. Exotic makes
//! are a modeled rejection: the process routes them to a specialist
//! underwriter via the `unsupported-vehicle` error, not through retries.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use extask_core::{Handler, HandlerError, TopicPayload, Variables};

use super::{round2, timestamp};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RiskApplication {
    pub age: i64,
    pub car_make: String,
    pub car_model: String,
    pub region: String,
    pub applicant_name: String,
}

impl Default for RiskApplication {
    fn default() -> Self {
        Self {
            age: 30,
            car_make: "Unknown".to_string(),
            car_model: "Unknown".to_string(),
            region: "Unknown".to_string(),
            applicant_name: "Unknown".to_string(),
        }
    }
}

impl TopicPayload for RiskApplication {
    const TOPIC: &'static str = "determine-riskgroup";
}

const EXOTIC_MAKES: [&str; 3] = ["ferrari", "lamborghini", "porsche"];
const PREMIUM_MAKES: [&str; 3] = ["bmw", "mercedes", "audi"];
const RELIABLE_MAKES: [&str; 3] = ["toyota", "honda", "volvo"];
const PERFORMANCE_KEYWORDS: [&str; 5] = ["sport", "gt", "turbo", "amg", "rs"];
const HIGH_RISK_REGIONS: [&str; 3] = ["london", "manchester", "birmingham"];
const LOW_RISK_REGIONS: [&str; 2] = ["rural", "village"];

fn risk_score(application: &RiskApplication) -> i64 {
    let make = application.car_make.to_lowercase();
    let model = application.car_model.to_lowercase();
    let region = application.region.to_lowercase();

    let mut score: i64 = 50;

    score += match application.age {
        ..21 => 35,
        21..25 => 25,
        25..30 => 10,
        30..60 => -15,
        60..70 => 0,
        70.. => 20,
    };

    if PREMIUM_MAKES.iter().any(|m| make.contains(m)) {
        score += 15;
    } else if RELIABLE_MAKES.iter().any(|m| make.contains(m)) {
        score -= 10;
    }

    if PERFORMANCE_KEYWORDS.iter().any(|kw| model.contains(kw)) {
        score += 15;
    }

    if HIGH_RISK_REGIONS.iter().any(|area| region.contains(area)) {
        score += 15;
    } else if LOW_RISK_REGIONS.iter().any(|area| region.contains(area)) {
        score -= 10;
    }

    score.clamp(0, 100)
}

/// Gateway rating plus pricing inputs for a score.
fn rating_band(score: i64) -> (&'static str, f64, f64) {
    match score {
        ..=35 => ("Green", 0.85, 400.0),
        36..=65 => ("Yellow", 1.3, 500.0),
        _ => ("Red", 2.5, 600.0),
    }
}

fn hex_upper(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

fn policy_number() -> String {
    let suffix: [u8; 3] = rand::random();
    format!("POL-{}-{}", Utc::now().format("%Y%m%d"), hex_upper(&suffix))
}

fn application_id() -> String {
    let suffix: [u8; 4] = rand::random();
    format!("APP-{}", hex_upper(&suffix))
}

pub struct RiskAssessor;

#[async_trait]
impl Handler<RiskApplication> for RiskAssessor {
    async fn handle(&self, application: RiskApplication) -> Result<Variables, HandlerError> {
        let make = application.car_make.to_lowercase();
        if EXOTIC_MAKES.iter().any(|m| make.contains(m)) {
            return Err(HandlerError::business(
                "unsupported-vehicle",
                format!(
                    "no automated quote for '{}': exotic vehicles require a specialist underwriter",
                    application.car_make
                ),
            ));
        }

        let score = risk_score(&application);
        let (rating, multiplier, base_premium) = rating_band(score);
        let premium = round2(base_premium * multiplier);

        info!(
            applicant = %application.applicant_name,
            age = application.age,
            make = %application.car_make,
            model = %application.car_model,
            score,
            rating,
            premium,
            "risk assessed"
        );

        Ok(Variables::new()
            .with("riskRating", rating)
            .with("riskScore", score)
            .with("calculatedPremium", premium)
            .with("policyNumber", policy_number())
            .with("applicationId", application_id())
            .with("assessmentTimestamp", timestamp()))
    }
}
