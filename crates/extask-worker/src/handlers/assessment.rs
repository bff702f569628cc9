//! Detailed risk assessment topics.
//!
//! Four topics behind one weighted multi-factor calculator:
//! - `calculate-detailed-risk`: per-factor scoring (age, vehicle, region,
//!   claims history, optional driving experience) with a weighted overall
//!   score, risk level, and gateway rating.
//! - `evaluate-premium`: prices a premium from risk score, coverage level,
//!   and deductible.
//! - `check-fraud-indicators`: fraud screen.
//! - `validate-risk-data`: input validation with errors vs. warnings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use extask_core::{Handler, HandlerError, TopicPayload, Variables};

use super::{round2, timestamp};

const W_DRIVER_AGE: f64 = 0.20;
const W_DRIVING_EXPERIENCE: f64 = 0.10;
const W_VEHICLE_MAKE: f64 = 0.12;
const W_VEHICLE_MODEL: f64 = 0.08;
const W_REGION: f64 = 0.12;
const W_CLAIMS_HISTORY: f64 = 0.18;

/// Size of the full factor catalogue. Vehicle age, annual mileage, and
/// storage type are catalogued but not scored yet, so assessments that
/// cover fewer of the nine factors report lower confidence.
const FACTOR_CATALOGUE: f64 = 9.0;

/// One scored input to the overall assessment, reported back to the
/// process as part of the `factors` output variable.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RiskFactor {
    name: &'static str,
    category: &'static str,
    raw_value: String,
    score: f64,
    weight: f64,
    contribution: f64,
    description: String,
}

fn factor(
    name: &'static str,
    category: &'static str,
    raw: impl std::fmt::Display,
    score: f64,
    weight: f64,
    description: impl Into<String>,
) -> RiskFactor {
    RiskFactor {
        name,
        category,
        raw_value: raw.to_string(),
        score,
        weight,
        contribution: round2(score * weight),
        description: description.into(),
    }
}

fn age_risk(age: i64) -> RiskFactor {
    let (score, description) = match age {
        ..18 => (100.0, "Underage - cannot be insured"),
        18..21 => (90.0, "Very young driver - highest risk"),
        21..25 => (75.0, "Young driver - elevated risk"),
        25..30 => (55.0, "Young adult - moderate risk"),
        30..50 => (30.0, "Prime age - lowest risk"),
        50..60 => (40.0, "Mature driver - low risk"),
        60..70 => (55.0, "Senior - moderate risk"),
        70..75 => (70.0, "Elderly - elevated risk"),
        75.. => (85.0, "Very elderly - high risk"),
    };
    factor("Driver Age", "Driver", age, score, W_DRIVER_AGE, description)
}

fn make_risk(make: &str) -> RiskFactor {
    let (score, description) = match make.to_lowercase().as_str() {
        "ferrari" | "lamborghini" => (95.0, "Exotic - extreme risk"),
        "porsche" => (80.0, "Sports car - high risk"),
        "bmw" => (58.0, "Premium - moderate risk"),
        "mercedes" => (56.0, "Premium - moderate risk"),
        "audi" => (54.0, "Premium - moderate risk"),
        "tesla" => (55.0, "Electric performance - moderate"),
        "toyota" => (28.0, "Reliable - low risk"),
        "honda" => (30.0, "Reliable - low risk"),
        "volvo" => (25.0, "Safety focused - lowest risk"),
        "ford" => (45.0, "Mainstream - average"),
        "hyundai" => (38.0, "Mainstream - low-moderate"),
        "kia" => (40.0, "Mainstream - low-moderate"),
        "mazda" => (35.0, "Reliable - low risk"),
        "subaru" => (38.0, "AWD - low-moderate risk"),
        _ => (50.0, "Unknown make - average assumed"),
    };
    factor("Vehicle Make", "Vehicle", make, score, W_VEHICLE_MAKE, description)
}

const PERFORMANCE_VARIANTS: [&str; 10] = [
    "sport", "gt", "turbo", "rs", "amg", "m3", "m5", "type r", "sti", "nismo",
];
const ECONOMY_VARIANTS: [&str; 5] = ["hybrid", "eco", "base", "family", "standard"];

fn model_risk(model: &str) -> RiskFactor {
    let lower = model.to_lowercase();
    let mut score = 50.0;
    let mut description = "Standard variant".to_string();
    if let Some(kw) = PERFORMANCE_VARIANTS.iter().find(|kw| lower.contains(*kw)) {
        score = 75.0;
        description = format!("Performance variant ({kw}) - elevated risk");
    }
    // an economy trim on a performance-badged model prices as economy
    if let Some(kw) = ECONOMY_VARIANTS.iter().find(|kw| lower.contains(*kw)) {
        score = 35.0;
        description = format!("Economy variant ({kw}) - reduced risk");
    }
    factor("Vehicle Model", "Vehicle", model, score, W_VEHICLE_MODEL, description)
}

const HIGH_RISK_AREAS: [&str; 5] = ["london", "manchester", "birmingham", "liverpool", "leeds"];
const MEDIUM_RISK_AREAS: [&str; 5] = [
    "bristol",
    "sheffield",
    "nottingham",
    "leicester",
    "newcastle",
];
const LOW_RISK_AREAS: [&str; 6] = ["rural", "village", "countryside", "scotland", "wales", "cornwall"];

fn region_risk(region: &str) -> RiskFactor {
    let lower = region.to_lowercase();
    let mut score = 50.0;
    let mut description = "Average region - standard risk".to_string();
    if let Some(area) = HIGH_RISK_AREAS.iter().find(|area| lower.contains(*area)) {
        score = 75.0;
        description = format!("Urban area ({area}) - high theft/accident rate");
    }
    if let Some(area) = MEDIUM_RISK_AREAS.iter().find(|area| lower.contains(*area)) {
        score = 60.0;
        description = format!("City area ({area}) - moderate risk");
    }
    if LOW_RISK_AREAS.iter().any(|area| lower.contains(area)) {
        score = 30.0;
        description = "Rural/low-traffic area - reduced risk".to_string();
    }
    factor("Region", "Geographic", region, score, W_REGION, description)
}

fn claims_risk(claims: i64) -> RiskFactor {
    let (score, description) = match claims {
        ..=0 => (10.0, "No claims in 5 years - excellent".to_string()),
        1 => (40.0, "1 claim - minor impact".to_string()),
        2 => (60.0, "2 claims - moderate concern".to_string()),
        3..=4 => (80.0, format!("{claims} claims - significant risk")),
        _ => (95.0, format!("{claims} claims - very high risk")),
    };
    factor("Claims History", "Historical", claims, score, W_CLAIMS_HISTORY, description)
}

fn experience_risk(years: i64) -> RiskFactor {
    let (score, description) = match years {
        ..1 => (85.0, "New driver - very limited experience"),
        1 => (70.0, "Novice driver - limited experience"),
        2..5 => (50.0, "Developing driver - moderate experience"),
        5..10 => (35.0, "Experienced driver - good track record"),
        10.. => (25.0, "Very experienced driver"),
    };
    factor(
        "Driving Experience",
        "Driver",
        years,
        score,
        W_DRIVING_EXPERIENCE,
        description,
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RiskLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
    Uninsurable,
}

impl RiskLevel {
    fn from_score(score: f64) -> Self {
        match score {
            s if s <= 25.0 => RiskLevel::VeryLow,
            s if s <= 40.0 => RiskLevel::Low,
            s if s <= 55.0 => RiskLevel::Medium,
            s if s <= 70.0 => RiskLevel::High,
            s if s <= 85.0 => RiskLevel::VeryHigh,
            _ => RiskLevel::Uninsurable,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            RiskLevel::VeryLow => "VERY_LOW",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::VeryHigh => "VERY_HIGH",
            RiskLevel::Uninsurable => "UNINSURABLE",
        }
    }

    /// Gateway rating, recommended action, and premium multiplier.
    fn gateway(&self) -> (&'static str, &'static str, f64) {
        match self {
            RiskLevel::VeryLow | RiskLevel::Low => ("Green", "AUTO_APPROVE", 0.85),
            RiskLevel::Medium => ("Yellow", "MANUAL_REVIEW", 1.25),
            RiskLevel::High => ("Yellow", "MANUAL_REVIEW", 1.75),
            RiskLevel::VeryHigh => ("Red", "HIGH_RISK_REVIEW", 2.5),
            RiskLevel::Uninsurable => ("Red", "REJECT", 2.5),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetailedRiskRequest {
    pub age: i64,
    pub car_make: String,
    pub car_model: String,
    pub region: String,
    pub claims_count: i64,
    pub driving_years: Option<i64>,
}

impl Default for DetailedRiskRequest {
    fn default() -> Self {
        Self {
            age: 30,
            car_make: "Unknown".to_string(),
            car_model: "Unknown".to_string(),
            region: "Unknown".to_string(),
            claims_count: 0,
            driving_years: None,
        }
    }
}

impl TopicPayload for DetailedRiskRequest {
    const TOPIC: &'static str = "calculate-detailed-risk";
}

pub struct DetailedRiskAssessor;

#[async_trait]
impl Handler<DetailedRiskRequest> for DetailedRiskAssessor {
    async fn handle(&self, request: DetailedRiskRequest) -> Result<Variables, HandlerError> {
        let mut factors = vec![
            age_risk(request.age),
            make_risk(&request.car_make),
            model_risk(&request.car_model),
            region_risk(&request.region),
            claims_risk(request.claims_count),
        ];
        if let Some(years) = request.driving_years {
            factors.push(experience_risk(years));
        }

        let total_weight: f64 = factors.iter().map(|f| f.weight).sum();
        let overall = factors.iter().map(|f| f.contribution).sum::<f64>() / total_weight;
        let level = RiskLevel::from_score(overall);
        let (rating, action, multiplier) = level.gateway();
        let confidence = (0.6 + factors.len() as f64 / FACTOR_CATALOGUE * 0.35).min(0.95);

        info!(
            age = request.age,
            make = %request.car_make,
            score = round2(overall),
            level = level.label(),
            rating,
            "detailed risk assessed"
        );

        let encoded = serde_json::to_value(&factors)
            .map_err(|e| HandlerError::technical(format!("factor encode: {e}")))?;
        Ok(Variables::new()
            .with("riskRating", rating)
            .with("overallScore", round2(overall))
            .with("riskLevel", level.label())
            .with("factors", encoded)
            .with("premiumMultiplier", multiplier)
            .with("recommendedAction", action)
            .with("confidence", round3(confidence))
            .with("assessmentTimestamp", timestamp()))
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PremiumRequest {
    pub risk_score: f64,
    pub base_premium: f64,
    pub coverage_level: String,
    pub deductible: f64,
}

impl Default for PremiumRequest {
    fn default() -> Self {
        Self {
            risk_score: 50.0,
            base_premium: 500.0,
            coverage_level: "standard".to_string(),
            deductible: 500.0,
        }
    }
}

impl TopicPayload for PremiumRequest {
    const TOPIC: &'static str = "evaluate-premium";
}

/// Minimum annual premium regardless of discounts.
const PREMIUM_FLOOR: f64 = 200.0;

pub struct PremiumEvaluator;

#[async_trait]
impl Handler<PremiumRequest> for PremiumEvaluator {
    async fn handle(&self, request: PremiumRequest) -> Result<Variables, HandlerError> {
        let risk_multiplier = if request.risk_score <= 30.0 {
            0.8
        } else if request.risk_score <= 50.0 {
            1.0
        } else if request.risk_score <= 70.0 {
            1.4
        } else {
            2.0
        };

        let coverage_multiplier = match request.coverage_level.to_lowercase().as_str() {
            "basic" => 0.7,
            "standard" => 1.0,
            "comprehensive" => 1.5,
            "premium" => 2.0,
            _ => 1.0,
        };

        let deductible_discount = if request.deductible >= 1000.0 {
            0.85
        } else if request.deductible >= 750.0 {
            0.90
        } else if request.deductible >= 500.0 {
            0.95
        } else {
            1.0
        };

        let after_risk = request.base_premium * risk_multiplier;
        let after_coverage = after_risk * coverage_multiplier;
        let final_premium = (after_coverage * deductible_discount).max(PREMIUM_FLOOR);

        info!(
            base = request.base_premium,
            risk_score = request.risk_score,
            premium = round2(final_premium),
            "premium evaluated"
        );

        Ok(Variables::new()
            .with("calculatedPremium", round2(final_premium))
            .with("riskMultiplier", risk_multiplier)
            .with("coverageMultiplier", coverage_multiplier)
            .with("deductibleDiscount", deductible_discount)
            .with(
                "premiumBreakdown",
                json!({
                    "base": request.base_premium,
                    "afterRisk": round2(after_risk),
                    "afterCoverage": round2(after_coverage),
                    "final": round2(final_premium),
                }),
            )
            .with("calculationTimestamp", timestamp()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FraudScreenRequest {
    pub applicant_id: String,
}

impl Default for FraudScreenRequest {
    fn default() -> Self {
        Self {
            applicant_id: "Unknown".to_string(),
        }
    }
}

impl TopicPayload for FraudScreenRequest {
    const TOPIC: &'static str = "check-fraud-indicators";
}

pub struct FraudScreen;

#[async_trait]
impl Handler<FraudScreenRequest> for FraudScreen {
    async fn handle(&self, request: FraudScreenRequest) -> Result<Variables, HandlerError> {
        info!(applicant_id = %request.applicant_id, "fraud indicators checked");

        // Placeholder score until the external screening service is wired up;
        // the process contract (flags + thresholds) is already final.
        let fraud_score: i64 = 10;
        Ok(Variables::new()
            .with("fraudCheckPassed", fraud_score < 50)
            .with("fraudScore", fraud_score)
            .with("fraudIndicators", json!([]))
            .with("requiresManualReview", fraud_score >= 30)
            .with("checkTimestamp", timestamp()))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationRequest {
    pub age: Option<i64>,
    pub car_make: Option<String>,
    pub region: Option<String>,
}

impl TopicPayload for ValidationRequest {
    const TOPIC: &'static str = "validate-risk-data";
}

pub struct DataValidator;

#[async_trait]
impl Handler<ValidationRequest> for DataValidator {
    async fn handle(&self, request: ValidationRequest) -> Result<Variables, HandlerError> {
        let mut errors: Vec<String> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();

        match request.age {
            None => errors.push("Age is required".to_string()),
            Some(age) if age < 17 => {
                errors.push("Driver must be at least 17 years old".to_string())
            }
            Some(age) if age > 100 => {
                warnings.push("Please verify age - value seems high".to_string())
            }
            Some(_) => {}
        }

        match request.car_make.as_deref() {
            None => errors.push("Vehicle make is required".to_string()),
            Some(make) if make.is_empty() || make.eq_ignore_ascii_case("unknown") => {
                errors.push("Vehicle make is required".to_string())
            }
            Some(_) => {}
        }

        match request.region.as_deref() {
            None => warnings.push("Region not specified - using default rates".to_string()),
            Some(region) if region.is_empty() || region.eq_ignore_ascii_case("unknown") => {
                warnings.push("Region not specified - using default rates".to_string())
            }
            Some(_) => {}
        }

        Ok(Variables::new()
            .with("dataValid", errors.is_empty())
            .with("validationErrors", json!(errors))
            .with("validationWarnings", json!(warnings))
            .with("validationTimestamp", timestamp()))
    }
}
