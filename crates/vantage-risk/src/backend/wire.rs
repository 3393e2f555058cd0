//! JSON shapes exchanged with the decisioning backend.
//!
//! Response fields are optional on purpose: callers default missing values field by field
//! instead of rejecting the whole payload.

use serde::{Deserialize, Serialize};

use crate::underwriting::ApplicantProfile;

pub const ANALYZE_PATH: &str = "/analyze";
pub const LEDGER_PATH: &str = "/audit-summary";
pub const SEARCH_PATH: &str = "/search";
pub const METRICS_PATH: &str = "/metrics";
pub const SIMULATION_PATH: &str = "/run-simulation";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub income: f64,
    pub fico: u16,
    pub dti: f64,
    pub loan_amnt: f64,
    pub risk_lambda: f64,
}

impl From<&ApplicantProfile> for AnalyzeRequest {
    fn from(profile: &ApplicantProfile) -> Self {
        Self {
            income: profile.income(),
            fico: profile.fico_score(),
            dti: profile.debt_to_income(),
            loan_amnt: profile.loan_amount(),
            risk_lambda: profile.risk_aversion(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub decision: Option<String>,
    #[serde(default)]
    pub utility_score: Option<f64>,
    #[serde(default)]
    pub risk_percentage: Option<NumericField>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// A number the backend sometimes renders as a formatted string (`"18.2"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericField {
    Number(f64),
    Text(String),
}

impl NumericField {
    pub fn value(&self) -> Option<f64> {
        match self {
            NumericField::Number(value) => Some(*value),
            NumericField::Text(raw) => raw.trim().trim_end_matches('%').trim().parse().ok(),
        }
    }
}

/// Body of `GET /audit-summary`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerPage {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub approval_rate: Option<f64>,
    #[serde(default)]
    pub avg_utility: Option<f64>,
    #[serde(default)]
    pub logs: Option<Vec<RawLedgerEntry>>,
}

/// Ledger row as stored by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLedgerEntry {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub fico: Option<f64>,
    #[serde(default)]
    pub utility: Option<f64>,
    #[serde(default)]
    pub decision: Option<String>,
    #[serde(default)]
    pub income: Option<f64>,
    #[serde(default)]
    pub dti: Option<f64>,
    #[serde(default)]
    pub loan_amnt: Option<f64>,
    #[serde(default)]
    pub risk_lambda: Option<f64>,
}

/// Body of `GET /run-simulation`. The backend reports failures as `{"error": ...}` with a
/// success status, so `error` is checked before the profits are trusted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationPayload {
    #[serde(default)]
    pub rule_based_profit: Option<f64>,
    #[serde(default)]
    pub ai_utility_profit: Option<f64>,
    #[serde(default)]
    pub improvement: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `GET /metrics`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetricsPayload {
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub precision: Option<f64>,
    #[serde(default)]
    pub recall: Option<f64>,
    #[serde(default)]
    pub f1_score: Option<f64>,
}
