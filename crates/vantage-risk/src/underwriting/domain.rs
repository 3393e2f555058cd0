use std::fmt;

use serde::{Deserialize, Serialize};

pub const FICO_RANGE: (u16, u16) = (300, 850);
pub const RISK_AVERSION_RANGE: (f64, f64) = (1.0, 5.0);

/// Final recommendation for an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Approve,
    Reject,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Approve => "APPROVE",
            Verdict::Reject => "REJECT",
        }
    }

    /// Case-insensitive match against the backend's verdict labels.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "APPROVE" | "APPROVED" => Some(Verdict::Approve),
            "REJECT" | "REJECTED" => Some(Verdict::Reject),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Operator-entered applicant attributes. Ranges are checked on construction and the
/// profile is immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProfileInput")]
pub struct ApplicantProfile {
    income: f64,
    fico_score: u16,
    debt_to_income: f64,
    loan_amount: f64,
    risk_aversion: f64,
}

/// Unchecked form of [`ApplicantProfile`], as entered by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ProfileInput {
    pub income: f64,
    pub fico_score: u16,
    pub debt_to_income: f64,
    pub loan_amount: f64,
    pub risk_aversion: f64,
}

impl ApplicantProfile {
    pub fn new(
        income: f64,
        fico_score: u16,
        debt_to_income: f64,
        loan_amount: f64,
        risk_aversion: f64,
    ) -> Result<Self, ProfileError> {
        if !income.is_finite() || income < 0.0 {
            return Err(ProfileError::Income(income));
        }
        if !(FICO_RANGE.0..=FICO_RANGE.1).contains(&fico_score) {
            return Err(ProfileError::FicoScore(fico_score));
        }
        if !debt_to_income.is_finite() || !(0.0..=100.0).contains(&debt_to_income) {
            return Err(ProfileError::DebtToIncome(debt_to_income));
        }
        if !loan_amount.is_finite() || loan_amount < 0.0 {
            return Err(ProfileError::LoanAmount(loan_amount));
        }
        if !risk_aversion.is_finite()
            || !(RISK_AVERSION_RANGE.0..=RISK_AVERSION_RANGE.1).contains(&risk_aversion)
        {
            return Err(ProfileError::RiskAversion(risk_aversion));
        }

        Ok(Self {
            income,
            fico_score,
            debt_to_income,
            loan_amount,
            risk_aversion,
        })
    }

    pub fn income(&self) -> f64 {
        self.income
    }

    pub fn fico_score(&self) -> u16 {
        self.fico_score
    }

    pub fn debt_to_income(&self) -> f64 {
        self.debt_to_income
    }

    pub fn loan_amount(&self) -> f64 {
        self.loan_amount
    }

    pub fn risk_aversion(&self) -> f64 {
        self.risk_aversion
    }
}

impl TryFrom<ProfileInput> for ApplicantProfile {
    type Error = ProfileError;

    fn try_from(input: ProfileInput) -> Result<Self, Self::Error> {
        ApplicantProfile::new(
            input.income,
            input.fico_score,
            input.debt_to_income,
            input.loan_amount,
            input.risk_aversion,
        )
    }
}

/// Field that failed applicant-profile validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProfileError {
    #[error("income must be a non-negative amount, got {0}")]
    Income(f64),
    #[error("FICO score must be within 300..=850, got {0}")]
    FicoScore(u16),
    #[error("debt-to-income must be a percentage within 0..=100, got {0}")]
    DebtToIncome(f64),
    #[error("loan amount must be a non-negative amount, got {0}")]
    LoanAmount(f64),
    #[error("risk aversion must be within 1.0..=5.0, got {0}")]
    RiskAversion(f64),
}

/// Normalized analysis result. Replaced wholesale by the next analysis, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub verdict: Verdict,
    pub expected_utility: f64,
    pub default_probability: f64,
    pub risk_aversion: f64,
    pub summary: String,
}

impl Decision {
    pub fn risk_band(&self) -> RiskBand {
        RiskBand::from_probability(self.default_probability)
    }
}

/// Coarse bucket for the probability-of-default gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskBand {
    Low,
    Elevated,
    High,
}

impl RiskBand {
    pub fn from_probability(percentage: f64) -> Self {
        if percentage > 50.0 {
            RiskBand::High
        } else if percentage > 30.0 {
            RiskBand::Elevated
        } else {
            RiskBand::Low
        }
    }
}

/// One point of the local utility linearization around the operating risk aversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrontierPoint {
    pub risk_aversion: f64,
    pub utility: f64,
    pub is_operating_point: bool,
}

/// Side-by-side view of the utility verdict and the legacy FICO cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BaselineComparison {
    pub utility_verdict: Verdict,
    pub legacy_verdict: Verdict,
    pub agrees: bool,
}

/// Portfolio comparison returned by the Monte Carlo backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub rule_based_profit: f64,
    pub ai_utility_profit: f64,
    pub improvement_pct: String,
}
