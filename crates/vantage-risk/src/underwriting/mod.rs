//! Expected-utility decisioning: applicant profiles, backend-delegated analysis, and the
//! local helpers used to explain and cross-check a decision.

pub mod domain;
pub mod engine;

pub use domain::{
    ApplicantProfile, BaselineComparison, Decision, FrontierPoint, ProfileError, ProfileInput,
    RiskBand, SimulationResult, Verdict,
};
pub use engine::{
    classify, classify_utility, compare_with_baseline, cross_check, legacy_verdict,
    normalize_decision, simulation_delta, utility_frontier, DecisionError, UtilityEngine,
};
