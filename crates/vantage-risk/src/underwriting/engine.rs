use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::domain::{
    ApplicantProfile, BaselineComparison, Decision, FrontierPoint, SimulationResult, Verdict,
};
use crate::backend::wire::ANALYZE_PATH;
use crate::backend::{
    AnalyzeRequest, AnalyzeResponse, BackendError, DecisionBackend, MalformedResponse,
};

pub const FRONTIER_POINTS: usize = 21;
pub const FRONTIER_START: f64 = 0.25;
pub const FRONTIER_STEP: f64 = 0.225;
pub const FRONTIER_SLOPE: f64 = 0.5;
pub const OPERATING_POINT_TOLERANCE: f64 = 0.1;
/// FICO cutoff of the legacy rulebook the utility model is benchmarked against.
pub const LEGACY_MIN_FICO: u16 = 640;

/// Raised when an analysis cannot be produced. The operator resubmits manually.
#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error("analysis backend unavailable: {0}")]
    BackendUnavailable(#[from] BackendError),
}

/// Turns applicant profiles into decisions by delegating the model to the backend.
pub struct UtilityEngine<B> {
    backend: Arc<B>,
    timeout: Duration,
}

impl<B> UtilityEngine<B>
where
    B: DecisionBackend + 'static,
{
    pub fn new(backend: Arc<B>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Request an analysis for `profile`. No retry is attempted on failure.
    pub async fn decide(&self, profile: &ApplicantProfile) -> Result<Decision, DecisionError> {
        let request = AnalyzeRequest::from(profile);
        let response = tokio::time::timeout(self.timeout, self.backend.analyze(&request))
            .await
            .map_err(|_| BackendError::Timeout {
                endpoint: ANALYZE_PATH,
                timeout_ms: self.timeout.as_millis() as u64,
            })??;

        let decision = normalize_decision(profile, response);
        if let Err(issue) = cross_check(&decision) {
            warn!(%issue, "backend verdict failed the sign cross-check");
        }

        info!(
            verdict = %decision.verdict,
            expected_utility = decision.expected_utility,
            default_probability = decision.default_probability,
            "analysis completed"
        );
        Ok(decision)
    }
}

/// Shape a backend response into a [`Decision`], defaulting missing fields one at a time.
pub fn normalize_decision(profile: &ApplicantProfile, response: AnalyzeResponse) -> Decision {
    let expected_utility = match response.utility_score {
        Some(value) if value.is_finite() => value,
        _ => {
            report(MalformedResponse::MissingField {
                endpoint: ANALYZE_PATH,
                field: "utility_score",
            });
            0.0
        }
    };

    let default_probability = match response.risk_percentage.as_ref().and_then(|v| v.value()) {
        Some(value) if value.is_finite() => value,
        _ => {
            report(MalformedResponse::MissingField {
                endpoint: ANALYZE_PATH,
                field: "risk_percentage",
            });
            0.0
        }
    };

    let verdict = match response.decision.as_deref() {
        Some(raw) => Verdict::parse(raw).unwrap_or_else(|| {
            report(MalformedResponse::UnknownVerdict {
                endpoint: ANALYZE_PATH,
                value: raw.to_string(),
            });
            classify_utility(expected_utility)
        }),
        None => {
            report(MalformedResponse::MissingField {
                endpoint: ANALYZE_PATH,
                field: "decision",
            });
            classify_utility(expected_utility)
        }
    };

    // The backend's own summary wins; the verdict label is only a fallback.
    let summary = response
        .summary
        .filter(|text| !text.trim().is_empty())
        .unwrap_or_else(|| match verdict {
            Verdict::Approve => "Positive Utility".to_string(),
            Verdict::Reject => "Negative Utility".to_string(),
        });

    Decision {
        verdict,
        expected_utility,
        default_probability,
        risk_aversion: profile.risk_aversion(),
        summary,
    }
}

fn report(issue: MalformedResponse) {
    warn!(%issue, "defaulting malformed analysis field");
}

/// First-order linearization of utility around the operating risk aversion.
pub fn utility_frontier(risk_aversion: f64, expected_utility: f64) -> Vec<FrontierPoint> {
    (0..FRONTIER_POINTS)
        .map(|i| {
            let lambda = FRONTIER_START + i as f64 * FRONTIER_STEP;
            FrontierPoint {
                risk_aversion: lambda,
                utility: expected_utility - (lambda - risk_aversion) * FRONTIER_SLOPE,
                is_operating_point: (lambda - risk_aversion).abs() < OPERATING_POINT_TOLERANCE,
            }
        })
        .collect()
}

pub fn classify(decision: &Decision) -> Verdict {
    classify_utility(decision.expected_utility)
}

pub fn classify_utility(expected_utility: f64) -> Verdict {
    if expected_utility > 0.0 {
        Verdict::Approve
    } else {
        Verdict::Reject
    }
}

/// Compare the backend verdict with the sign of its expected utility. Neither value is
/// overridden when they disagree.
pub fn cross_check(decision: &Decision) -> Result<(), MalformedResponse> {
    if classify(decision) == decision.verdict {
        Ok(())
    } else {
        Err(MalformedResponse::VerdictMismatch {
            verdict: decision.verdict,
            expected_utility: decision.expected_utility,
        })
    }
}

/// Profit uplift of the utility policy over the legacy rules, rounded half-up.
pub fn simulation_delta(simulation: &SimulationResult) -> i64 {
    let delta = simulation.ai_utility_profit - simulation.rule_based_profit;
    // Profits arrive in cents; snapping first keeps exact halves from drifting an ulp.
    let cents = (delta * 100.0).round() as i64;
    (cents + 50).div_euclid(100)
}

pub fn legacy_verdict(profile: &ApplicantProfile) -> Verdict {
    if profile.fico_score() >= LEGACY_MIN_FICO {
        Verdict::Approve
    } else {
        Verdict::Reject
    }
}

pub fn compare_with_baseline(profile: &ApplicantProfile, decision: &Decision) -> BaselineComparison {
    let legacy = legacy_verdict(profile);
    BaselineComparison {
        utility_verdict: decision.verdict,
        legacy_verdict: legacy,
        agrees: legacy == decision.verdict,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NumericField;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const EPSILON: f64 = 1e-9;

    fn profile() -> ApplicantProfile {
        ApplicantProfile::new(75_000.0, 710, 35.0, 15_000.0, 2.5).expect("valid profile")
    }

    fn decision(verdict: Verdict, expected_utility: f64) -> Decision {
        Decision {
            verdict,
            expected_utility,
            default_probability: 10.0,
            risk_aversion: 2.5,
            summary: String::new(),
        }
    }

    struct ScriptedBackend {
        response: Mutex<Option<Result<AnalyzeResponse, BackendError>>>,
        requests: Mutex<Vec<AnalyzeRequest>>,
    }

    impl ScriptedBackend {
        fn new(response: Result<AnalyzeResponse, BackendError>) -> Self {
            Self {
                response: Mutex::new(Some(response)),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DecisionBackend for ScriptedBackend {
        async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse, BackendError> {
            self.requests.lock().expect("lock").push(request.clone());
            self.response
                .lock()
                .expect("lock")
                .take()
                .expect("single scripted response")
        }
    }

    struct HangingBackend;

    #[async_trait]
    impl DecisionBackend for HangingBackend {
        async fn analyze(&self, _request: &AnalyzeRequest) -> Result<AnalyzeResponse, BackendError> {
            std::future::pending().await
        }
    }

    #[test]
    fn frontier_follows_the_affine_law() {
        for (risk_aversion, expected_utility) in [(2.5, 12.4), (1.0, -3.0), (5.0, 0.0)] {
            let points = utility_frontier(risk_aversion, expected_utility);
            assert_eq!(points.len(), FRONTIER_POINTS);
            for (i, point) in points.iter().enumerate() {
                let lambda = 0.25 + i as f64 * 0.225;
                assert!((point.risk_aversion - lambda).abs() < EPSILON);
                let expected = expected_utility - (lambda - risk_aversion) * 0.5;
                assert!((point.utility - expected).abs() < EPSILON);
            }
            assert!((points[0].risk_aversion - 0.25).abs() < EPSILON);
            assert!((points[20].risk_aversion - 4.75).abs() < EPSILON);
        }
    }

    #[test]
    fn frontier_marks_the_operating_point() {
        let points = utility_frontier(2.5, 12.4);
        let marked: Vec<_> = points.iter().filter(|p| p.is_operating_point).collect();
        assert_eq!(marked.len(), 1);
        assert!((marked[0].risk_aversion - 2.5).abs() < EPSILON);
        assert!((marked[0].utility - 12.4).abs() < EPSILON);
    }

    #[test]
    fn classify_uses_strict_positive_utility() {
        assert_eq!(classify(&decision(Verdict::Approve, 0.01)), Verdict::Approve);
        assert_eq!(classify(&decision(Verdict::Reject, 0.0)), Verdict::Reject);
        assert_eq!(classify(&decision(Verdict::Reject, -4.2)), Verdict::Reject);
    }

    #[test]
    fn cross_check_flags_sign_disagreement() {
        assert!(cross_check(&decision(Verdict::Approve, 3.0)).is_ok());
        assert!(cross_check(&decision(Verdict::Reject, -3.0)).is_ok());
        assert_eq!(
            cross_check(&decision(Verdict::Approve, -1.5)),
            Err(MalformedResponse::VerdictMismatch {
                verdict: Verdict::Approve,
                expected_utility: -1.5,
            })
        );
    }

    #[test]
    fn simulation_delta_rounds_half_up() {
        let sim = |rule: f64, ai: f64| SimulationResult {
            rule_based_profit: rule,
            ai_utility_profit: ai,
            improvement_pct: String::new(),
        };
        assert_eq!(simulation_delta(&sim(12_000.0, 28_500.0)), 16_500);
        assert_eq!(simulation_delta(&sim(0.0, 10.5)), 11);
        assert_eq!(simulation_delta(&sim(0.0, 10.49)), 10);
        assert_eq!(simulation_delta(&sim(2.5, 0.0)), -2);
        assert_eq!(simulation_delta(&sim(2.6, 0.0)), -3);
    }

    #[test]
    fn simulation_delta_rounds_cent_halves_up() {
        let sim = |rule: f64, ai: f64| SimulationResult {
            rule_based_profit: rule,
            ai_utility_profit: ai,
            improvement_pct: String::new(),
        };
        assert_eq!(simulation_delta(&sim(0.9, 1.4)), 1);
        assert_eq!(simulation_delta(&sim(16_384.06, 16_382.56)), -1);
        assert_eq!(simulation_delta(&sim(100.10, 100.60)), 1);
        assert_eq!(simulation_delta(&sim(0.0, -0.49)), 0);
    }

    #[test]
    fn legacy_baseline_uses_fico_cutoff() {
        let approved = profile();
        let declined = ApplicantProfile::new(75_000.0, 639, 35.0, 15_000.0, 2.5).expect("valid");
        assert_eq!(legacy_verdict(&approved), Verdict::Approve);
        assert_eq!(legacy_verdict(&declined), Verdict::Reject);

        let comparison = compare_with_baseline(&declined, &decision(Verdict::Approve, 4.0));
        assert_eq!(comparison.legacy_verdict, Verdict::Reject);
        assert!(!comparison.agrees);
    }

    #[test]
    fn normalize_defaults_missing_fields() {
        let decision = normalize_decision(&profile(), AnalyzeResponse::default());
        assert_eq!(decision.verdict, Verdict::Reject);
        assert_eq!(decision.expected_utility, 0.0);
        assert_eq!(decision.default_probability, 0.0);
        assert_eq!(decision.risk_aversion, 2.5);
        assert_eq!(decision.summary, "Negative Utility");
    }

    #[test]
    fn normalize_keeps_backend_verdict_on_disagreement() {
        let response = AnalyzeResponse {
            decision: Some("APPROVE".to_string()),
            utility_score: Some(-2.0),
            risk_percentage: Some(NumericField::Text("61.0".to_string())),
            summary: None,
        };
        let decision = normalize_decision(&profile(), response);
        assert_eq!(decision.verdict, Verdict::Approve);
        assert_eq!(decision.default_probability, 61.0);
        assert!(cross_check(&decision).is_err());
    }

    #[tokio::test]
    async fn decide_normalizes_backend_response() {
        let backend = Arc::new(ScriptedBackend::new(Ok(AnalyzeResponse {
            decision: Some("APPROVE".to_string()),
            utility_score: Some(12.4),
            risk_percentage: Some(NumericField::Number(18.2)),
            summary: Some("Utility: 12.4. Profit outweighs risk.".to_string()),
        })));
        let engine = UtilityEngine::new(backend.clone(), Duration::from_secs(1));

        let decision = engine.decide(&profile()).await.expect("analysis succeeds");

        assert_eq!(decision.verdict, Verdict::Approve);
        assert_eq!(decision.summary, "Utility: 12.4. Profit outweighs risk.");
        let requests = backend.requests.lock().expect("lock");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].fico, 710);
        assert_eq!(requests[0].risk_lambda, 2.5);
    }

    #[tokio::test]
    async fn decide_surfaces_backend_unavailable() {
        let backend = Arc::new(ScriptedBackend::new(Err(BackendError::Status {
            endpoint: ANALYZE_PATH,
            status: 500,
        })));
        let engine = UtilityEngine::new(backend, Duration::from_secs(1));

        match engine.decide(&profile()).await {
            Err(DecisionError::BackendUnavailable(BackendError::Status { status, .. })) => {
                assert_eq!(status, 500)
            }
            other => panic!("expected backend unavailable, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn decide_times_out_hung_requests() {
        let engine = UtilityEngine::new(Arc::new(HangingBackend), Duration::from_secs(10));

        match engine.decide(&profile()).await {
            Err(DecisionError::BackendUnavailable(BackendError::Timeout { timeout_ms, .. })) => {
                assert_eq!(timeout_ms, 10_000)
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
