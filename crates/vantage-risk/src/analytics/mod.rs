//! Model scorecard and the rule-based versus utility backtest panel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::backend::wire::{METRICS_PATH, SIMULATION_PATH};
use crate::backend::{BackendError, ModelMetricsPayload, SimulationBackend, SimulationPayload};
use crate::underwriting::{simulation_delta, SimulationResult};

/// Offline evaluation figures of the deployed model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelScorecard {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

impl Default for ModelScorecard {
    fn default() -> Self {
        Self {
            accuracy: 96.22,
            precision: 93.82,
            recall: 93.44,
            f1_score: 0.94,
        }
    }
}

impl ModelScorecard {
    /// Overlay whatever the backend reported onto `self`.
    pub fn merged(&self, payload: &ModelMetricsPayload) -> Self {
        Self {
            accuracy: payload.accuracy.unwrap_or(self.accuracy),
            precision: payload.precision.unwrap_or(self.precision),
            recall: payload.recall.unwrap_or(self.recall),
            f1_score: payload.f1_score.unwrap_or(self.f1_score),
        }
    }
}

/// What the backtest panel shows. `result` is replaced wholesale by each successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationPanel {
    pub result: SimulationResult,
    pub profit_delta: i64,
    pub is_simulating: bool,
    pub last_error: Option<String>,
}

impl Default for SimulationPanel {
    fn default() -> Self {
        let result = SimulationResult {
            rule_based_profit: 12_000.0,
            ai_utility_profit: 28_500.0,
            improvement_pct: "133%".to_string(),
        };
        Self {
            profit_delta: simulation_delta(&result),
            result,
            is_simulating: false,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalyticsError {
    #[error("backend unavailable: {0}")]
    BackendUnavailable(#[from] BackendError),
    #[error("a simulation is already running")]
    SimulationInFlight,
}

/// Validate a backtest payload. Missing profits or an inline `error` reject the whole run.
pub fn simulation_result(payload: SimulationPayload) -> Result<SimulationResult, BackendError> {
    if let Some(message) = payload.error {
        return Err(BackendError::Malformed {
            endpoint: SIMULATION_PATH,
            message,
        });
    }

    let (Some(rule_based_profit), Some(ai_utility_profit)) =
        (payload.rule_based_profit, payload.ai_utility_profit)
    else {
        return Err(BackendError::Malformed {
            endpoint: SIMULATION_PATH,
            message: "profit figures missing".to_string(),
        });
    };

    let improvement_pct = payload
        .improvement
        .unwrap_or_else(|| improvement_label(rule_based_profit, ai_utility_profit));

    Ok(SimulationResult {
        rule_based_profit,
        ai_utility_profit,
        improvement_pct,
    })
}

/// Relative gain over the rule-based book, e.g. `137.5%`; `0.0%` when the baseline is zero.
pub fn improvement_label(rule_based_profit: f64, ai_utility_profit: f64) -> String {
    let improvement = if rule_based_profit == 0.0 {
        0.0
    } else {
        (ai_utility_profit - rule_based_profit) / rule_based_profit.abs() * 100.0
    };
    format!("{:.1}%", improvement)
}

#[derive(Default)]
struct DeskState {
    scorecard: ModelScorecard,
    panel: SimulationPanel,
}

/// Holds the analytics panels and serializes simulation runs.
pub struct AnalyticsDesk<S> {
    backend: Arc<S>,
    timeout: Duration,
    state: Mutex<DeskState>,
}

impl<S> AnalyticsDesk<S>
where
    S: SimulationBackend,
{
    pub fn new(backend: Arc<S>, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            state: Mutex::new(DeskState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DeskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn scorecard(&self) -> ModelScorecard {
        self.lock().scorecard
    }

    pub fn panel(&self) -> SimulationPanel {
        self.lock().panel.clone()
    }

    /// Fetch the scorecard; on failure the last known figures stay in place.
    pub async fn refresh_scorecard(&self) -> ModelScorecard {
        let fetched = tokio::time::timeout(self.timeout, self.backend.model_metrics()).await;
        let outcome = match fetched {
            Ok(outcome) => outcome,
            Err(_) => Err(BackendError::Timeout {
                endpoint: METRICS_PATH,
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        };

        let mut state = self.lock();
        match outcome {
            Ok(payload) => state.scorecard = state.scorecard.merged(&payload),
            Err(err) => warn!(error = %err, "model metrics unavailable; keeping last known scorecard"),
        }
        state.scorecard
    }

    /// Run one backtest. Only one run may be in flight; a failed run keeps the previous result.
    pub async fn run_simulation(&self) -> Result<SimulationResult, AnalyticsError> {
        let _running = InFlight::claim(self)?;

        let fetched = tokio::time::timeout(self.timeout, self.backend.run_simulation()).await;
        let outcome = match fetched {
            Ok(outcome) => outcome.and_then(simulation_result),
            Err(_) => Err(BackendError::Timeout {
                endpoint: SIMULATION_PATH,
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        };

        let mut state = self.lock();
        match outcome {
            Ok(result) => {
                info!(
                    rule_based_profit = result.rule_based_profit,
                    ai_utility_profit = result.ai_utility_profit,
                    improvement = %result.improvement_pct,
                    "simulation completed"
                );
                state.panel.profit_delta = simulation_delta(&result);
                state.panel.result = result.clone();
                state.panel.last_error = None;
                Ok(result)
            }
            Err(err) => {
                warn!(error = %err, "simulation failed; previous result retained");
                state.panel.last_error = Some(err.to_string());
                Err(AnalyticsError::BackendUnavailable(err))
            }
        }
    }
}

/// Holds `is_simulating` for the lifetime of a run; dropping it clears the flag.
struct InFlight<'a> {
    state: &'a Mutex<DeskState>,
}

impl<'a> InFlight<'a> {
    fn claim<S>(desk: &'a AnalyticsDesk<S>) -> Result<Self, AnalyticsError>
    where
        S: SimulationBackend,
    {
        let mut state = desk.lock();
        if state.panel.is_simulating {
            return Err(AnalyticsError::SimulationInFlight);
        }
        state.panel.is_simulating = true;
        Ok(Self { state: &desk.state })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .panel
            .is_simulating = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct ScriptedSimulation {
        simulation: Mutex<Vec<Result<SimulationPayload, BackendError>>>,
        metrics: Mutex<Vec<Result<ModelMetricsPayload, BackendError>>>,
        hold: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl SimulationBackend for ScriptedSimulation {
        async fn run_simulation(&self) -> Result<SimulationPayload, BackendError> {
            if let Some(hold) = &self.hold {
                hold.notified().await;
            }
            self.simulation.lock().expect("lock").remove(0)
        }

        async fn model_metrics(&self) -> Result<ModelMetricsPayload, BackendError> {
            self.metrics.lock().expect("lock").remove(0)
        }
    }

    fn payload(rule: f64, ai: f64, improvement: Option<&str>) -> SimulationPayload {
        SimulationPayload {
            rule_based_profit: Some(rule),
            ai_utility_profit: Some(ai),
            improvement: improvement.map(str::to_string),
            error: None,
        }
    }

    fn desk(backend: ScriptedSimulation) -> AnalyticsDesk<ScriptedSimulation> {
        AnalyticsDesk::new(Arc::new(backend), Duration::from_secs(10))
    }

    #[test]
    fn defaults_match_the_published_backtest() {
        let panel = SimulationPanel::default();
        assert_eq!(panel.result.improvement_pct, "133%");
        assert_eq!(panel.profit_delta, 16_500);
        assert!(!panel.is_simulating);
        assert_eq!(ModelScorecard::default().accuracy, 96.22);
    }

    #[test]
    fn inline_error_is_a_failed_run() {
        let outcome = simulation_result(SimulationPayload {
            error: Some("no such table: audit_logs".to_string()),
            ..SimulationPayload::default()
        });
        assert!(matches!(outcome, Err(BackendError::Malformed { .. })));
    }

    #[test]
    fn missing_improvement_is_derived_from_profits() {
        let result = simulation_result(payload(-4_000.0, 1_500.0, None)).expect("valid payload");
        assert_eq!(result.improvement_pct, "137.5%");
        assert_eq!(improvement_label(0.0, 500.0), "0.0%");
    }

    #[tokio::test]
    async fn successful_run_replaces_the_result() {
        let backend = ScriptedSimulation {
            simulation: Mutex::new(vec![Ok(payload(10_000.0, 25_000.0, Some("150.0%")))]),
            ..ScriptedSimulation::default()
        };
        let desk = desk(backend);

        let result = desk.run_simulation().await.expect("simulation succeeds");

        assert_eq!(result.ai_utility_profit, 25_000.0);
        let panel = desk.panel();
        assert_eq!(panel.result, result);
        assert_eq!(panel.profit_delta, 15_000);
        assert!(!panel.is_simulating);
    }

    #[tokio::test]
    async fn failed_run_keeps_previous_result_and_clears_flag() {
        let backend = ScriptedSimulation {
            simulation: Mutex::new(vec![Err(BackendError::Status {
                endpoint: SIMULATION_PATH,
                status: 500,
            })]),
            ..ScriptedSimulation::default()
        };
        let desk = desk(backend);

        let outcome = desk.run_simulation().await;

        assert!(matches!(outcome, Err(AnalyticsError::BackendUnavailable(_))));
        let panel = desk.panel();
        assert_eq!(panel.result, SimulationPanel::default().result);
        assert!(!panel.is_simulating);
        assert!(panel.last_error.is_some());
    }

    #[tokio::test]
    async fn concurrent_run_is_refused() {
        let hold = Arc::new(Notify::new());
        let backend = ScriptedSimulation {
            simulation: Mutex::new(vec![Ok(payload(1.0, 2.0, None))]),
            hold: Some(Arc::clone(&hold)),
            ..ScriptedSimulation::default()
        };
        let desk = desk(backend);

        let first = desk.run_simulation();
        let second = async {
            assert!(desk.panel().is_simulating);
            let refused = desk.run_simulation().await;
            hold.notify_one();
            refused
        };
        let (first, second) = tokio::join!(first, second);

        assert!(first.is_ok());
        assert_eq!(second, Err(AnalyticsError::SimulationInFlight));
        assert!(!desk.panel().is_simulating);
    }

    #[tokio::test]
    async fn scorecard_falls_back_to_last_known_values() {
        let backend = ScriptedSimulation {
            metrics: Mutex::new(vec![
                Ok(ModelMetricsPayload {
                    accuracy: Some(97.0),
                    ..ModelMetricsPayload::default()
                }),
                Err(BackendError::Transport {
                    endpoint: METRICS_PATH,
                    message: "connection reset".to_string(),
                }),
            ]),
            ..ScriptedSimulation::default()
        };
        let desk = desk(backend);

        let first = desk.refresh_scorecard().await;
        let second = desk.refresh_scorecard().await;

        assert_eq!(first.accuracy, 97.0);
        assert_eq!(first.recall, 93.44);
        assert_eq!(second, first);
    }
}
