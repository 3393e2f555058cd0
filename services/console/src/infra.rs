use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use vantage_risk::analytics::AnalyticsDesk;
use vantage_risk::audit::{AuditSyncChannel, EventBus, Subscription};
use vantage_risk::backend::{DecisionBackend, LedgerBackend, SimulationBackend};
use vantage_risk::config::MonitorConfig;
use vantage_risk::error::AppError;
use vantage_risk::health::{HealthMonitor, MonitorHandle};
use vantage_risk::underwriting::{ApplicantProfile, Decision, DecisionError, UtilityEngine};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Everything the console needs from the remote backend.
pub(crate) trait UnderwritingBackend:
    DecisionBackend + LedgerBackend + SimulationBackend + 'static
{
}

impl<T> UnderwritingBackend for T where
    T: DecisionBackend + LedgerBackend + SimulationBackend + 'static
{
}

/// One operator session: the three subsystems wired to a shared backend and event bus.
pub(crate) struct Console<B> {
    pub(crate) engine: UtilityEngine<B>,
    pub(crate) bus: EventBus,
    pub(crate) ledger: Arc<AuditSyncChannel<B>>,
    pub(crate) analytics: AnalyticsDesk<B>,
    pub(crate) monitor: MonitorHandle,
    _ledger_feed: Subscription,
}

impl<B> Console<B>
where
    B: UnderwritingBackend,
{
    /// Wire the subsystems and start the health ticker. Must run inside a tokio runtime.
    pub(crate) fn start(
        backend: Arc<B>,
        request_timeout: Duration,
        monitor: &MonitorConfig,
    ) -> Result<Arc<Self>, AppError> {
        let bus = EventBus::new();
        let ledger = Arc::new(AuditSyncChannel::new(Arc::clone(&backend), request_timeout));
        let ledger_feed = ledger.connect(&bus)?;
        let monitor_handle = HealthMonitor::from_config(monitor).spawn(monitor.tick_interval);

        info!(
            timeout_ms = request_timeout.as_millis() as u64,
            history = monitor.history_capacity,
            "underwriting console assembled"
        );

        Ok(Arc::new(Self {
            engine: UtilityEngine::new(Arc::clone(&backend), request_timeout),
            bus,
            ledger,
            analytics: AnalyticsDesk::new(backend, request_timeout),
            monitor: monitor_handle,
            _ledger_feed: ledger_feed,
        }))
    }

    /// Analyze `profile` and, on success, announce the decision so the ledger refreshes.
    pub(crate) async fn decide(&self, profile: &ApplicantProfile) -> Result<Decision, DecisionError> {
        let decision = self.engine.decide(profile).await?;
        self.bus.decision_completed(decision.clone());
        Ok(decision)
    }
}
