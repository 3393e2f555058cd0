use crate::infra::{AppState, Console, UnderwritingBackend};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use vantage_risk::analytics::{ModelScorecard, SimulationPanel};
use vantage_risk::audit::{LedgerEntry, LedgerSummary, LedgerView, SyncStatus, VerdictFilter};
use vantage_risk::error::AppError;
use vantage_risk::health::HealthSnapshot;
use vantage_risk::underwriting::{
    compare_with_baseline, utility_frontier, ApplicantProfile, BaselineComparison, Decision,
    FrontierPoint, ProfileInput, RiskBand,
};

#[derive(Debug, Serialize)]
pub(crate) struct DecisionReport {
    pub(crate) decision: Decision,
    pub(crate) risk_band: RiskBand,
    pub(crate) baseline: BaselineComparison,
    pub(crate) frontier: Vec<FrontierPoint>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FrontierParams {
    pub(crate) risk_aversion: f64,
    pub(crate) expected_utility: f64,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LedgerParams {
    #[serde(default)]
    pub(crate) verdict: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LedgerResponse {
    pub(crate) status: SyncStatus,
    pub(crate) filter: VerdictFilter,
    pub(crate) entries: Vec<LedgerEntry>,
    pub(crate) summary: Option<LedgerSummary>,
    pub(crate) active_query: Option<String>,
    pub(crate) offline: bool,
    pub(crate) offline_reason: Option<String>,
    pub(crate) can_retry: bool,
    pub(crate) last_synced_at: Option<DateTime<Utc>>,
}

impl LedgerResponse {
    fn from_view(view: LedgerView, filter: VerdictFilter) -> Self {
        let can_retry = view.can_retry();
        let LedgerView {
            status,
            entries,
            summary,
            active_query,
            offline,
            offline_reason,
            last_synced_at,
        } = view;

        Self {
            status,
            filter,
            entries: entries
                .into_iter()
                .filter(|entry| filter.matches(entry))
                .collect(),
            summary,
            active_query,
            offline,
            offline_reason,
            can_retry,
            last_synced_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchRequest {
    #[serde(default)]
    pub(crate) query: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnalyticsView {
    pub(crate) scorecard: ModelScorecard,
    pub(crate) simulation: SimulationPanel,
}

/// Underwriting endpoints bound to one console session.
pub(crate) fn console_router<B>(console: Arc<Console<B>>) -> Router
where
    B: UnderwritingBackend,
{
    Router::new()
        .route("/api/v1/decisions", post(decision_handler::<B>))
        .route("/api/v1/frontier", get(frontier_handler))
        .route("/api/v1/ledger", get(ledger_handler::<B>))
        .route("/api/v1/ledger/search", post(search_handler::<B>))
        .route("/api/v1/ledger/retry", post(retry_handler::<B>))
        .route("/api/v1/system-health", get(system_health_handler::<B>))
        .route("/api/v1/analytics", get(analytics_handler::<B>))
        .route(
            "/api/v1/analytics/simulation",
            post(simulation_handler::<B>),
        )
        .with_state(console)
}

pub(crate) fn with_console_routes<B>(console: Arc<Console<B>>) -> Router
where
    B: UnderwritingBackend,
{
    console_router(console)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn decision_handler<B>(
    State(console): State<Arc<Console<B>>>,
    Json(input): Json<ProfileInput>,
) -> Result<Json<DecisionReport>, AppError>
where
    B: UnderwritingBackend,
{
    let profile = ApplicantProfile::try_from(input)?;
    let decision = console.decide(&profile).await?;

    Ok(Json(DecisionReport {
        risk_band: decision.risk_band(),
        baseline: compare_with_baseline(&profile, &decision),
        frontier: utility_frontier(decision.risk_aversion, decision.expected_utility),
        decision,
    }))
}

pub(crate) async fn frontier_handler(
    Query(params): Query<FrontierParams>,
) -> Json<Vec<FrontierPoint>> {
    Json(utility_frontier(params.risk_aversion, params.expected_utility))
}

pub(crate) async fn ledger_handler<B>(
    State(console): State<Arc<Console<B>>>,
    Query(params): Query<LedgerParams>,
) -> Result<Json<LedgerResponse>, AppError>
where
    B: UnderwritingBackend,
{
    let filter: VerdictFilter = params.verdict.as_deref().unwrap_or_default().parse()?;
    Ok(Json(LedgerResponse::from_view(console.ledger.view(), filter)))
}

pub(crate) async fn search_handler<B>(
    State(console): State<Arc<Console<B>>>,
    Json(request): Json<SearchRequest>,
) -> impl IntoResponse
where
    B: UnderwritingBackend,
{
    console.bus.search_submitted(request.query);
    let status = console.ledger.status();
    (StatusCode::ACCEPTED, Json(json!({ "status": status })))
}

pub(crate) async fn retry_handler<B>(
    State(console): State<Arc<Console<B>>>,
) -> Json<LedgerResponse>
where
    B: UnderwritingBackend,
{
    console.ledger.retry().await;
    Json(LedgerResponse::from_view(
        console.ledger.view(),
        VerdictFilter::All,
    ))
}

pub(crate) async fn system_health_handler<B>(
    State(console): State<Arc<Console<B>>>,
) -> Json<HealthSnapshot>
where
    B: UnderwritingBackend,
{
    Json(console.monitor.snapshot())
}

pub(crate) async fn analytics_handler<B>(State(console): State<Arc<Console<B>>>) -> Json<AnalyticsView>
where
    B: UnderwritingBackend,
{
    let scorecard = console.analytics.refresh_scorecard().await;
    Json(AnalyticsView {
        scorecard,
        simulation: console.analytics.panel(),
    })
}

pub(crate) async fn simulation_handler<B>(
    State(console): State<Arc<Console<B>>>,
) -> Result<Json<SimulationPanel>, AppError>
where
    B: UnderwritingBackend,
{
    console.analytics.run_simulation().await?;
    Ok(Json(console.analytics.panel()))
}
