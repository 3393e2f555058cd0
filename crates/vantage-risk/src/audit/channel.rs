use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::bus::{EventBus, Subscription, UnderwritingEvent};
use super::entry::{normalize_entries, write_csv, LedgerEntry, LedgerSummary, VerdictFilter};
use crate::backend::wire::{LEDGER_PATH, SEARCH_PATH};
use crate::backend::{BackendError, LedgerBackend};

/// Connectivity of the ledger view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Idle,
    Fetching,
    Online,
    Offline,
}

/// What the view should show: the whole ledger or the ledger filtered by a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "query", rename_all = "snake_case")]
pub enum LedgerRequest {
    All,
    Filtered(String),
}

impl LedgerRequest {
    /// Blank text means "show everything"; anything else is sent trimmed.
    pub fn from_search_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            LedgerRequest::All
        } else {
            LedgerRequest::Filtered(trimmed.to_string())
        }
    }

    fn endpoint(&self) -> &'static str {
        match self {
            LedgerRequest::All => LEDGER_PATH,
            LedgerRequest::Filtered(_) => SEARCH_PATH,
        }
    }
}

/// Ledger and search failures, surfaced through the Offline state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("ledger unavailable: {0}")]
pub struct LedgerUnavailable(#[from] pub BackendError);

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("the audit channel must be connected from within a tokio runtime")]
    NoRuntime,
}

/// Everything a ledger view needs to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerView {
    pub status: SyncStatus,
    /// Newest-first, exactly as delivered by the backend.
    pub entries: Vec<LedgerEntry>,
    /// Present only while `entries` is the unfiltered ledger.
    pub summary: Option<LedgerSummary>,
    pub active_query: Option<String>,
    pub offline: bool,
    pub offline_reason: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl LedgerView {
    fn idle() -> Self {
        Self {
            status: SyncStatus::Idle,
            entries: Vec::new(),
            summary: None,
            active_query: None,
            offline: false,
            offline_reason: None,
            last_synced_at: None,
        }
    }

    pub fn filtered(&self, filter: VerdictFilter) -> Vec<&LedgerEntry> {
        self.entries
            .iter()
            .filter(|entry| filter.matches(entry))
            .collect()
    }

    pub fn can_retry(&self) -> bool {
        self.offline
    }
}

/// Monotonic token handed out per issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket(u64);

struct ChannelState {
    view: LedgerView,
    latest_issued: u64,
    last_request: LedgerRequest,
}

type FetchOutcome = Result<(Vec<LedgerEntry>, Option<LedgerSummary>), BackendError>;

/// Owner of the cached ledger snapshot. Triggers may overlap; only the most recently
/// issued request is allowed to change the snapshot.
pub struct AuditSyncChannel<L> {
    backend: Arc<L>,
    timeout: Duration,
    state: Mutex<ChannelState>,
    updates: watch::Sender<LedgerView>,
}

impl<L> AuditSyncChannel<L>
where
    L: LedgerBackend + 'static,
{
    pub fn new(backend: Arc<L>, timeout: Duration) -> Self {
        let view = LedgerView::idle();
        let (updates, _) = watch::channel(view.clone());
        Self {
            backend,
            timeout,
            state: Mutex::new(ChannelState {
                view,
                latest_issued: 0,
                last_request: LedgerRequest::All,
            }),
            updates,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn view(&self) -> LedgerView {
        self.lock().view.clone()
    }

    pub fn status(&self) -> SyncStatus {
        self.lock().view.status
    }

    /// Receiver that observes every state transition.
    pub fn watch(&self) -> watch::Receiver<LedgerView> {
        self.updates.subscribe()
    }

    /// First population of the view after construction.
    pub async fn initial_load(&self) -> SyncStatus {
        self.dispatch(LedgerRequest::All).await
    }

    /// A new decision invalidates any filter: always refetch the full ledger.
    pub async fn decision_completed(&self) -> SyncStatus {
        self.dispatch(LedgerRequest::All).await
    }

    pub async fn search_submitted(&self, text: &str) -> SyncStatus {
        self.dispatch(LedgerRequest::from_search_text(text)).await
    }

    /// Operator-initiated retry of whatever was requested last.
    pub async fn retry(&self) -> SyncStatus {
        let request = self.lock().last_request.clone();
        self.dispatch(request).await
    }

    pub async fn dispatch(&self, request: LedgerRequest) -> SyncStatus {
        let ticket = self.issue(&request);
        self.complete(ticket, request).await
    }

    /// Subscribe this channel to `bus`. The request token is taken inside the callback, so
    /// issue order follows publish order even though the fetch runs as a spawned task.
    pub fn connect(self: &Arc<Self>, bus: &EventBus) -> Result<Subscription, ChannelError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| ChannelError::NoRuntime)?;
        let channel = Arc::downgrade(self);

        Ok(bus.subscribe(move |event| {
            let Some(channel) = channel.upgrade() else {
                return;
            };
            let request = match event {
                UnderwritingEvent::DecisionCompleted(_) => LedgerRequest::All,
                UnderwritingEvent::SearchSubmitted(text) => LedgerRequest::from_search_text(text),
            };
            let ticket = channel.issue(&request);
            runtime.spawn(async move {
                channel.complete(ticket, request).await;
            });
        }))
    }

    /// Write the entries currently shown (after `filter`) as CSV.
    pub fn export_csv<W: io::Write>(
        &self,
        filter: VerdictFilter,
        writer: W,
    ) -> Result<usize, csv::Error> {
        let view = self.view();
        let rows = view.filtered(filter);
        write_csv(rows.iter().copied(), writer)?;
        Ok(rows.len())
    }

    fn issue(&self, request: &LedgerRequest) -> Ticket {
        let mut state = self.lock();
        state.latest_issued += 1;
        state.last_request = request.clone();
        state.view.status = SyncStatus::Fetching;
        self.updates.send_replace(state.view.clone());
        debug!(ticket = state.latest_issued, ?request, "ledger request issued");
        Ticket(state.latest_issued)
    }

    async fn complete(&self, ticket: Ticket, request: LedgerRequest) -> SyncStatus {
        let outcome = match tokio::time::timeout(self.timeout, self.fetch(&request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(BackendError::Timeout {
                endpoint: request.endpoint(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        };
        self.apply(ticket, request, outcome)
    }

    async fn fetch(&self, request: &LedgerRequest) -> FetchOutcome {
        match request {
            LedgerRequest::All => {
                let mut page = self.backend.fetch_ledger().await?;
                let entries = normalize_entries(page.logs.take().unwrap_or_default(), LEDGER_PATH);
                let summary = LedgerSummary::from_page(&page, &entries);
                Ok((entries, Some(summary)))
            }
            LedgerRequest::Filtered(query) => {
                let rows = self.backend.search_ledger(query).await?;
                Ok((normalize_entries(rows, SEARCH_PATH), None))
            }
        }
    }

    fn apply(&self, ticket: Ticket, request: LedgerRequest, outcome: FetchOutcome) -> SyncStatus {
        let mut state = self.lock();
        if ticket.0 != state.latest_issued {
            debug!(
                ticket = ticket.0,
                latest = state.latest_issued,
                "discarding superseded ledger response"
            );
            return state.view.status;
        }

        let active_query = match request {
            LedgerRequest::All => None,
            LedgerRequest::Filtered(query) => Some(query),
        };

        state.view = match outcome {
            Ok((entries, summary)) => {
                info!(
                    entries = entries.len(),
                    query = active_query.as_deref().unwrap_or(""),
                    "ledger view synchronized"
                );
                LedgerView {
                    status: SyncStatus::Online,
                    entries,
                    summary,
                    active_query,
                    offline: false,
                    offline_reason: None,
                    last_synced_at: Some(Utc::now()),
                }
            }
            Err(err) => {
                let reason = LedgerUnavailable(err);
                warn!(error = %reason, "ledger view offline");
                LedgerView {
                    status: SyncStatus::Offline,
                    entries: Vec::new(),
                    summary: None,
                    active_query,
                    offline: true,
                    offline_reason: Some(reason.to_string()),
                    last_synced_at: state.view.last_synced_at,
                }
            }
        };

        self.updates.send_replace(state.view.clone());
        state.view.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LedgerPage, RawLedgerEntry};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tokio::sync::oneshot;

    fn row(id: i64, fico: f64) -> RawLedgerEntry {
        RawLedgerEntry {
            id: Some(id),
            timestamp: Some(format!("2026-03-14 10:{:02}:00", id)),
            fico: Some(fico),
            utility: Some(5.0),
            decision: Some("APPROVE".to_string()),
            income: Some(60_000.0),
            dti: Some(20.0),
            loan_amnt: Some(10_000.0),
            risk_lambda: Some(2.0),
        }
    }

    enum Reply {
        Page(Vec<RawLedgerEntry>),
        Rows(Vec<RawLedgerEntry>),
        Fail,
        Gated(oneshot::Receiver<()>, Vec<RawLedgerEntry>),
        GatedFail(oneshot::Receiver<()>),
        Hang,
    }

    #[derive(Default)]
    struct ScriptedLedger {
        replies: Mutex<VecDeque<Reply>>,
        queries: Mutex<Vec<String>>,
    }

    impl ScriptedLedger {
        fn push(&self, reply: Reply) {
            self.replies.lock().expect("lock").push_back(reply);
        }

        fn next(&self) -> Reply {
            self.replies
                .lock()
                .expect("lock")
                .pop_front()
                .expect("scripted reply")
        }

        async fn resolve(&self, endpoint: &'static str) -> Result<Vec<RawLedgerEntry>, BackendError> {
            match self.next() {
                Reply::Page(rows) | Reply::Rows(rows) => Ok(rows),
                Reply::Fail => Err(BackendError::Transport {
                    endpoint,
                    message: "connection refused".to_string(),
                }),
                Reply::Gated(gate, rows) => {
                    let _ = gate.await;
                    Ok(rows)
                }
                Reply::GatedFail(gate) => {
                    let _ = gate.await;
                    Err(BackendError::Transport {
                        endpoint,
                        message: "connection reset".to_string(),
                    })
                }
                Reply::Hang => std::future::pending().await,
            }
        }
    }

    #[async_trait]
    impl LedgerBackend for ScriptedLedger {
        async fn fetch_ledger(&self) -> Result<LedgerPage, BackendError> {
            let rows = self.resolve(LEDGER_PATH).await?;
            Ok(LedgerPage {
                total: Some(rows.len() as u64),
                approval_rate: None,
                avg_utility: None,
                logs: Some(rows),
            })
        }

        async fn search_ledger(&self, query: &str) -> Result<Vec<RawLedgerEntry>, BackendError> {
            self.queries.lock().expect("lock").push(query.to_string());
            self.resolve(SEARCH_PATH).await
        }
    }

    fn channel(backend: &Arc<ScriptedLedger>) -> AuditSyncChannel<ScriptedLedger> {
        AuditSyncChannel::new(Arc::clone(backend), Duration::from_secs(10))
    }

    fn ids(view: &LedgerView) -> Vec<i64> {
        view.entries.iter().map(|entry| entry.id).collect()
    }

    #[tokio::test]
    async fn starts_idle_and_goes_online_after_initial_load() {
        let backend = Arc::new(ScriptedLedger::default());
        backend.push(Reply::Page(vec![row(2, 700.0), row(1, 650.0)]));
        let channel = channel(&backend);
        assert_eq!(channel.status(), SyncStatus::Idle);

        assert_eq!(channel.initial_load().await, SyncStatus::Online);

        let view = channel.view();
        assert_eq!(ids(&view), vec![2, 1]);
        assert_eq!(view.summary.as_ref().map(|s| s.total), Some(2));
        assert!(view.active_query.is_none());
        assert!(view.last_synced_at.is_some());
    }

    #[tokio::test]
    async fn failure_clears_the_snapshot() {
        let backend = Arc::new(ScriptedLedger::default());
        backend.push(Reply::Page(vec![row(1, 700.0)]));
        backend.push(Reply::Fail);
        let channel = channel(&backend);
        channel.initial_load().await;

        assert_eq!(channel.decision_completed().await, SyncStatus::Offline);

        let view = channel.view();
        assert!(view.entries.is_empty());
        assert!(view.summary.is_none());
        assert!(view.offline);
        assert!(view.can_retry());
        assert!(view
            .offline_reason
            .as_deref()
            .is_some_and(|reason| reason.contains("connection refused")));
    }

    #[tokio::test]
    async fn whitespace_search_fetches_everything_and_text_is_trimmed() {
        let backend = Arc::new(ScriptedLedger::default());
        backend.push(Reply::Page(vec![row(1, 700.0)]));
        backend.push(Reply::Rows(vec![row(1, 720.0)]));
        let channel = channel(&backend);

        channel.search_submitted("   ").await;
        assert!(channel.view().summary.is_some());

        channel.search_submitted(" 720 ").await;
        assert_eq!(*backend.queries.lock().expect("lock"), vec!["720".to_string()]);
        let view = channel.view();
        assert_eq!(view.active_query.as_deref(), Some("720"));
        assert!(view.summary.is_none());
    }

    #[tokio::test]
    async fn last_issued_request_wins_over_late_response() {
        let backend = Arc::new(ScriptedLedger::default());
        let (release, gate) = oneshot::channel();
        backend.push(Reply::Gated(gate, vec![row(3, 700.0), row(2, 720.0), row(1, 640.0)]));
        backend.push(Reply::Rows(vec![row(2, 720.0)]));
        let channel = channel(&backend);

        let stale = channel.decision_completed();
        let fresh = async {
            let status = channel.search_submitted("720").await;
            release.send(()).expect("stale request still waiting");
            status
        };
        let (stale_status, fresh_status) = tokio::join!(stale, fresh);

        assert_eq!(fresh_status, SyncStatus::Online);
        assert_eq!(stale_status, SyncStatus::Online);
        let view = channel.view();
        assert_eq!(ids(&view), vec![2]);
        assert_eq!(view.active_query.as_deref(), Some("720"));
    }

    #[tokio::test]
    async fn stale_failure_does_not_take_the_view_offline() {
        let backend = Arc::new(ScriptedLedger::default());
        let (release, gate) = oneshot::channel::<()>();
        backend.push(Reply::GatedFail(gate));
        backend.push(Reply::Page(vec![row(1, 700.0)]));
        let channel = channel(&backend);

        let stale = channel.search_submitted("650");
        let fresh = async {
            let status = channel.decision_completed().await;
            release.send(()).expect("stale request still waiting");
            status
        };
        let (_, fresh_status) = tokio::join!(stale, fresh);

        assert_eq!(fresh_status, SyncStatus::Online);
        let view = channel.view();
        assert_eq!(view.status, SyncStatus::Online);
        assert_eq!(ids(&view), vec![1]);
        assert!(view.offline_reason.is_none());
        assert!(view.active_query.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn hung_fetch_times_out_into_offline() {
        let backend = Arc::new(ScriptedLedger::default());
        backend.push(Reply::Hang);
        let channel = channel(&backend);

        assert_eq!(channel.initial_load().await, SyncStatus::Offline);
        assert!(channel
            .view()
            .offline_reason
            .as_deref()
            .is_some_and(|reason| reason.contains("timed out")));
    }

    #[tokio::test]
    async fn retry_repeats_the_last_request() {
        let backend = Arc::new(ScriptedLedger::default());
        backend.push(Reply::Fail);
        backend.push(Reply::Rows(vec![row(4, 720.0)]));
        let channel = channel(&backend);

        assert_eq!(channel.search_submitted("720").await, SyncStatus::Offline);
        assert_eq!(channel.view().active_query.as_deref(), Some("720"));
        assert_eq!(channel.retry().await, SyncStatus::Online);

        assert_eq!(backend.queries.lock().expect("lock").len(), 2);
        assert_eq!(ids(&channel.view()), vec![4]);
    }

    #[tokio::test]
    async fn watchers_observe_fetching_then_online() {
        let backend = Arc::new(ScriptedLedger::default());
        backend.push(Reply::Page(vec![row(1, 700.0)]));
        let channel = channel(&backend);
        let mut updates = channel.watch();

        channel.initial_load().await;

        assert!(updates.has_changed().expect("sender alive"));
        assert_eq!(updates.borrow_and_update().status, SyncStatus::Online);
    }

    #[tokio::test]
    async fn bus_events_drive_the_channel() {
        let backend = Arc::new(ScriptedLedger::default());
        backend.push(Reply::Rows(vec![row(2, 720.0)]));
        let channel = Arc::new(channel(&backend));
        let bus = EventBus::new();
        let _subscription = channel.connect(&bus).expect("runtime available");
        let mut updates = channel.watch();

        bus.search_submitted("720");
        assert_eq!(channel.status(), SyncStatus::Fetching);

        while updates.borrow_and_update().status != SyncStatus::Online {
            updates.changed().await.expect("sender alive");
        }
        assert_eq!(ids(&channel.view()), vec![2]);
    }

    #[test]
    fn connect_requires_a_runtime() {
        let backend = Arc::new(ScriptedLedger::default());
        let channel = Arc::new(channel(&backend));
        let bus = EventBus::new();
        assert!(matches!(channel.connect(&bus), Err(ChannelError::NoRuntime)));
    }

    #[tokio::test]
    async fn csv_export_respects_the_verdict_filter() {
        let backend = Arc::new(ScriptedLedger::default());
        let mut rejected = row(1, 600.0);
        rejected.decision = Some("REJECT".to_string());
        backend.push(Reply::Page(vec![row(2, 700.0), rejected]));
        let channel = channel(&backend);
        channel.initial_load().await;

        let mut buffer = Vec::new();
        let written = channel
            .export_csv(VerdictFilter::Reject, &mut buffer)
            .expect("export succeeds");

        assert_eq!(written, 1);
        let text = String::from_utf8(buffer).expect("utf8");
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("REJECT"));
    }
}
