//! Ports for the remote decisioning backend and their HTTP adapter.

mod error;
mod http;
pub mod wire;

use async_trait::async_trait;

pub use error::{BackendError, MalformedResponse};
pub use http::HttpBackend;
pub use wire::{
    AnalyzeRequest, AnalyzeResponse, LedgerPage, ModelMetricsPayload, NumericField,
    RawLedgerEntry, SimulationPayload,
};

/// Model inference: probability of default and expected utility for one applicant.
#[async_trait]
pub trait DecisionBackend: Send + Sync {
    async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse, BackendError>;
}

/// Read access to the append-only decision ledger.
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    async fn fetch_ledger(&self) -> Result<LedgerPage, BackendError>;
    /// Substring search over FICO score and timestamp.
    async fn search_ledger(&self, query: &str) -> Result<Vec<RawLedgerEntry>, BackendError>;
}

/// Monte Carlo backtest against the legacy rules, plus the offline model scorecard.
#[async_trait]
pub trait SimulationBackend: Send + Sync {
    async fn run_simulation(&self) -> Result<SimulationPayload, BackendError>;
    async fn model_metrics(&self) -> Result<ModelMetricsPayload, BackendError>;
}
