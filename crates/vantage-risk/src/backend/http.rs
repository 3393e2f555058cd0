use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::BackendError;
use super::wire::{
    AnalyzeRequest, AnalyzeResponse, LedgerPage, ModelMetricsPayload, RawLedgerEntry,
    SimulationPayload, ANALYZE_PATH, LEDGER_PATH, METRICS_PATH, SEARCH_PATH, SIMULATION_PATH,
};
use super::{DecisionBackend, LedgerBackend, SimulationBackend};
use crate::config::BackendConfig;

/// reqwest-backed adapter for every backend port.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| BackendError::Transport {
                endpoint: "client",
                message: err.to_string(),
            })?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            timeout: config.request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn transport_error(&self, endpoint: &'static str, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout {
                endpoint,
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            BackendError::Transport {
                endpoint,
                message: err.to_string(),
            }
        }
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        response: reqwest::Response,
    ) -> Result<T, BackendError> {
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| self.transport_error(endpoint, err))?;
        serde_json::from_slice(&body).map_err(|err| BackendError::Malformed {
            endpoint,
            message: err.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        query: &[(&str, &str)],
    ) -> Result<T, BackendError> {
        debug!(endpoint, "backend request");
        let response = self
            .client
            .get(self.url(endpoint))
            .query(query)
            .send()
            .await
            .map_err(|err| self.transport_error(endpoint, err))?;
        self.read_json(endpoint, response).await
    }
}

#[async_trait]
impl DecisionBackend for HttpBackend {
    async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse, BackendError> {
        debug!(endpoint = ANALYZE_PATH, "backend request");
        let response = self
            .client
            .post(self.url(ANALYZE_PATH))
            .json(request)
            .send()
            .await
            .map_err(|err| self.transport_error(ANALYZE_PATH, err))?;
        self.read_json(ANALYZE_PATH, response).await
    }
}

#[async_trait]
impl LedgerBackend for HttpBackend {
    async fn fetch_ledger(&self) -> Result<LedgerPage, BackendError> {
        self.get_json(LEDGER_PATH, &[]).await
    }

    async fn search_ledger(&self, query: &str) -> Result<Vec<RawLedgerEntry>, BackendError> {
        self.get_json(SEARCH_PATH, &[("query", query)]).await
    }
}

#[async_trait]
impl SimulationBackend for HttpBackend {
    async fn run_simulation(&self) -> Result<SimulationPayload, BackendError> {
        self.get_json(SIMULATION_PATH, &[]).await
    }

    async fn model_metrics(&self) -> Result<ModelMetricsPayload, BackendError> {
        self.get_json(METRICS_PATH, &[]).await
    }
}
