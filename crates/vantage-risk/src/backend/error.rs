use crate::underwriting::Verdict;

/// Failure talking to the decisioning backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("request to {endpoint} failed: {message}")]
    Transport {
        endpoint: &'static str,
        message: String,
    },
    #[error("request to {endpoint} timed out after {timeout_ms} ms")]
    Timeout {
        endpoint: &'static str,
        timeout_ms: u64,
    },
    #[error("{endpoint} responded with HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },
    #[error("{endpoint} returned a malformed payload: {message}")]
    Malformed {
        endpoint: &'static str,
        message: String,
    },
}

impl BackendError {
    pub fn endpoint(&self) -> &'static str {
        match self {
            BackendError::Transport { endpoint, .. }
            | BackendError::Timeout { endpoint, .. }
            | BackendError::Status { endpoint, .. }
            | BackendError::Malformed { endpoint, .. } => endpoint,
        }
    }
}

/// Payload defect that is tolerated by defaulting, dropping a single record, or logging.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MalformedResponse {
    #[error("{endpoint} omitted `{field}`; substituting a default")]
    MissingField {
        endpoint: &'static str,
        field: &'static str,
    },
    #[error("{endpoint} sent unrecognized verdict '{value}'")]
    UnknownVerdict { endpoint: &'static str, value: String },
    #[error("backend verdict {verdict} disagrees with expected utility {expected_utility}")]
    VerdictMismatch {
        verdict: Verdict,
        expected_utility: f64,
    },
    #[error("{endpoint} sent a ledger entry without an id; entry dropped")]
    MissingEntryId { endpoint: &'static str },
}
