use crate::analytics::AnalyticsError;
use crate::audit::{ChannelError, UnknownVerdictFilter};
use crate::backend::BackendError;
use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::underwriting::{DecisionError, ProfileError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Backend(BackendError),
    Decision(DecisionError),
    Profile(ProfileError),
    Analytics(AnalyticsError),
    Export(csv::Error),
    Channel(ChannelError),
    Filter(UnknownVerdictFilter),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Backend(err) => write!(f, "backend error: {}", err),
            AppError::Decision(err) => write!(f, "decision failed: {}", err),
            AppError::Profile(err) => write!(f, "invalid applicant profile: {}", err),
            AppError::Analytics(err) => write!(f, "analytics error: {}", err),
            AppError::Export(err) => write!(f, "export failed: {}", err),
            AppError::Channel(err) => write!(f, "audit channel error: {}", err),
            AppError::Filter(err) => write!(f, "invalid request: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Backend(err) => Some(err),
            AppError::Decision(err) => Some(err),
            AppError::Profile(err) => Some(err),
            AppError::Analytics(err) => Some(err),
            AppError::Export(err) => Some(err),
            AppError::Channel(err) => Some(err),
            AppError::Filter(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Filter(_) => StatusCode::BAD_REQUEST,
            AppError::Profile(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Analytics(AnalyticsError::SimulationInFlight) => StatusCode::CONFLICT,
            AppError::Backend(_) | AppError::Decision(_) | AppError::Analytics(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Export(_)
            | AppError::Channel(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<BackendError> for AppError {
    fn from(value: BackendError) -> Self {
        Self::Backend(value)
    }
}

impl From<DecisionError> for AppError {
    fn from(value: DecisionError) -> Self {
        Self::Decision(value)
    }
}

impl From<ProfileError> for AppError {
    fn from(value: ProfileError) -> Self {
        Self::Profile(value)
    }
}

impl From<AnalyticsError> for AppError {
    fn from(value: AnalyticsError) -> Self {
        Self::Analytics(value)
    }
}

impl From<csv::Error> for AppError {
    fn from(value: csv::Error) -> Self {
        Self::Export(value)
    }
}

impl From<ChannelError> for AppError {
    fn from(value: ChannelError) -> Self {
        Self::Channel(value)
    }
}

impl From<UnknownVerdictFilter> for AppError {
    fn from(value: UnknownVerdictFilter) -> Self {
        Self::Filter(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_failure_source() {
        let profile = AppError::from(ProfileError::FicoScore(900)).into_response();
        assert_eq!(profile.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let backend = AppError::from(DecisionError::BackendUnavailable(BackendError::Status {
            endpoint: "/analyze",
            status: 503,
        }))
        .into_response();
        assert_eq!(backend.status(), StatusCode::BAD_GATEWAY);

        let busy = AppError::from(AnalyticsError::SimulationInFlight).into_response();
        assert_eq!(busy.status(), StatusCode::CONFLICT);
    }
}
