//! Call Screening Server
//!
//! HTTP surface around the call orchestrator: one session per phone call,
//! caller segments submitted one at a time, summaries returned at hangup.

pub mod http;
pub mod state;

pub use http::create_router;
pub use state::{AppState, CallEntry, ResponseSink};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use call_screen_agent::CallError;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Call not found: {0}")]
    NotFound(String),

    #[error("Call has already ended")]
    CallEnded,

    #[error("Too many active calls (limit {0})")]
    Capacity(usize),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServerError> for StatusCode {
    fn from(err: ServerError) -> Self {
        (&err).into()
    }
}

impl From<&ServerError> for StatusCode {
    fn from(err: &ServerError) -> Self {
        match err {
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::CallEnded => StatusCode::CONFLICT,
            ServerError::Capacity(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CallError> for ServerError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::CallEnded => ServerError::CallEnded,
            CallError::InvalidProfile(msg) => ServerError::InvalidRequest(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = StatusCode::from(&self);
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            StatusCode::from(ServerError::NotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(StatusCode::from(ServerError::CallEnded), StatusCode::CONFLICT);
        assert_eq!(
            StatusCode::from(ServerError::Capacity(1)),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_call_error_conversion() {
        assert!(matches!(
            ServerError::from(CallError::CallEnded),
            ServerError::CallEnded
        ));
        assert!(matches!(
            ServerError::from(CallError::InvalidProfile("name".into())),
            ServerError::InvalidRequest(_)
        ));
    }
}
