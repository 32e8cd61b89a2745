//! JSON error responses for the web adapter.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::domain::error::TraderError;

#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl WebError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NotFound", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "Conflict", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "InternalError", message)
    }
}

pub fn status_from_error(err: &TraderError) -> StatusCode {
    match err {
        TraderError::ConfigParse { .. }
        | TraderError::ConfigMissing { .. }
        | TraderError::ConfigInvalid { .. }
        | TraderError::UnknownInstrument { .. } => StatusCode::BAD_REQUEST,
        TraderError::ArtifactMissing { .. } => StatusCode::NOT_FOUND,
        TraderError::DataUnavailable { .. } | TraderError::IndicatorComputation { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        TraderError::ArtifactCorrupt { .. }
        | TraderError::InvariantViolation { .. }
        | TraderError::Decision { .. }
        | TraderError::BrokerUnavailable { .. }
        | TraderError::Report { .. }
        | TraderError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<TraderError> for WebError {
    fn from(err: TraderError) -> Self {
        Self::new(status_from_error(&err), err.kind(), err.to_string())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.kind,
            "message": self.message,
            "status": self.status.as_u16(),
        });
        (self.status, Json(body)).into_response()
    }
}
