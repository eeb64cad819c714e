//! API error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use session_manager::SessionError;
use storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("{0}")]
    BadRequest(String),
    #[error("metrics exporter not installed")]
    MetricsDisabled,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Session(SessionError::AlreadyActive(_)) => StatusCode::CONFLICT,
            ApiError::Session(SessionError::NoSuchSession(_)) => StatusCode::NOT_FOUND,
            ApiError::Session(SessionError::InvalidConfig(_)) => StatusCode::BAD_REQUEST,
            ApiError::Storage(StorageError::AlertNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Storage(StorageError::Lock(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MetricsDisabled => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
