//! JSON envelope shared by every endpoint

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chansync_core::SyncError;
use serde::Serialize;
use tracing::error;

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> ApiResponse<T> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// HTTP status for a library error
pub fn error_status(err: &SyncError) -> StatusCode {
    match err {
        SyncError::ChannelNotFound(_) | SyncError::RunNotFound(_) => StatusCode::NOT_FOUND,
        SyncError::AlreadyRunning(_) => StatusCode::CONFLICT,
        SyncError::InvalidSchedule { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Status code plus envelope
pub struct ApiResult<T>(pub StatusCode, pub ApiResponse<T>);

impl<T> ApiResult<T> {
    pub fn ok(data: T) -> Self {
        Self(StatusCode::OK, ApiResponse::success(data))
    }

    pub fn accepted(data: T) -> Self {
        Self(StatusCode::ACCEPTED, ApiResponse::success(data))
    }
}

impl<T> From<SyncError> for ApiResult<T> {
    fn from(err: SyncError) -> Self {
        let status = error_status(&err);
        if status.is_server_error() {
            error!("Request failed: {}", err);
        }
        Self(status, ApiResponse::error(err.to_string()))
    }
}

impl<T: Serialize> IntoResponse for ApiResult<T> {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}
