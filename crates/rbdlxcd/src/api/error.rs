//! Error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rbdlxc_common::RbdlxcError;
use serde::Serialize;

/// A library error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub RbdlxcError);

impl From<RbdlxcError> for ApiError {
    fn from(err: RbdlxcError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            RbdlxcError::ContainerNotFound { .. } | RbdlxcError::RemoteRejected { .. } => {
                StatusCode::NOT_FOUND
            }
            RbdlxcError::InvalidContainerName { .. }
            | RbdlxcError::InvalidDevice { .. }
            | RbdlxcError::MissingParameter { .. }
            | RbdlxcError::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
            RbdlxcError::Conflict { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message.
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, status = %status, "Request rejected");
        }

        let body = ErrorResponse {
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
