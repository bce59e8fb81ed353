//! Error envelopes of the two protocols.

use crate::error::{AdminError, ErrorKind};
use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

fn log_internal(err: &AdminError) {
    if err.kind() == ErrorKind::Internal {
        tracing::error!(error = %err, "request failed");
    } else {
        tracing::debug!(error = %err, "request rejected");
    }
}

/// REST API failure: `{"success": false, "error": {"code", "message"}}`.
#[derive(Debug)]
pub struct ApiError(pub AdminError);

impl<E: Into<AdminError>> From<E> for ApiError {
    fn from(err: E) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        log_internal(&self.0);
        let kind = self.0.kind();
        let body = ErrorResponse {
            success: false,
            error: ErrorDetails {
                code: kind.callable_status(),
                message: self.0.user_message(),
            },
        };
        (kind.http_status(), Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
struct CallableErrorDetails {
    status: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct CallableErrorBody {
    error: CallableErrorDetails,
}

/// Callable protocol failure: `{"error": {"status", "message"}}`.
#[derive(Debug)]
pub struct CallableError(pub AdminError);

impl<E: Into<AdminError>> From<E> for CallableError {
    fn from(err: E) -> Self {
        CallableError(err.into())
    }
}

impl IntoResponse for CallableError {
    fn into_response(self) -> Response {
        log_internal(&self.0);
        let kind = self.0.kind();
        let body = CallableErrorBody {
            error: CallableErrorDetails {
                status: kind.callable_status(),
                message: self.0.user_message(),
            },
        };
        (kind.http_status(), Json(body)).into_response()
    }
}
