//! HTTP error envelope for the kumi server.
//!
//! Every failure renders as `{ "ok": false, "errors": [...] }` with the
//! status from [`Error::status_code`]. Compile failures carry their
//! structured diagnostics; everything else carries client-safe messages.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kumi_core::Error;
use serde_json::json;

/// Core error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = match &self.0 {
            Error::CompileFailed(diagnostics) => json!({ "ok": false, "errors": diagnostics }),
            err => {
                if status.is_server_error() {
                    tracing::error!(error = %err, status = status.as_u16(), "request failed");
                }
                json!({ "ok": false, "errors": err.messages() })
            }
        };

        (status, Json(body)).into_response()
    }
}
