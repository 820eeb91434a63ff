use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use framegrab_core::error::CoreError;
use framegrab_pipeline::error::CaptureError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] and [`CaptureError`] and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce the `{ success: false, error, code }`
/// envelope the capture UI expects.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `framegrab_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A capture failure from `framegrab_pipeline`.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut remaining_images = None;

        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::QuotaExceeded { remaining, .. } => {
                    remaining_images = Some(*remaining);
                    (
                        StatusCode::TOO_MANY_REQUESTS,
                        "QUOTA_EXCEEDED",
                        core.to_string(),
                    )
                }
                CoreError::Persistence(msg) | CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        INTERNAL_MESSAGE.to_string(),
                    )
                }
            },

            // --- Capture failures ---
            AppError::Capture(err) => match err {
                CaptureError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CaptureError::QuotaExceeded { remaining, .. } => {
                    remaining_images = Some(*remaining);
                    (StatusCode::TOO_MANY_REQUESTS, "QUOTA_EXCEEDED", err.to_string())
                }
                CaptureError::FetchFailed(_) => {
                    (StatusCode::BAD_GATEWAY, "FETCH_FAILED", err.to_string())
                }
                CaptureError::SampleFailed(_) => {
                    (StatusCode::BAD_GATEWAY, "SAMPLE_FAILED", err.to_string())
                }
                CaptureError::NoFrames => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "NO_FRAMES",
                    err.to_string(),
                ),
                CaptureError::Cancelled => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "CANCELLED",
                    err.to_string(),
                ),
                CaptureError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal capture error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        INTERNAL_MESSAGE.to_string(),
                    )
                }
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let mut body = json!({
            "success": false,
            "error": message,
            "code": code,
        });
        if let Some(remaining) = remaining_images {
            body["remainingImages"] = json!(remaining);
        }

        (status, axum::Json(body)).into_response()
    }
}
