use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Transport-level failure of an HTTP handler.
///
/// Domain failures never reach this type: they are answered with a `200`
/// carrying a typed result union. `AppError` covers requests the gateway
/// cannot interpret at all and internal faults.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The request body is not valid JSON for the operation.
    #[error(transparent)]
    Json(#[from] JsonRejection),

    /// The query string does not match the operation's parameters.
    #[error(transparent)]
    Query(#[from] QueryRejection),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Json(rejection) => (rejection.status(), "INVALID_BODY", rejection.body_text()),
            AppError::Query(rejection) => {
                (rejection.status(), "INVALID_QUERY", rejection.body_text())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
