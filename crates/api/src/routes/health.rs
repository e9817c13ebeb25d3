use axum::{routing::get, Json, Router};
use flowgate_core::version::PACKAGE_VERSION;
use flowgate_schema::SCHEMA_VERSION;
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Package version, checked by clients before their first call.
    pub version: &'static str,
    /// Version of the exposed contract.
    pub schema_version: &'static str,
}

/// GET /health -- returns service status and versions.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: PACKAGE_VERSION,
        schema_version: SCHEMA_VERSION,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
