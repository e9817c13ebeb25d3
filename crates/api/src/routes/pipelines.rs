//! Route definitions for the `/pipelines` and `/snapshots` resources.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::pipelines;
use crate::state::AppState;

/// Routes mounted at `/pipelines`.
///
/// ```text
/// GET    /{name}                      -> get_pipeline
/// GET    /{name}/snapshot             -> get_pipeline_snapshot
/// POST   /{name}/validate             -> validate_run_config
/// GET    /{name}/config-types/{key}   -> get_config_type
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{name}", get(pipelines::get_pipeline))
        .route("/{name}/snapshot", get(pipelines::get_pipeline_snapshot))
        .route("/{name}/validate", post(pipelines::validate_run_config))
        .route("/{name}/config-types/{key}", get(pipelines::get_config_type))
}

/// Routes mounted at `/snapshots`.
pub fn snapshots_router() -> Router<AppState> {
    Router::new().route("/{id}", get(pipelines::get_snapshot))
}
