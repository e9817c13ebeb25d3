//! Route definitions for the `/runs` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::runs;
use crate::state::AppState;
use crate::ws;

/// Routes mounted at `/runs`.
///
/// ```text
/// GET    /                -> list_runs
/// POST   /                -> launch_run
/// GET    /{id}            -> get_run
/// GET    /{id}/stats      -> get_run_stats
/// GET    /{id}/events     -> get_run_events
/// POST   /{id}/terminate  -> terminate_run
/// GET    /{id}/logs       -> run_logs (WebSocket)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(runs::list_runs).post(runs::launch_run))
        .route("/{id}", get(runs::get_run))
        .route("/{id}/stats", get(runs::get_run_stats))
        .route("/{id}/events", get(runs::get_run_events))
        .route("/{id}/terminate", post(runs::terminate_run))
        .route("/{id}/logs", get(ws::run_logs))
}
