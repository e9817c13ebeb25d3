//! Route definitions for the `/locations` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::locations;
use crate::state::AppState;

/// Routes mounted at `/locations`.
///
/// ```text
/// GET    /                -> list_locations
/// POST   /{name}/reload   -> reload_location
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(locations::list_locations))
        .route("/{name}/reload", post(locations::reload_location))
}
