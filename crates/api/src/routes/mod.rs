pub mod assets;
pub mod health;
pub mod locations;
pub mod pipelines;
pub mod runs;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /schema                                 exposed types and operations
///
/// /locations                              workspace
/// /locations/{name}/reload                reload a location (POST)
///
/// /pipelines/{name}                       pipeline
/// /pipelines/{name}/snapshot              snapshot of the current definition
/// /pipelines/{name}/validate              validate run config (POST)
/// /pipelines/{name}/config-types/{key}    one config type
/// /snapshots/{id}                         stored snapshot
///
/// /runs                                   list, launch (POST)
/// /runs/{id}                              run
/// /runs/{id}/stats                        run statistics
/// /runs/{id}/events                       filtered event log
/// /runs/{id}/terminate                    terminate (POST)
/// /runs/{id}/logs                         log subscription (WebSocket)
///
/// /assets/{*key}                          asset materializations
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/schema", get(handlers::schema::get_schema))
        .nest("/locations", locations::router())
        .nest("/pipelines", pipelines::router())
        .nest("/snapshots", pipelines::snapshots_router())
        .nest("/runs", runs::router())
        .nest("/assets", assets::router())
}
