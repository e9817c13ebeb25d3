use axum::routing::get;
use axum::Router;

use crate::handlers::assets;
use crate::state::AppState;

/// Routes mounted at `/assets`.
pub fn router() -> Router<AppState> {
    Router::new().route("/{*key}", get(assets::get_asset))
}
