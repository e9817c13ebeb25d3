use std::sync::Arc;

use flowgate_engine::Instance;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// The orchestration engine the gateway fronts.
    pub instance: Arc<Instance>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Open log subscriptions.
    pub ws_manager: Arc<WsManager>,
}
