//! WebSocket infrastructure for run log subscriptions.
//!
//! Provides connection management, heartbeat monitoring, and the HTTP
//! upgrade handler used by the runs routes.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::run_logs;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
