//! Run event infrastructure.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`EventStore`]: append-only per-run event log that sequences events
//!   and publishes them on the bus, so subscribers can combine stored
//!   history with live events without gaps.

pub mod bus;
pub mod store;

pub use bus::EventBus;
pub use store::{EventStore, RunEventSubscription};
