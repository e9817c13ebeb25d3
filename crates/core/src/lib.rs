//! Domain building blocks for the flowgate gateway.
//!
//! Pipeline definitions, config types and their evaluation, solid
//! selection, run records, log events and version compatibility. Nothing
//! here performs I/O; the engine and the gateway build on these types.

pub mod config_type;
pub mod definition;
pub mod environment;
pub mod error;
pub mod evaluation;
pub mod event;
pub mod log_filter;
pub mod run;
pub mod selection;
pub mod status;
pub mod types;
pub mod version;
