//! Typed client for the flowgate gateway.
//!
//! [`GatewayClient::connect`] verifies the gateway speaks a compatible
//! version before any other call. Every domain failure the gateway returns
//! as a union member surfaces as a classified [`ClientError`].

pub mod backoff;
pub mod client;
pub mod config;
pub mod error;
pub mod subscription;

pub use backoff::PollConfig;
pub use client::{GatewayClient, JobSubmission, ReloadRepositoryLocationInfo, ServerInfo, TerminateOutcome};
pub use config::ClientConfig;
pub use error::{ClientError, ClientErrorKind, ClientResult, InvalidOutputErrorInfo};
pub use flowgate_schema::ReloadRepositoryLocationStatus;
pub use subscription::RunLogStream;
