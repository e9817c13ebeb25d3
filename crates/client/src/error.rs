//! Classified client failures.
//!
//! Domain failures arrive as typed union members and are mapped onto a
//! [`ClientError`] variant by the operation that received them. Transport
//! faults and timeouts originate on the client side.

use std::time::Duration;

use flowgate_core::status::RunStatus;
use flowgate_core::types::RunId;
use flowgate_core::version::VersionError;
use flowgate_schema::InvalidOutputError;

flowgate_core::define_wire_enum! {
    /// Machine-readable category of a [`ClientError`].
    ClientErrorKind {
        InvalidInput = "INVALID_INPUT",
        InvalidOutput = "INVALID_OUTPUT",
        NotFound = "NOT_FOUND",
        Transport = "TRANSPORT",
        Timeout = "TIMEOUT",
        VersionMismatch = "VERSION_MISMATCH",
        UnexpectedResponse = "UNEXPECTED_RESPONSE",
        Config = "CONFIG",
    }
}

/// A consumer step requested an output whose declared type does not match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidOutputErrorInfo {
    pub step_key: String,
    pub output_name: String,
    pub expected_type: String,
    /// `None` when the producer does not declare the output at all.
    pub actual_type: Option<String>,
}

impl From<InvalidOutputError> for InvalidOutputErrorInfo {
    fn from(e: InvalidOutputError) -> Self {
        Self {
            step_key: e.step_key,
            output_name: e.output_name,
            expected_type: e.expected_type,
            actual_type: e.actual_type,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request was rejected: unknown pipeline, location, mode or
    /// preset, invalid selection or run config, or a malformed request.
    #[error("{typename}: {message}")]
    InvalidInput {
        typename: &'static str,
        message: String,
    },

    #[error(
        "Step '{}' cannot consume output '{}': expected {}, found {}",
        .0.step_key,
        .0.output_name,
        .0.expected_type,
        .0.actual_type.as_deref().unwrap_or("nothing")
    )]
    InvalidOutput(InvalidOutputErrorInfo),

    #[error("{typename}: {message}")]
    NotFound {
        typename: &'static str,
        message: String,
    },

    /// The gateway could not be reached or answered with a transport-level
    /// failure.
    #[error("Transport error: {message}")]
    Transport { message: String, status: Option<u16> },

    /// The run did not finish in time. The run itself is unaffected.
    /// `last_status` is `None` when no poll got an answer before the deadline.
    #[error(
        "Run {run_id} did not finish within {waited:?} (last status: {})",
        .last_status.map_or("unknown", |status| status.as_str())
    )]
    Timeout {
        run_id: RunId,
        last_status: Option<RunStatus>,
        waited: Duration,
    },

    #[error(transparent)]
    VersionMismatch(#[from] VersionError),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl ClientError {
    pub fn kind(&self) -> ClientErrorKind {
        match self {
            Self::InvalidInput { .. } => ClientErrorKind::InvalidInput,
            Self::InvalidOutput(_) => ClientErrorKind::InvalidOutput,
            Self::NotFound { .. } => ClientErrorKind::NotFound,
            Self::Transport { .. } => ClientErrorKind::Transport,
            Self::Timeout { .. } => ClientErrorKind::Timeout,
            Self::VersionMismatch(_) => ClientErrorKind::VersionMismatch,
            Self::UnexpectedResponse(_) => ClientErrorKind::UnexpectedResponse,
            Self::Config(_) => ClientErrorKind::Config,
        }
    }

    /// Whether repeating the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { status: None, .. } => true,
            Self::Transport {
                status: Some(status),
                ..
            } => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }

    pub(crate) fn invalid_input(typename: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            typename,
            message: message.into(),
        }
    }

    pub(crate) fn not_found(typename: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound {
            typename,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return Self::UnexpectedResponse(e.to_string());
        }
        Self::Transport {
            message: e.to_string(),
            status: e.status().map(|s| s.as_u16()),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport {
            message: e.to_string(),
            status: None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(status: Option<u16>) -> ClientError {
        ClientError::Transport {
            message: "boom".into(),
            status,
        }
    }

    #[test]
    fn only_transport_faults_are_transient() {
        assert!(transport(None).is_transient());
        assert!(transport(Some(503)).is_transient());
        assert!(transport(Some(429)).is_transient());
        assert!(transport(Some(408)).is_transient());
        assert!(!transport(Some(404)).is_transient());
        assert!(!ClientError::invalid_input("ModeNotFoundError", "no").is_transient());
        assert!(!ClientError::UnexpectedResponse("?".into()).is_transient());
    }

    #[test]
    fn invalid_output_message_names_types() {
        let err = ClientError::InvalidOutput(InvalidOutputErrorInfo {
            step_key: "load".into(),
            output_name: "table".into(),
            expected_type: "Rows".into(),
            actual_type: Some("Table".into()),
        });
        assert_eq!(err.kind(), ClientErrorKind::InvalidOutput);
        assert_eq!(
            err.to_string(),
            "Step 'load' cannot consume output 'table': expected Rows, found Table"
        );
    }

    #[test]
    fn timeout_message_names_last_status() {
        let run_id = RunId::new_v4();
        let waited = Duration::from_millis(100);

        let seen = ClientError::Timeout {
            run_id,
            last_status: Some(RunStatus::Started),
            waited,
        };
        assert!(seen.to_string().contains("last status: STARTED"));

        let unseen = ClientError::Timeout {
            run_id,
            last_status: None,
            waited,
        };
        assert_eq!(unseen.kind(), ClientErrorKind::Timeout);
        assert!(unseen.to_string().contains("last status: unknown"));
        assert!(!unseen.is_transient());
    }

    #[test]
    fn kinds_have_wire_names() {
        assert_eq!(ClientErrorKind::Timeout.to_string(), "TIMEOUT");
        assert_eq!("not_found".parse::<ClientErrorKind>(), Ok(ClientErrorKind::NotFound));
    }
}
