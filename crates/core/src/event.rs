//! Structured events emitted while a run executes.

use serde::{Deserialize, Serialize};

use crate::define_wire_enum;
use crate::types::{RunId, Timestamp};

define_wire_enum! {
    /// Severity of a run event.
    LogLevel {
        Debug = "DEBUG",
        Info = "INFO",
        Warning = "WARNING",
        Error = "ERROR",
        Critical = "CRITICAL",
    }
}

define_wire_enum! {
    /// Discriminant of [`EventKind`], used for filtering and display.
    EventType {
        RunEnqueued = "RUN_ENQUEUED",
        RunStarting = "RUN_STARTING",
        RunStart = "RUN_START",
        StepStart = "STEP_START",
        StepOutput = "STEP_OUTPUT",
        StepSuccess = "STEP_SUCCESS",
        StepFailure = "STEP_FAILURE",
        AssetMaterialization = "ASSET_MATERIALIZATION",
        RunSuccess = "RUN_SUCCESS",
        RunFailure = "RUN_FAILURE",
        RunCanceling = "RUN_CANCELING",
        RunCanceled = "RUN_CANCELED",
        EngineEvent = "ENGINE_EVENT",
    }
}

/// What happened, with the data specific to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    RunEnqueued,
    RunStarting,
    RunStart,
    StepStart,
    StepOutput { output_name: String },
    StepSuccess,
    StepFailure { error: String },
    AssetMaterialization {
        asset_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    RunSuccess,
    RunFailure,
    RunCanceling,
    RunCanceled,
    EngineEvent,
}

impl EventKind {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::RunEnqueued => EventType::RunEnqueued,
            Self::RunStarting => EventType::RunStarting,
            Self::RunStart => EventType::RunStart,
            Self::StepStart => EventType::StepStart,
            Self::StepOutput { .. } => EventType::StepOutput,
            Self::StepSuccess => EventType::StepSuccess,
            Self::StepFailure { .. } => EventType::StepFailure,
            Self::AssetMaterialization { .. } => EventType::AssetMaterialization,
            Self::RunSuccess => EventType::RunSuccess,
            Self::RunFailure => EventType::RunFailure,
            Self::RunCanceling => EventType::RunCanceling,
            Self::RunCanceled => EventType::RunCanceled,
            Self::EngineEvent => EventType::EngineEvent,
        }
    }

    /// Whether this event ends the run.
    pub fn is_run_terminal(&self) -> bool {
        matches!(self, Self::RunSuccess | Self::RunFailure | Self::RunCanceled)
    }
}

/// A single entry of a run's event log.
///
/// `sequence` is assigned by the event log when the entry is appended and
/// increases by one per run, starting at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub run_id: RunId,
    pub sequence: u64,
    pub timestamp: Timestamp,
    pub level: LogLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_key: Option<String>,
    pub message: String,
    pub kind: EventKind,
}

impl LogEvent {
    /// An unsequenced event stamped with the current time.
    pub fn new(run_id: RunId, kind: EventKind, message: impl Into<String>) -> Self {
        let level = match kind {
            EventKind::StepFailure { .. } | EventKind::RunFailure => LogLevel::Error,
            EventKind::EngineEvent => LogLevel::Debug,
            _ => LogLevel::Info,
        };
        Self {
            run_id,
            sequence: 0,
            timestamp: chrono::Utc::now(),
            level,
            step_key: None,
            message: message.into(),
            kind,
        }
    }

    pub fn with_step(mut self, step_key: impl Into<String>) -> Self {
        self.step_key = Some(step_key.into());
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_events_default_to_error_level() {
        let event = LogEvent::new(
            uuid::Uuid::new_v4(),
            EventKind::StepFailure {
                error: "boom".into(),
            },
            "Step failed",
        )
        .with_step("transform");
        assert_eq!(event.level, LogLevel::Error);
        assert_eq!(event.event_type(), EventType::StepFailure);
        assert_eq!(event.step_key.as_deref(), Some("transform"));
    }

    #[test]
    fn kind_serializes_with_type_tag() {
        let kind = EventKind::AssetMaterialization {
            asset_key: "warehouse/events".into(),
            description: None,
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "ASSET_MATERIALIZATION");
        assert_eq!(json["asset_key"], "warehouse/events");
        assert_eq!(kind.event_type().as_str(), "ASSET_MATERIALIZATION");
    }

    #[test]
    fn only_run_end_events_are_terminal() {
        assert!(EventKind::RunCanceled.is_run_terminal());
        assert!(!EventKind::RunCanceling.is_run_terminal());
        assert!(!EventKind::StepSuccess.is_run_terminal());
    }
}
