//! Run records and run statistics.

use serde::{Deserialize, Serialize};

use crate::event::{EventKind, LogEvent};
use crate::status::RunStatus;
use crate::types::{RunId, Tags, Timestamp};

/// The engine's record of one pipeline execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub pipeline_name: String,
    pub location_name: String,
    pub pipeline_snapshot_id: String,
    pub mode: String,
    /// Run config after defaults were applied.
    pub run_config: serde_json::Value,
    pub solid_selection: Option<Vec<String>>,
    /// Step keys the run executes, in execution order.
    pub step_keys: Vec<String>,
    pub tags: Tags,
    pub status: RunStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Aggregates over a run's event log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub steps_succeeded: u32,
    pub steps_failed: u32,
    pub materializations: u32,
    pub enqueued_time: Option<Timestamp>,
    pub launch_time: Option<Timestamp>,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
}

impl RunStats {
    /// Fold a run's events into statistics.
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a LogEvent>) -> Self {
        let mut stats = Self::default();
        for event in events {
            match &event.kind {
                EventKind::RunEnqueued => stats.enqueued_time = Some(event.timestamp),
                EventKind::RunStarting => stats.launch_time = Some(event.timestamp),
                EventKind::RunStart => stats.start_time = Some(event.timestamp),
                EventKind::StepSuccess => stats.steps_succeeded += 1,
                EventKind::StepFailure { .. } => stats.steps_failed += 1,
                EventKind::AssetMaterialization { .. } => stats.materializations += 1,
                kind if kind.is_run_terminal() => stats.end_time = Some(event.timestamp),
                _ => {}
            }
        }
        stats
    }
}

/// Criteria for listing runs. Unset fields do not restrict.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunsFilter {
    #[serde(default)]
    pub pipeline_name: Option<String>,
    #[serde(default)]
    pub status: Option<RunStatus>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl RunsFilter {
    pub fn matches(&self, run: &RunRecord) -> bool {
        self.pipeline_name
            .as_ref()
            .map_or(true, |name| &run.pipeline_name == name)
            && self.status.map_or(true, |status| run.status == status)
    }
}
