//! Entity types: per-request projections of engine state.

use flowgate_core::event::{EventType, LogLevel};
use flowgate_core::status::RunStatus;
use flowgate_core::types::{RunId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::{graph_enum, graph_object};
use crate::unions::{PipelineReference, PipelineRunEvent};

graph_enum!(RunStatus => "PipelineRunStatus");
graph_enum!(LogLevel => "LogLevel");
graph_enum!(EventType => "DagsterEventType");

flowgate_core::define_wire_enum! {
    /// Outcome of a repository location reload.
    ReloadRepositoryLocationStatus {
        Success = "SUCCESS",
        Error = "ERROR",
        /// The location already served the current definitions.
        Skipped = "SKIPPED",
    }
}
graph_enum!(ReloadRepositoryLocationStatus => "ReloadRepositoryLocationStatus");

// ---------------------------------------------------------------------------
// Pipelines
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineTag {
    pub key: String,
    pub value: String,
}
graph_object!(PipelineTag);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub name: String,
    pub dagster_type: String,
    pub from_solid: Option<String>,
    pub from_output: Option<String>,
}
graph_object!(Input);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub name: String,
    pub dagster_type: String,
}
graph_object!(Output);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solid {
    pub name: String,
    pub description: Option<String>,
    pub config_type_key: Option<String>,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub materializes: Vec<String>,
}
graph_object!(Solid, refs: [Input, Output]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub description: Option<String>,
    pub config_type_key: Option<String>,
}
graph_object!(Resource);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Logger {
    pub name: String,
    pub description: Option<String>,
    pub config_type_key: Option<String>,
}
graph_object!(Logger);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mode {
    pub name: String,
    pub description: Option<String>,
    pub resources: Vec<Resource>,
    pub loggers: Vec<Logger>,
}
graph_object!(Mode, refs: [Resource, Logger]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelinePreset {
    pub name: String,
    pub mode: String,
    pub run_config: Value,
    pub solid_selection: Option<Vec<String>>,
    pub tags: Vec<PipelineTag>,
}
graph_object!(PipelinePreset, refs: [PipelineTag]);

/// A pipeline as currently served. With a solid selection, the pipeline is
/// the selected subset and `parent_snapshot_id` names the full definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,
    pub description: Option<String>,
    pub location_name: String,
    pub pipeline_snapshot_id: String,
    pub parent_snapshot_id: Option<String>,
    pub solid_selection: Option<Vec<String>>,
    pub solids: Vec<Solid>,
    pub modes: Vec<Mode>,
    pub presets: Vec<PipelinePreset>,
    pub tags: Vec<PipelineTag>,
}
graph_object!(Pipeline, refs: [Solid, Mode, PipelinePreset, PipelineTag]);

/// An immutable definition, retrievable by id after the pipeline changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub pipeline_snapshot_id: String,
    pub parent_snapshot_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub location_name: String,
    pub solids: Vec<Solid>,
    pub modes: Vec<Mode>,
    pub presets: Vec<PipelinePreset>,
    pub tags: Vec<PipelineTag>,
    pub created_at: Timestamp,
}
graph_object!(PipelineSnapshot, refs: [Solid, Mode, PipelinePreset, PipelineTag]);

/// A run's pipeline that the workspace no longer serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownPipeline {
    pub name: String,
    pub solid_selection: Option<Vec<String>>,
}
graph_object!(UnknownPipeline);

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: RunId,
    pub status: RunStatus,
    pub can_terminate: bool,
    pub pipeline: PipelineReference,
    pub pipeline_name: String,
    pub location_name: String,
    pub pipeline_snapshot_id: String,
    pub mode: String,
    pub run_config: Value,
    pub solid_selection: Option<Vec<String>>,
    pub step_keys: Vec<String>,
    pub tags: Vec<PipelineTag>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
graph_object!(PipelineRun, refs: [RunStatus, PipelineReference, PipelineTag]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRuns {
    pub results: Vec<PipelineRun>,
    pub count: usize,
}
graph_object!(PipelineRuns, refs: [PipelineRun]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRunStatsSnapshot {
    pub run_id: RunId,
    pub steps_succeeded: u32,
    pub steps_failed: u32,
    pub materializations: u32,
    pub enqueued_time: Option<Timestamp>,
    pub launch_time: Option<Timestamp>,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
}
graph_object!(PipelineRunStatsSnapshot);

// ---------------------------------------------------------------------------
// Run events
// ---------------------------------------------------------------------------

/// A lifecycle event with no payload of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessageEvent {
    pub run_id: RunId,
    pub sequence: u64,
    pub timestamp: Timestamp,
    pub level: LogLevel,
    pub step_key: Option<String>,
    pub message: String,
    pub event_type: EventType,
}
graph_object!(LogMessageEvent, refs: [LogLevel, EventType]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStepOutputEvent {
    pub run_id: RunId,
    pub sequence: u64,
    pub timestamp: Timestamp,
    pub level: LogLevel,
    pub step_key: Option<String>,
    pub message: String,
    pub event_type: EventType,
    pub output_name: String,
}
graph_object!(ExecutionStepOutputEvent, refs: [LogLevel, EventType]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStepFailureEvent {
    pub run_id: RunId,
    pub sequence: u64,
    pub timestamp: Timestamp,
    pub level: LogLevel,
    pub step_key: Option<String>,
    pub message: String,
    pub event_type: EventType,
    pub error: String,
}
graph_object!(ExecutionStepFailureEvent, refs: [LogLevel, EventType]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMaterializationEvent {
    pub run_id: RunId,
    pub sequence: u64,
    pub timestamp: Timestamp,
    pub level: LogLevel,
    pub step_key: Option<String>,
    pub message: String,
    pub event_type: EventType,
    pub materialization: AssetMaterialization,
}
graph_object!(StepMaterializationEvent, refs: [LogLevel, EventType, AssetMaterialization]);

/// A page of a run's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventConnection {
    pub run_id: RunId,
    pub events: Vec<PipelineRunEvent>,
    /// Sequence of the last event returned; pass it back as `after` to
    /// continue.
    pub cursor: Option<u64>,
    /// The filter applied, rendered as a query string.
    pub filter: Option<String>,
}
graph_object!(EventConnection, refs: [PipelineRunEvent]);

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMaterialization {
    pub asset_key: String,
    pub run_id: RunId,
    pub step_key: Option<String>,
    pub description: Option<String>,
    pub timestamp: Timestamp,
}
graph_object!(AssetMaterialization);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub asset_key: String,
    /// `asset_key` split on `/`.
    pub path: Vec<String>,
    pub materializations: Vec<AssetMaterialization>,
}
graph_object!(Asset, refs: [AssetMaterialization]);

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigTypeField {
    pub name: String,
    pub config_type_key: String,
    pub is_required: bool,
    pub default_value_as_json: Option<String>,
    pub description: Option<String>,
}
graph_object!(ConfigTypeField);

/// One node of a run config schema. Nested types are referenced by key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigType {
    pub key: String,
    /// `Any`, `Bool`, `Int`, `Float`, `String`, `Array`, `Noneable`,
    /// `Enum`, `Shape` or `Selector`.
    pub kind: String,
    pub description: String,
    pub is_selector: bool,
    pub fields: Vec<ConfigTypeField>,
    pub enum_values: Vec<String>,
    pub inner_type_keys: Vec<String>,
}
graph_object!(ConfigType, refs: [ConfigTypeField]);

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceLocationEntry {
    pub name: String,
    pub repository_name: Option<String>,
    pub pipeline_names: Vec<String>,
    /// Set when the last load failed; the previous definitions stay served.
    pub load_error: Option<String>,
    pub updated_at: Timestamp,
}
graph_object!(WorkspaceLocationEntry);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub locations: Vec<WorkspaceLocationEntry>,
}
graph_object!(Workspace, refs: [WorkspaceLocationEntry]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryLocationReload {
    pub status: ReloadRepositoryLocationStatus,
    pub message: Option<String>,
    pub location: WorkspaceLocationEntry,
}
graph_object!(RepositoryLocationReload, refs: [ReloadRepositoryLocationStatus, WorkspaceLocationEntry]);

// ---------------------------------------------------------------------------
// Mutation and subscription payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchRunSuccess {
    pub run: PipelineRun,
}
graph_object!(LaunchRunSuccess, refs: [PipelineRun]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminateRunSuccess {
    pub run: PipelineRun,
}
graph_object!(TerminateRunSuccess, refs: [PipelineRun]);

/// The run exists but has already finished or is being canceled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminateRunFailure {
    pub message: String,
    pub run: PipelineRun,
}
graph_object!(TerminateRunFailure, refs: [PipelineRun]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRunLogsSubscriptionSuccess {
    pub run_id: RunId,
    pub messages: Vec<PipelineRunEvent>,
}
graph_object!(PipelineRunLogsSubscriptionSuccess, refs: [PipelineRunEvent]);

/// Terminal payload of a log subscription; nothing follows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRunLogsSubscriptionFailure {
    pub message: String,
    pub missing_run_id: Option<String>,
}
graph_object!(PipelineRunLogsSubscriptionFailure);
