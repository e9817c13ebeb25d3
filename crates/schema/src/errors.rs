//! Error variants. Each carries a human-readable `message` plus the fields
//! specific to its diagnosis, and nothing else.

use flowgate_core::evaluation::EvaluationErrorReason;
use serde::{Deserialize, Serialize};

use crate::registry::{graph_enum, graph_object, GraphType, TypeDescriptor};
use crate::unions::{EvaluationStackEntry, PipelineConfigValidationError};

graph_enum!(EvaluationErrorReason => "EvaluationErrorReason");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineNotFoundError {
    pub message: String,
    pub pipeline_name: String,
    pub location_name: Option<String>,
}
graph_object!(PipelineNotFoundError);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryLocationNotFound {
    pub message: String,
    pub location_name: String,
}
graph_object!(RepositoryLocationNotFound);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRunNotFoundError {
    pub message: String,
    pub run_id: String,
}
graph_object!(PipelineRunNotFoundError);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeNotFoundError {
    pub message: String,
    pub pipeline_name: String,
    pub mode: String,
}
graph_object!(ModeNotFoundError);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetNotFoundError {
    pub message: String,
    pub pipeline_name: String,
    pub preset: String,
}
graph_object!(PresetNotFoundError);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidSubsetError {
    pub message: String,
    pub pipeline_name: String,
    pub unknown_solids: Vec<String>,
}
graph_object!(InvalidSubsetError);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigTypeNotFoundError {
    pub message: String,
    pub pipeline_name: String,
    pub config_type_key: String,
}
graph_object!(ConfigTypeNotFoundError);

/// A consumer requests an output whose declared type differs from the
/// type the consumer expects, or that its producer does not declare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidOutputError {
    pub message: String,
    pub step_key: String,
    pub output_name: String,
    pub expected_type: String,
    pub actual_type: Option<String>,
}
graph_object!(InvalidOutputError);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSnapshotNotFoundError {
    pub message: String,
    pub snapshot_id: String,
}
graph_object!(PipelineSnapshotNotFoundError);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetNotFoundError {
    pub message: String,
    pub asset_key: String,
}
graph_object!(AssetNotFoundError);

/// Fallback for failures an operation has no dedicated variant for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidRequestError {
    pub message: String,
    /// Machine-readable cause, e.g. `RUN_NOT_TERMINABLE`.
    pub reason: String,
}
graph_object!(InvalidRequestError);

// ---------------------------------------------------------------------------
// Config validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationStackPathEntry {
    pub field_name: String,
}
graph_object!(EvaluationStackPathEntry);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationStackListItemEntry {
    pub list_index: usize,
}
graph_object!(EvaluationStackListItemEntry);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationStack {
    pub entries: Vec<EvaluationStackEntry>,
}
graph_object!(EvaluationStack, refs: [EvaluationStackEntry]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldNotDefinedConfigError {
    pub message: String,
    pub path: Vec<String>,
    pub stack: EvaluationStack,
    pub reason: EvaluationErrorReason,
    pub field_name: String,
}
graph_object!(FieldNotDefinedConfigError, refs: [EvaluationStack, EvaluationErrorReason]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldsNotDefinedConfigError {
    pub message: String,
    pub path: Vec<String>,
    pub stack: EvaluationStack,
    pub reason: EvaluationErrorReason,
    pub field_names: Vec<String>,
}
graph_object!(FieldsNotDefinedConfigError, refs: [EvaluationStack, EvaluationErrorReason]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingFieldConfigError {
    pub message: String,
    pub path: Vec<String>,
    pub stack: EvaluationStack,
    pub reason: EvaluationErrorReason,
    pub field_name: String,
}
graph_object!(MissingFieldConfigError, refs: [EvaluationStack, EvaluationErrorReason]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingFieldsConfigError {
    pub message: String,
    pub path: Vec<String>,
    pub stack: EvaluationStack,
    pub reason: EvaluationErrorReason,
    pub field_names: Vec<String>,
}
graph_object!(MissingFieldsConfigError, refs: [EvaluationStack, EvaluationErrorReason]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeMismatchConfigError {
    pub message: String,
    pub path: Vec<String>,
    pub stack: EvaluationStack,
    pub reason: EvaluationErrorReason,
    pub value_rep: String,
}
graph_object!(RuntimeMismatchConfigError, refs: [EvaluationStack, EvaluationErrorReason]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorTypeConfigError {
    pub message: String,
    pub path: Vec<String>,
    pub stack: EvaluationStack,
    pub reason: EvaluationErrorReason,
    pub incoming_fields: Vec<String>,
}
graph_object!(SelectorTypeConfigError, refs: [EvaluationStack, EvaluationErrorReason]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfigValidationValid {
    pub pipeline_name: String,
    pub mode: String,
}
graph_object!(PipelineConfigValidationValid);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfigValidationInvalid {
    pub pipeline_name: String,
    pub mode: String,
    pub errors: Vec<PipelineConfigValidationError>,
}
graph_object!(PipelineConfigValidationInvalid, refs: [PipelineConfigValidationError]);

const ERROR_IMPLEMENTORS: &[&str] = &[
    PipelineNotFoundError::NAME,
    RepositoryLocationNotFound::NAME,
    PipelineRunNotFoundError::NAME,
    ModeNotFoundError::NAME,
    PresetNotFoundError::NAME,
    InvalidSubsetError::NAME,
    ConfigTypeNotFoundError::NAME,
    InvalidOutputError::NAME,
    PipelineSnapshotNotFoundError::NAME,
    AssetNotFoundError::NAME,
    InvalidRequestError::NAME,
    FieldNotDefinedConfigError::NAME,
    FieldsNotDefinedConfigError::NAME,
    MissingFieldConfigError::NAME,
    MissingFieldsConfigError::NAME,
    RuntimeMismatchConfigError::NAME,
    SelectorTypeConfigError::NAME,
];

/// Every type carrying a `message` that describes a failure.
pub const ERROR_INTERFACE: TypeDescriptor = TypeDescriptor::interface("Error", ERROR_IMPLEMENTORS);
