//! Exposed contract of the flowgate gateway.
//!
//! Every type the gateway can return lives here, shared by the server and
//! the client. [`SCHEMA`] enumerates them at compile time together with
//! the operations that reach them; the server refuses to start unless
//! [`Registry::validate`] passes.

pub mod entities;
pub mod errors;
pub mod project;
pub mod registry;
pub mod unions;

pub use entities::*;
pub use errors::*;
pub use registry::{
    GraphType, Operation, OperationKind, Registry, RegistryError, TypeDescriptor, TypeKind,
};
pub use unions::*;

use flowgate_core::evaluation::EvaluationErrorReason;
use flowgate_core::event::{EventType, LogLevel};
use flowgate_core::status::RunStatus;

/// Version of the exposed contract. Bumped whenever a type or operation
/// changes shape.
pub const SCHEMA_VERSION: &str = "1.0.0";

const PIPELINE_SNAPSHOT_IMPLEMENTORS: &[&str] = &[Pipeline::NAME, PipelineSnapshot::NAME];

const MESSAGE_EVENT_IMPLEMENTORS: &[&str] = &[
    LogMessageEvent::NAME,
    ExecutionStepOutputEvent::NAME,
    ExecutionStepFailureEvent::NAME,
    StepMaterializationEvent::NAME,
];

/// Shared shape of a current pipeline and a stored snapshot.
pub const I_PIPELINE_SNAPSHOT: TypeDescriptor =
    TypeDescriptor::interface("IPipelineSnapshot", PIPELINE_SNAPSHOT_IMPLEMENTORS);

/// Fields common to every run event.
pub const MESSAGE_EVENT: TypeDescriptor =
    TypeDescriptor::interface("MessageEvent", MESSAGE_EVENT_IMPLEMENTORS);

/// Every exposed type.
pub static REGISTRY: &[TypeDescriptor] = &[
    // Enums
    RunStatus::DESCRIPTOR,
    LogLevel::DESCRIPTOR,
    EventType::DESCRIPTOR,
    EvaluationErrorReason::DESCRIPTOR,
    ReloadRepositoryLocationStatus::DESCRIPTOR,
    // Interfaces
    ERROR_INTERFACE,
    I_PIPELINE_SNAPSHOT,
    MESSAGE_EVENT,
    // Pipelines
    PipelineTag::DESCRIPTOR,
    Input::DESCRIPTOR,
    Output::DESCRIPTOR,
    Solid::DESCRIPTOR,
    Resource::DESCRIPTOR,
    Logger::DESCRIPTOR,
    Mode::DESCRIPTOR,
    PipelinePreset::DESCRIPTOR,
    Pipeline::DESCRIPTOR,
    PipelineSnapshot::DESCRIPTOR,
    UnknownPipeline::DESCRIPTOR,
    PipelineReference::DESCRIPTOR,
    // Runs
    PipelineRun::DESCRIPTOR,
    PipelineRuns::DESCRIPTOR,
    PipelineRunStatsSnapshot::DESCRIPTOR,
    // Events
    LogMessageEvent::DESCRIPTOR,
    ExecutionStepOutputEvent::DESCRIPTOR,
    ExecutionStepFailureEvent::DESCRIPTOR,
    StepMaterializationEvent::DESCRIPTOR,
    PipelineRunEvent::DESCRIPTOR,
    EventConnection::DESCRIPTOR,
    // Assets
    AssetMaterialization::DESCRIPTOR,
    Asset::DESCRIPTOR,
    // Config types and validation
    ConfigTypeField::DESCRIPTOR,
    ConfigType::DESCRIPTOR,
    EvaluationStackPathEntry::DESCRIPTOR,
    EvaluationStackListItemEntry::DESCRIPTOR,
    EvaluationStackEntry::DESCRIPTOR,
    EvaluationStack::DESCRIPTOR,
    FieldNotDefinedConfigError::DESCRIPTOR,
    FieldsNotDefinedConfigError::DESCRIPTOR,
    MissingFieldConfigError::DESCRIPTOR,
    MissingFieldsConfigError::DESCRIPTOR,
    RuntimeMismatchConfigError::DESCRIPTOR,
    SelectorTypeConfigError::DESCRIPTOR,
    PipelineConfigValidationError::DESCRIPTOR,
    PipelineConfigValidationValid::DESCRIPTOR,
    PipelineConfigValidationInvalid::DESCRIPTOR,
    // Workspace
    WorkspaceLocationEntry::DESCRIPTOR,
    Workspace::DESCRIPTOR,
    RepositoryLocationReload::DESCRIPTOR,
    // Errors
    PipelineNotFoundError::DESCRIPTOR,
    RepositoryLocationNotFound::DESCRIPTOR,
    PipelineRunNotFoundError::DESCRIPTOR,
    ModeNotFoundError::DESCRIPTOR,
    PresetNotFoundError::DESCRIPTOR,
    InvalidSubsetError::DESCRIPTOR,
    ConfigTypeNotFoundError::DESCRIPTOR,
    InvalidOutputError::DESCRIPTOR,
    PipelineSnapshotNotFoundError::DESCRIPTOR,
    AssetNotFoundError::DESCRIPTOR,
    InvalidRequestError::DESCRIPTOR,
    // Mutation and subscription payloads
    LaunchRunSuccess::DESCRIPTOR,
    TerminateRunSuccess::DESCRIPTOR,
    TerminateRunFailure::DESCRIPTOR,
    PipelineRunLogsSubscriptionSuccess::DESCRIPTOR,
    PipelineRunLogsSubscriptionFailure::DESCRIPTOR,
    // Result unions
    PipelineOrError::DESCRIPTOR,
    PipelineSnapshotOrError::DESCRIPTOR,
    PipelineRunOrError::DESCRIPTOR,
    PipelineRunStatsOrError::DESCRIPTOR,
    PipelineRunsOrError::DESCRIPTOR,
    EventsOrError::DESCRIPTOR,
    PipelineConfigValidationResult::DESCRIPTOR,
    ConfigTypeOrError::DESCRIPTOR,
    AssetOrError::DESCRIPTOR,
    LaunchRunResult::DESCRIPTOR,
    TerminateRunResult::DESCRIPTOR,
    ReloadRepositoryLocationResult::DESCRIPTOR,
    PipelineRunLogsSubscriptionPayload::DESCRIPTOR,
];

const fn query(name: &'static str, result: &'static str) -> Operation {
    Operation {
        name,
        kind: OperationKind::Query,
        result,
    }
}

const fn mutation(name: &'static str, result: &'static str) -> Operation {
    Operation {
        name,
        kind: OperationKind::Mutation,
        result,
    }
}

/// Every entry point and the type it resolves to.
pub static OPERATIONS: &[Operation] = &[
    query("workspace", Workspace::NAME),
    query("pipelineOrError", PipelineOrError::NAME),
    query("pipelineSnapshotOrError", PipelineSnapshotOrError::NAME),
    query("isPipelineConfigValid", PipelineConfigValidationResult::NAME),
    query("configTypeOrError", ConfigTypeOrError::NAME),
    query("pipelineRunsOrError", PipelineRunsOrError::NAME),
    query("pipelineRunOrError", PipelineRunOrError::NAME),
    query("pipelineRunStatsOrError", PipelineRunStatsOrError::NAME),
    query("logsForRun", EventsOrError::NAME),
    query("assetOrError", AssetOrError::NAME),
    mutation("launchPipelineExecution", LaunchRunResult::NAME),
    mutation("terminatePipelineExecution", TerminateRunResult::NAME),
    mutation("reloadRepositoryLocation", ReloadRepositoryLocationResult::NAME),
    Operation {
        name: "pipelineRunLogs",
        kind: OperationKind::Subscription,
        result: PipelineRunLogsSubscriptionPayload::NAME,
    },
];

pub static SCHEMA: Registry = Registry::new(REGISTRY, OPERATIONS);

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn schema_is_complete() {
        assert_eq!(SCHEMA.validate(), Ok(()));
    }

    #[test]
    fn every_union_member_is_an_object() {
        for descriptor in SCHEMA.types() {
            if let TypeKind::Union { members } = descriptor.kind {
                for member in members {
                    assert_eq!(
                        SCHEMA.get(member).map(|d| d.kind),
                        Some(TypeKind::Object),
                        "{} -> {member}",
                        descriptor.name
                    );
                }
            }
        }
    }

    #[test]
    fn error_interface_covers_every_message_carrying_error() {
        let implementors: BTreeSet<&str> = match ERROR_INTERFACE.kind {
            TypeKind::Interface { implementors } => implementors.iter().copied().collect(),
            _ => unreachable!(),
        };
        for name in SCHEMA.types().iter().map(|d| d.name) {
            if name.ends_with("Error") && SCHEMA.get(name).map(|d| d.kind) == Some(TypeKind::Object) {
                assert!(implementors.contains(name), "{name} missing from Error");
            }
        }
    }

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(SCHEMA.fingerprint(), SCHEMA.fingerprint());
        assert_eq!(SCHEMA.fingerprint().len(), 64);
    }
}
