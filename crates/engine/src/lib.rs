//! In-process orchestration engine behind the gateway.
//!
//! The gateway only talks to [`Instance`], whose operations return
//! `Result<_, EngineError>` with a closed set of failure reasons. Behind it
//! sit the [`Workspace`](workspace::Workspace) of repository locations, the
//! run and snapshot stores, and the run executor.

pub mod error;
pub mod executor;
pub mod instance;
pub mod location;
pub mod plan;
pub mod workspace;

pub use error::{EngineError, FailureReason};
pub use executor::{
    DefinitionStepExecutor, StepContext, StepExecutor, StepMaterialization, StepOutcome,
};
pub use instance::{
    AssetRecord, Instance, InstanceSettings, LaunchRequest, MaterializationRecord,
    PipelineSelector, PipelineView, SnapshotRecord,
};
pub use location::{FileLocationSource, LocationSource, StaticLocationSource};
pub use plan::ExecutionPlan;
pub use workspace::{LocatedPipeline, LocationInfo, ReloadOutcome, Workspace};
