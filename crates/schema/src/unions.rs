//! Result unions. Exactly one variant is populated; the `__typename` tag
//! names it on the wire.

use crate::entities::*;
use crate::errors::*;
use crate::registry::result_union;

result_union! {
    PipelineReference { Pipeline, UnknownPipeline }
}

result_union! {
    PipelineRunEvent {
        LogMessageEvent,
        ExecutionStepOutputEvent,
        ExecutionStepFailureEvent,
        StepMaterializationEvent,
    }
}

result_union! {
    EvaluationStackEntry { EvaluationStackPathEntry, EvaluationStackListItemEntry }
}

result_union! {
    PipelineConfigValidationError {
        FieldNotDefinedConfigError,
        FieldsNotDefinedConfigError,
        MissingFieldConfigError,
        MissingFieldsConfigError,
        RuntimeMismatchConfigError,
        SelectorTypeConfigError,
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

result_union! {
    PipelineOrError {
        Pipeline,
        PipelineNotFoundError,
        RepositoryLocationNotFound,
        InvalidSubsetError,
        InvalidRequestError,
    }
}

result_union! {
    PipelineSnapshotOrError {
        PipelineSnapshot,
        PipelineNotFoundError,
        PipelineSnapshotNotFoundError,
        RepositoryLocationNotFound,
        InvalidSubsetError,
        InvalidRequestError,
    }
}

result_union! {
    PipelineRunOrError { PipelineRun, PipelineRunNotFoundError, InvalidRequestError }
}

result_union! {
    PipelineRunStatsOrError {
        PipelineRunStatsSnapshot,
        PipelineRunNotFoundError,
        InvalidRequestError,
    }
}

result_union! {
    PipelineRunsOrError { PipelineRuns, InvalidRequestError }
}

result_union! {
    EventsOrError { EventConnection, PipelineRunNotFoundError, InvalidRequestError }
}

result_union! {
    PipelineConfigValidationResult {
        PipelineConfigValidationValid,
        PipelineConfigValidationInvalid,
        PipelineNotFoundError,
        RepositoryLocationNotFound,
        InvalidSubsetError,
        ModeNotFoundError,
        InvalidOutputError,
        InvalidRequestError,
    }
}

result_union! {
    ConfigTypeOrError {
        ConfigType,
        ConfigTypeNotFoundError,
        PipelineNotFoundError,
        RepositoryLocationNotFound,
        InvalidSubsetError,
        ModeNotFoundError,
        InvalidRequestError,
    }
}

result_union! {
    AssetOrError { Asset, AssetNotFoundError, InvalidRequestError }
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

result_union! {
    LaunchRunResult {
        LaunchRunSuccess,
        PipelineNotFoundError,
        RepositoryLocationNotFound,
        ModeNotFoundError,
        PresetNotFoundError,
        InvalidSubsetError,
        PipelineConfigValidationInvalid,
        InvalidOutputError,
        InvalidRequestError,
    }
}

result_union! {
    TerminateRunResult {
        TerminateRunSuccess,
        TerminateRunFailure,
        PipelineRunNotFoundError,
        InvalidRequestError,
    }
}

result_union! {
    ReloadRepositoryLocationResult {
        RepositoryLocationReload,
        RepositoryLocationNotFound,
        InvalidRequestError,
    }
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

result_union! {
    /// One frame of a run log subscription. A failure frame is always the
    /// last one.
    PipelineRunLogsSubscriptionPayload {
        PipelineRunLogsSubscriptionSuccess,
        PipelineRunLogsSubscriptionFailure,
    }
}

impl PipelineRunLogsSubscriptionPayload {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::PipelineRunLogsSubscriptionFailure(_))
    }
}
