//! Result-union resolution of engine failures.
//!
//! Every engine failure maps onto exactly one member of the union an
//! operation returns. Each error member knows which [`EngineError`] it
//! describes ([`ErrorMember`]); each union lists the error members it
//! accepts ([`Resolve`]). A failure none of the listed members describes
//! becomes an [`InvalidRequestError`], so no failure is ever dropped.

use flowgate_engine::EngineError;
use flowgate_schema::*;

/// An error type that describes some engine failures.
pub trait ErrorMember: Sized {
    fn project(err: &EngineError) -> Option<Self>;
}

/// A result union that engine failures can be resolved onto.
pub trait Resolve: Sized {
    fn resolve(err: EngineError) -> Self;

    /// The success value, or the failure resolved onto this union.
    fn resolve_result<T: Into<Self>>(result: Result<T, EngineError>) -> Self {
        match result {
            Ok(value) => value.into(),
            Err(err) => Self::resolve(err),
        }
    }
}

/// Generic member for failures an operation has no dedicated member for.
pub fn invalid_request(err: &EngineError) -> InvalidRequestError {
    let message = match err {
        EngineError::Unexpected(detail) => {
            tracing::error!(error = %detail, "Unexpected engine error");
            "An unexpected error occurred".to_string()
        }
        other => other.to_string(),
    };
    InvalidRequestError {
        message,
        reason: err.reason().to_string(),
    }
}

impl ErrorMember for PipelineNotFoundError {
    fn project(err: &EngineError) -> Option<Self> {
        match err {
            EngineError::PipelineNotFound {
                pipeline_name,
                location_name,
            } => Some(Self {
                message: err.to_string(),
                pipeline_name: pipeline_name.clone(),
                location_name: location_name.clone(),
            }),
            _ => None,
        }
    }
}

impl ErrorMember for RepositoryLocationNotFound {
    fn project(err: &EngineError) -> Option<Self> {
        match err {
            EngineError::LocationNotFound { location_name } => Some(Self {
                message: err.to_string(),
                location_name: location_name.clone(),
            }),
            _ => None,
        }
    }
}

impl ErrorMember for PipelineRunNotFoundError {
    fn project(err: &EngineError) -> Option<Self> {
        match err {
            EngineError::RunNotFound { run_id } => Some(Self {
                message: err.to_string(),
                run_id: run_id.clone(),
            }),
            _ => None,
        }
    }
}

impl ErrorMember for ModeNotFoundError {
    fn project(err: &EngineError) -> Option<Self> {
        match err {
            EngineError::ModeNotFound {
                pipeline_name,
                mode,
            } => Some(Self {
                message: err.to_string(),
                pipeline_name: pipeline_name.clone(),
                mode: mode.clone(),
            }),
            _ => None,
        }
    }
}

impl ErrorMember for PresetNotFoundError {
    fn project(err: &EngineError) -> Option<Self> {
        match err {
            EngineError::PresetNotFound {
                pipeline_name,
                preset,
            } => Some(Self {
                message: err.to_string(),
                pipeline_name: pipeline_name.clone(),
                preset: preset.clone(),
            }),
            _ => None,
        }
    }
}

impl ErrorMember for InvalidSubsetError {
    fn project(err: &EngineError) -> Option<Self> {
        match err {
            EngineError::InvalidSubset {
                pipeline_name,
                message,
                unknown_solids,
            } => Some(Self {
                message: message.clone(),
                pipeline_name: pipeline_name.clone(),
                unknown_solids: unknown_solids.clone(),
            }),
            _ => None,
        }
    }
}

impl ErrorMember for ConfigTypeNotFoundError {
    fn project(err: &EngineError) -> Option<Self> {
        match err {
            EngineError::ConfigTypeNotFound {
                pipeline_name,
                config_type_key,
            } => Some(Self {
                message: err.to_string(),
                pipeline_name: pipeline_name.clone(),
                config_type_key: config_type_key.clone(),
            }),
            _ => None,
        }
    }
}

impl ErrorMember for InvalidOutputError {
    fn project(err: &EngineError) -> Option<Self> {
        match err {
            EngineError::InvalidOutput {
                step_key,
                output_name,
                expected_type,
                actual_type,
            } => Some(Self {
                message: err.to_string(),
                step_key: step_key.clone(),
                output_name: output_name.clone(),
                expected_type: expected_type.clone(),
                actual_type: actual_type.clone(),
            }),
            _ => None,
        }
    }
}

impl ErrorMember for PipelineSnapshotNotFoundError {
    fn project(err: &EngineError) -> Option<Self> {
        match err {
            EngineError::SnapshotNotFound { snapshot_id } => Some(Self {
                message: err.to_string(),
                snapshot_id: snapshot_id.clone(),
            }),
            _ => None,
        }
    }
}

impl ErrorMember for AssetNotFoundError {
    fn project(err: &EngineError) -> Option<Self> {
        match err {
            EngineError::AssetNotFound { asset_key } => Some(Self {
                message: err.to_string(),
                asset_key: asset_key.clone(),
            }),
            _ => None,
        }
    }
}

impl ErrorMember for PipelineConfigValidationInvalid {
    fn project(err: &EngineError) -> Option<Self> {
        match err {
            EngineError::RunConfigInvalid {
                pipeline_name,
                mode,
                errors,
            } => Some(Self {
                pipeline_name: pipeline_name.clone(),
                mode: mode.clone(),
                errors: errors.iter().map(PipelineConfigValidationError::from).collect(),
            }),
            _ => None,
        }
    }
}

macro_rules! resolves {
    ($union:ident: $($member:ident),+ $(,)?) => {
        impl Resolve for $union {
            fn resolve(err: EngineError) -> Self {
                $(
                    if let Some(member) = <$member as ErrorMember>::project(&err) {
                        return member.into();
                    }
                )+
                invalid_request(&err).into()
            }
        }
    };
}

resolves!(PipelineOrError: PipelineNotFoundError, RepositoryLocationNotFound, InvalidSubsetError);
resolves!(
    PipelineSnapshotOrError: PipelineNotFoundError,
    PipelineSnapshotNotFoundError,
    RepositoryLocationNotFound,
    InvalidSubsetError,
);
resolves!(PipelineRunOrError: PipelineRunNotFoundError);
resolves!(PipelineRunStatsOrError: PipelineRunNotFoundError);
resolves!(EventsOrError: PipelineRunNotFoundError);
resolves!(
    PipelineConfigValidationResult: PipelineConfigValidationInvalid,
    PipelineNotFoundError,
    RepositoryLocationNotFound,
    InvalidSubsetError,
    ModeNotFoundError,
    InvalidOutputError,
);
resolves!(
    ConfigTypeOrError: ConfigTypeNotFoundError,
    PipelineNotFoundError,
    RepositoryLocationNotFound,
    InvalidSubsetError,
    ModeNotFoundError,
);
resolves!(AssetOrError: AssetNotFoundError);
resolves!(
    LaunchRunResult: PipelineNotFoundError,
    RepositoryLocationNotFound,
    ModeNotFoundError,
    PresetNotFoundError,
    InvalidSubsetError,
    PipelineConfigValidationInvalid,
    InvalidOutputError,
);
resolves!(TerminateRunResult: PipelineRunNotFoundError);
resolves!(ReloadRepositoryLocationResult: RepositoryLocationNotFound);

impl Resolve for PipelineRunsOrError {
    fn resolve(err: EngineError) -> Self {
        invalid_request(&err).into()
    }
}
