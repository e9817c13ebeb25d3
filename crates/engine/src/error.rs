use flowgate_core::evaluation::EvaluationError;
use flowgate_core::status::RunStatus;

/// Every way an engine operation can fail.
///
/// The set is closed: the gateway maps each variant onto a typed result
/// union member, falling back to a generic invalid-request member for the
/// reasons an operation has no dedicated member for.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Could not find pipeline '{pipeline_name}'")]
    PipelineNotFound {
        pipeline_name: String,
        location_name: Option<String>,
    },

    #[error("Repository location '{location_name}' does not exist")]
    LocationNotFound { location_name: String },

    #[error("Run {run_id} could not be found")]
    RunNotFound { run_id: String },

    #[error("Mode '{mode}' is not defined on pipeline '{pipeline_name}'")]
    ModeNotFound { pipeline_name: String, mode: String },

    #[error("Preset '{preset}' is not defined on pipeline '{pipeline_name}'")]
    PresetNotFound { pipeline_name: String, preset: String },

    #[error("{message}")]
    InvalidSubset {
        pipeline_name: String,
        message: String,
        unknown_solids: Vec<String>,
    },

    #[error("Run config for pipeline '{pipeline_name}' in mode '{mode}' is invalid ({} errors)", errors.len())]
    RunConfigInvalid {
        pipeline_name: String,
        mode: String,
        errors: Vec<EvaluationError>,
    },

    #[error("Config type '{config_type_key}' not found on pipeline '{pipeline_name}'")]
    ConfigTypeNotFound {
        pipeline_name: String,
        config_type_key: String,
    },

    #[error("Step '{step_key}' requests output '{output_name}' of type {expected_type} but its producer declares {}", actual_type.as_deref().unwrap_or("no such output"))]
    InvalidOutput {
        step_key: String,
        output_name: String,
        expected_type: String,
        actual_type: Option<String>,
    },

    #[error("Pipeline snapshot '{snapshot_id}' could not be found")]
    SnapshotNotFound { snapshot_id: String },

    #[error("Asset '{asset_key}' could not be found")]
    AssetNotFound { asset_key: String },

    #[error("Run {run_id} is {status} and cannot be terminated")]
    RunNotTerminable { run_id: String, status: RunStatus },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unexpected engine error: {0}")]
    Unexpected(String),
}

flowgate_core::define_wire_enum! {
    /// Discriminant of [`EngineError`].
    FailureReason {
        PipelineNotFound = "PIPELINE_NOT_FOUND",
        LocationNotFound = "LOCATION_NOT_FOUND",
        RunNotFound = "RUN_NOT_FOUND",
        ModeNotFound = "MODE_NOT_FOUND",
        PresetNotFound = "PRESET_NOT_FOUND",
        InvalidSubset = "INVALID_SUBSET",
        RunConfigInvalid = "RUN_CONFIG_INVALID",
        ConfigTypeNotFound = "CONFIG_TYPE_NOT_FOUND",
        InvalidOutput = "INVALID_OUTPUT",
        SnapshotNotFound = "SNAPSHOT_NOT_FOUND",
        AssetNotFound = "ASSET_NOT_FOUND",
        RunNotTerminable = "RUN_NOT_TERMINABLE",
        InvalidRequest = "INVALID_REQUEST",
        Unexpected = "UNEXPECTED",
    }
}

impl EngineError {
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::PipelineNotFound { .. } => FailureReason::PipelineNotFound,
            Self::LocationNotFound { .. } => FailureReason::LocationNotFound,
            Self::RunNotFound { .. } => FailureReason::RunNotFound,
            Self::ModeNotFound { .. } => FailureReason::ModeNotFound,
            Self::PresetNotFound { .. } => FailureReason::PresetNotFound,
            Self::InvalidSubset { .. } => FailureReason::InvalidSubset,
            Self::RunConfigInvalid { .. } => FailureReason::RunConfigInvalid,
            Self::ConfigTypeNotFound { .. } => FailureReason::ConfigTypeNotFound,
            Self::InvalidOutput { .. } => FailureReason::InvalidOutput,
            Self::SnapshotNotFound { .. } => FailureReason::SnapshotNotFound,
            Self::AssetNotFound { .. } => FailureReason::AssetNotFound,
            Self::RunNotTerminable { .. } => FailureReason::RunNotTerminable,
            Self::InvalidRequest(_) => FailureReason::InvalidRequest,
            Self::Unexpected(_) => FailureReason::Unexpected,
        }
    }

    /// A representative error for `reason`, used to exercise mappings.
    pub fn example(reason: FailureReason) -> Self {
        match reason {
            FailureReason::PipelineNotFound => Self::PipelineNotFound {
                pipeline_name: "missing".into(),
                location_name: None,
            },
            FailureReason::LocationNotFound => Self::LocationNotFound {
                location_name: "missing".into(),
            },
            FailureReason::RunNotFound => Self::RunNotFound {
                run_id: "00000000-0000-0000-0000-000000000000".into(),
            },
            FailureReason::ModeNotFound => Self::ModeNotFound {
                pipeline_name: "etl".into(),
                mode: "missing".into(),
            },
            FailureReason::PresetNotFound => Self::PresetNotFound {
                pipeline_name: "etl".into(),
                preset: "missing".into(),
            },
            FailureReason::InvalidSubset => Self::InvalidSubset {
                pipeline_name: "etl".into(),
                message: "no solid named 'ghost'".into(),
                unknown_solids: vec!["ghost".into()],
            },
            FailureReason::RunConfigInvalid => Self::RunConfigInvalid {
                pipeline_name: "etl".into(),
                mode: "default".into(),
                errors: Vec::new(),
            },
            FailureReason::ConfigTypeNotFound => Self::ConfigTypeNotFound {
                pipeline_name: "etl".into(),
                config_type_key: "Missing".into(),
            },
            FailureReason::InvalidOutput => Self::InvalidOutput {
                step_key: "load".into(),
                output_name: "table".into(),
                expected_type: "Table".into(),
                actual_type: Some("Rows".into()),
            },
            FailureReason::SnapshotNotFound => Self::SnapshotNotFound {
                snapshot_id: "missing".into(),
            },
            FailureReason::AssetNotFound => Self::AssetNotFound {
                asset_key: "missing".into(),
            },
            FailureReason::RunNotTerminable => Self::RunNotTerminable {
                run_id: "00000000-0000-0000-0000-000000000000".into(),
                status: RunStatus::Success,
            },
            FailureReason::InvalidRequest => Self::InvalidRequest("bad request".into()),
            FailureReason::Unexpected => Self::Unexpected("boom".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn examples_cover_every_reason() {
        for reason in FailureReason::ALL {
            assert_eq!(EngineError::example(*reason).reason(), *reason);
        }
    }

    #[test]
    fn invalid_output_message_names_both_types() {
        let err = EngineError::example(FailureReason::InvalidOutput);
        assert_eq!(
            err.to_string(),
            "Step 'load' requests output 'table' of type Table but its producer declares Rows"
        );
    }
}
