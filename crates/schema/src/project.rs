//! Projections of core domain values onto exposed types.
//!
//! Projections are built fresh per request and never mutated afterwards.

use flowgate_core::config_type::ConfigType as CoreConfigType;
use flowgate_core::definition::{ModeDef, PipelineDef, PresetDef, SolidDef};
use flowgate_core::evaluation::{ErrorData, EvaluationError, StackEntry};
use flowgate_core::event::{EventKind, EventType, LogEvent};
use flowgate_core::run::{RunRecord, RunStats};
use flowgate_core::types::{RunId, Tags, Timestamp};

use crate::entities::*;
use crate::errors::*;
use crate::unions::{EvaluationStackEntry, PipelineConfigValidationError, PipelineReference, PipelineRunEvent};

pub fn tags(tags: &Tags) -> Vec<PipelineTag> {
    tags.iter()
        .map(|(key, value)| PipelineTag {
            key: key.clone(),
            value: value.clone(),
        })
        .collect()
}

fn config_key(config: Option<&CoreConfigType>) -> Option<String> {
    config.map(CoreConfigType::key)
}

impl From<&SolidDef> for Solid {
    fn from(solid: &SolidDef) -> Self {
        Self {
            name: solid.name.clone(),
            description: solid.description.clone(),
            config_type_key: config_key(solid.config.as_ref()),
            inputs: solid
                .inputs
                .iter()
                .map(|input| Input {
                    name: input.name.clone(),
                    dagster_type: input.dagster_type.clone(),
                    from_solid: input.from.as_ref().map(|h| h.solid.clone()),
                    from_output: input.from.as_ref().map(|h| h.output.clone()),
                })
                .collect(),
            outputs: solid
                .outputs
                .iter()
                .map(|output| Output {
                    name: output.name.clone(),
                    dagster_type: output.dagster_type.clone(),
                })
                .collect(),
            materializes: solid.materializes.clone(),
        }
    }
}

impl From<&ModeDef> for Mode {
    fn from(mode: &ModeDef) -> Self {
        Self {
            name: mode.name.clone(),
            description: mode.description.clone(),
            resources: mode
                .resources
                .iter()
                .map(|r| Resource {
                    name: r.name.clone(),
                    description: r.description.clone(),
                    config_type_key: config_key(r.config.as_ref()),
                })
                .collect(),
            loggers: mode
                .loggers
                .iter()
                .map(|l| Logger {
                    name: l.name.clone(),
                    description: l.description.clone(),
                    config_type_key: config_key(l.config.as_ref()),
                })
                .collect(),
        }
    }
}

impl From<&PresetDef> for PipelinePreset {
    fn from(preset: &PresetDef) -> Self {
        Self {
            name: preset.name.clone(),
            mode: preset.mode.clone(),
            run_config: preset.run_config.clone(),
            solid_selection: preset.solid_selection.clone(),
            tags: tags(&preset.tags),
        }
    }
}

impl Pipeline {
    pub fn project(
        pipeline: &PipelineDef,
        location_name: &str,
        pipeline_snapshot_id: String,
        parent_snapshot_id: Option<String>,
        solid_selection: Option<Vec<String>>,
    ) -> Self {
        Self {
            name: pipeline.name.clone(),
            description: pipeline.description.clone(),
            location_name: location_name.to_string(),
            pipeline_snapshot_id,
            parent_snapshot_id,
            solid_selection,
            solids: pipeline.solids.iter().map(Solid::from).collect(),
            modes: pipeline.effective_modes().iter().map(Mode::from).collect(),
            presets: pipeline.presets.iter().map(PipelinePreset::from).collect(),
            tags: tags(&pipeline.tags),
        }
    }
}

impl PipelineSnapshot {
    pub fn project(
        pipeline: &PipelineDef,
        location_name: &str,
        pipeline_snapshot_id: String,
        parent_snapshot_id: Option<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            pipeline_snapshot_id,
            parent_snapshot_id,
            name: pipeline.name.clone(),
            description: pipeline.description.clone(),
            location_name: location_name.to_string(),
            solids: pipeline.solids.iter().map(Solid::from).collect(),
            modes: pipeline.effective_modes().iter().map(Mode::from).collect(),
            presets: pipeline.presets.iter().map(PipelinePreset::from).collect(),
            tags: tags(&pipeline.tags),
            created_at,
        }
    }
}

impl PipelineRun {
    pub fn project(record: &RunRecord, pipeline: PipelineReference) -> Self {
        Self {
            run_id: record.run_id,
            status: record.status,
            can_terminate: record.status.can_terminate(),
            pipeline,
            pipeline_name: record.pipeline_name.clone(),
            location_name: record.location_name.clone(),
            pipeline_snapshot_id: record.pipeline_snapshot_id.clone(),
            mode: record.mode.clone(),
            run_config: record.run_config.clone(),
            solid_selection: record.solid_selection.clone(),
            step_keys: record.step_keys.clone(),
            tags: tags(&record.tags),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl PipelineRunStatsSnapshot {
    pub fn project(run_id: RunId, stats: &RunStats) -> Self {
        Self {
            run_id,
            steps_succeeded: stats.steps_succeeded,
            steps_failed: stats.steps_failed,
            materializations: stats.materializations,
            enqueued_time: stats.enqueued_time,
            launch_time: stats.launch_time,
            start_time: stats.start_time,
            end_time: stats.end_time,
        }
    }
}

impl From<&LogEvent> for PipelineRunEvent {
    fn from(event: &LogEvent) -> Self {
        let run_id = event.run_id;
        let sequence = event.sequence;
        let timestamp = event.timestamp;
        let level = event.level;
        let step_key = event.step_key.clone();
        let message = event.message.clone();
        let event_type = event.event_type();

        match &event.kind {
            EventKind::StepOutput { output_name } => ExecutionStepOutputEvent {
                run_id,
                sequence,
                timestamp,
                level,
                step_key,
                message,
                event_type,
                output_name: output_name.clone(),
            }
            .into(),
            EventKind::StepFailure { error } => ExecutionStepFailureEvent {
                run_id,
                sequence,
                timestamp,
                level,
                step_key,
                message,
                event_type,
                error: error.clone(),
            }
            .into(),
            EventKind::AssetMaterialization {
                asset_key,
                description,
            } => StepMaterializationEvent {
                run_id,
                sequence,
                timestamp,
                level,
                step_key: step_key.clone(),
                message,
                event_type,
                materialization: AssetMaterialization {
                    asset_key: asset_key.clone(),
                    run_id,
                    step_key,
                    description: description.clone(),
                    timestamp,
                },
            }
            .into(),
            _ => LogMessageEvent {
                run_id,
                sequence,
                timestamp,
                level,
                step_key,
                message,
                event_type,
            }
            .into(),
        }
    }
}

impl PipelineRunEvent {
    pub fn sequence(&self) -> u64 {
        match self {
            Self::LogMessageEvent(e) => e.sequence,
            Self::ExecutionStepOutputEvent(e) => e.sequence,
            Self::ExecutionStepFailureEvent(e) => e.sequence,
            Self::StepMaterializationEvent(e) => e.sequence,
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            Self::LogMessageEvent(e) => e.event_type,
            Self::ExecutionStepOutputEvent(e) => e.event_type,
            Self::ExecutionStepFailureEvent(e) => e.event_type,
            Self::StepMaterializationEvent(e) => e.event_type,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::LogMessageEvent(e) => &e.message,
            Self::ExecutionStepOutputEvent(e) => &e.message,
            Self::ExecutionStepFailureEvent(e) => &e.message,
            Self::StepMaterializationEvent(e) => &e.message,
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

impl From<&CoreConfigType> for ConfigType {
    fn from(config_type: &CoreConfigType) -> Self {
        let (fields, enum_values) = match config_type {
            CoreConfigType::Shape { fields, .. } | CoreConfigType::Selector { fields, .. } => (
                fields
                    .iter()
                    .map(|(name, field)| ConfigTypeField {
                        name: name.clone(),
                        config_type_key: field.config_type.key(),
                        is_required: field.is_required(),
                        default_value_as_json: field.default_value.as_ref().map(|v| v.to_string()),
                        description: field.description.clone(),
                    })
                    .collect(),
                Vec::new(),
            ),
            CoreConfigType::Enum { values, .. } => (Vec::new(), values.clone()),
            _ => (Vec::new(), Vec::new()),
        };

        Self {
            key: config_type.key(),
            kind: config_type.kind_name().to_string(),
            description: config_type.describe(),
            is_selector: matches!(config_type, CoreConfigType::Selector { .. }),
            fields,
            enum_values,
            inner_type_keys: config_type.inner_types().into_iter().map(CoreConfigType::key).collect(),
        }
    }
}

fn stack(entries: &[StackEntry]) -> EvaluationStack {
    EvaluationStack {
        entries: entries
            .iter()
            .map(|entry| -> EvaluationStackEntry {
                match entry {
                    StackEntry::Field(field_name) => EvaluationStackPathEntry {
                        field_name: field_name.clone(),
                    }
                    .into(),
                    StackEntry::ListItem(list_index) => EvaluationStackListItemEntry {
                        list_index: *list_index,
                    }
                    .into(),
                }
            })
            .collect(),
    }
}

impl From<&EvaluationError> for PipelineConfigValidationError {
    fn from(error: &EvaluationError) -> Self {
        let message = error.message.clone();
        let path = error.path();
        let stack = stack(&error.stack);
        let reason = error.reason();

        match &error.data {
            ErrorData::FieldNotDefined { field_name } => FieldNotDefinedConfigError {
                message,
                path,
                stack,
                reason,
                field_name: field_name.clone(),
            }
            .into(),
            ErrorData::FieldsNotDefined { field_names } => FieldsNotDefinedConfigError {
                message,
                path,
                stack,
                reason,
                field_names: field_names.clone(),
            }
            .into(),
            ErrorData::MissingField { field_name } => MissingFieldConfigError {
                message,
                path,
                stack,
                reason,
                field_name: field_name.clone(),
            }
            .into(),
            ErrorData::MissingFields { field_names } => MissingFieldsConfigError {
                message,
                path,
                stack,
                reason,
                field_names: field_names.clone(),
            }
            .into(),
            ErrorData::RuntimeMismatch { value_rep } => RuntimeMismatchConfigError {
                message,
                path,
                stack,
                reason,
                value_rep: value_rep.clone(),
            }
            .into(),
            ErrorData::SelectorType { incoming_fields } => SelectorTypeConfigError {
                message,
                path,
                stack,
                reason,
                incoming_fields: incoming_fields.clone(),
            }
            .into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use flowgate_core::evaluation::{evaluate, EvaluationErrorReason};
    use serde_json::json;

    use super::*;

    fn schema() -> CoreConfigType {
        serde_json::from_value(json!({
            "kind": "Shape",
            "key": "Conn",
            "fields": {
                "dsn": {"type": {"kind": "String"}},
                "hosts": {"type": {"kind": "Array", "of": {"kind": "String"}}, "is_required": false}
            }
        }))
        .unwrap()
    }

    #[test]
    fn evaluation_errors_keep_their_diagnosis() {
        let errors = evaluate(&schema(), &json!({"dsn": "x", "hosts": ["a", 7]})).unwrap_err();
        let projected = PipelineConfigValidationError::from(&errors[0]);
        match projected {
            PipelineConfigValidationError::RuntimeMismatchConfigError(e) => {
                assert_eq!(e.reason, EvaluationErrorReason::RuntimeTypeMismatch);
                assert_eq!(e.value_rep, "7");
                assert_eq!(e.path, vec!["root", "hosts", "1"]);
                assert_eq!(e.stack.entries.len(), 2);
            }
            other => panic!("unexpected variant {}", other.typename()),
        }
    }

    #[test]
    fn missing_field_is_projected() {
        let errors = evaluate(&schema(), &json!({})).unwrap_err();
        let projected = PipelineConfigValidationError::from(&errors[0]);
        assert_eq!(projected.typename(), "MissingFieldConfigError");
    }

    #[test]
    fn config_type_lists_fields_by_key() {
        let projected = ConfigType::from(&schema());
        assert_eq!(projected.key, "Conn");
        assert_eq!(projected.kind, "Shape");
        let names: Vec<&str> = projected.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["dsn", "hosts"]);
        assert!(projected.fields[0].is_required);
        assert_eq!(projected.fields[1].config_type_key, "Array.String");
    }

    #[test]
    fn events_project_to_their_specific_variant() {
        let run_id = RunId::new_v4();
        let mut event = LogEvent::new(
            run_id,
            EventKind::AssetMaterialization {
                asset_key: "warehouse/events".into(),
                description: None,
            },
            "Materialized",
        )
        .with_step("load");
        event.sequence = 7;

        let projected = PipelineRunEvent::from(&event);
        assert_eq!(projected.typename(), "StepMaterializationEvent");
        assert_eq!(projected.sequence(), 7);

        let started = PipelineRunEvent::from(&LogEvent::new(run_id, EventKind::RunStart, "Started"));
        assert_eq!(started.typename(), "LogMessageEvent");
        assert_eq!(started.message(), "Started");
    }
}
