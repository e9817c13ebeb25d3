//! Turning a launch request into an executable plan.
//!
//! Every check here runs before a run record exists, so a rejected launch
//! leaves no trace in the instance.

use std::collections::BTreeSet;

use flowgate_core::config_type::ConfigType;
use flowgate_core::definition::{ModeDef, PipelineDef};
use flowgate_core::environment::environment_schema;
use flowgate_core::evaluation::evaluate;
use flowgate_core::selection::resolve_selection;
use serde_json::Value;

use crate::error::EngineError;

/// Type name that is compatible with every other type.
const ANY_TYPE: &str = "Any";

/// A validated launch: the pipeline restricted to the selected solids, the
/// mode, and the run config with defaults applied.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// Full definition the plan was derived from.
    pub pipeline: PipelineDef,
    /// `pipeline` restricted to `selected`; equal to it without a selection.
    pub subset: PipelineDef,
    pub mode: ModeDef,
    pub selected: BTreeSet<String>,
    pub solid_selection: Option<Vec<String>>,
    pub step_keys: Vec<String>,
    pub run_config: Value,
}

impl ExecutionPlan {
    pub fn is_subset(&self) -> bool {
        self.solid_selection.is_some()
    }

    /// The `solids.<step>.config` section of the resolved run config.
    pub fn step_config(&self, step_key: &str) -> Value {
        self.run_config
            .pointer(&format!("/solids/{step_key}/config"))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

pub fn resolve_mode(pipeline: &PipelineDef, mode: Option<&str>) -> Result<ModeDef, EngineError> {
    let name = mode.map_or_else(|| pipeline.default_mode_name(), str::to_string);
    pipeline.mode(&name).ok_or_else(|| EngineError::ModeNotFound {
        pipeline_name: pipeline.name.clone(),
        mode: name,
    })
}

pub fn resolve_subset(
    pipeline: &PipelineDef,
    solid_selection: Option<&[String]>,
) -> Result<BTreeSet<String>, EngineError> {
    resolve_selection(pipeline, solid_selection.unwrap_or_default()).map_err(|e| {
        EngineError::InvalidSubset {
            pipeline_name: pipeline.name.clone(),
            message: e.message,
            unknown_solids: e.unknown,
        }
    })
}

/// Check that every selected consumer's input matches the declared type of
/// the selected producer output it is wired to.
pub fn check_wiring(pipeline: &PipelineDef, selected: &BTreeSet<String>) -> Result<(), EngineError> {
    for consumer in pipeline.solids.iter().filter(|s| selected.contains(&s.name)) {
        for input in &consumer.inputs {
            let Some(handle) = &input.from else { continue };
            if !selected.contains(&handle.solid) {
                continue;
            }
            let actual = pipeline
                .solid(&handle.solid)
                .and_then(|producer| producer.outputs.iter().find(|o| o.name == handle.output))
                .map(|o| o.dagster_type.clone());

            let compatible = actual.as_deref().is_some_and(|actual| {
                actual == input.dagster_type || actual == ANY_TYPE || input.dagster_type == ANY_TYPE
            });
            if !compatible {
                return Err(EngineError::InvalidOutput {
                    step_key: consumer.name.clone(),
                    output_name: handle.output.clone(),
                    expected_type: input.dagster_type.clone(),
                    actual_type: actual,
                });
            }
        }
    }
    Ok(())
}

/// Root config type for a pipeline, mode and selection.
pub fn config_schema(pipeline: &PipelineDef, mode: &ModeDef, selected: &BTreeSet<String>) -> ConfigType {
    environment_schema(pipeline, mode, selected)
}

/// Evaluate `run_config`, returning it with defaults applied.
pub fn evaluate_run_config(
    pipeline: &PipelineDef,
    mode: &ModeDef,
    selected: &BTreeSet<String>,
    run_config: &Value,
) -> Result<Value, EngineError> {
    let schema = config_schema(pipeline, mode, selected);
    evaluate(&schema, run_config).map_err(|errors| EngineError::RunConfigInvalid {
        pipeline_name: pipeline.name.clone(),
        mode: mode.name.clone(),
        errors,
    })
}

/// Run every launch check in order: mode, selection, wiring, config.
pub fn build_plan(
    pipeline: &PipelineDef,
    mode: Option<&str>,
    solid_selection: Option<Vec<String>>,
    run_config: &Value,
) -> Result<ExecutionPlan, EngineError> {
    let mode = resolve_mode(pipeline, mode)?;
    let selected = resolve_subset(pipeline, solid_selection.as_deref())?;
    check_wiring(pipeline, &selected)?;
    let run_config = evaluate_run_config(pipeline, &mode, &selected, run_config)?;

    let subset = if solid_selection.is_some() {
        pipeline.subset(&selected)
    } else {
        pipeline.clone()
    };
    let step_keys = subset
        .topological_order()
        .map_err(|e| EngineError::Unexpected(e.to_string()))?;

    Ok(ExecutionPlan {
        pipeline: pipeline.clone(),
        subset,
        mode,
        selected,
        solid_selection,
        step_keys,
        run_config,
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::instance::fixtures::etl_repository;

    fn etl() -> PipelineDef {
        etl_repository().pipelines[0].clone()
    }

    fn valid_config() -> Value {
        json!({"solids": {"extract": {"config": {"source": "s3://bucket"}}}})
    }

    #[test]
    fn plan_orders_steps_and_applies_defaults() {
        let plan = build_plan(&etl(), None, None, &valid_config()).unwrap();
        assert_eq!(plan.mode.name, "prod");
        assert_eq!(plan.step_keys, vec!["extract", "transform", "load", "audit"]);
        assert_eq!(plan.step_config("extract")["source"], "s3://bucket");
        assert!(!plan.is_subset());
    }

    #[test]
    fn unknown_mode_is_named() {
        let err = build_plan(&etl(), Some("staging"), None, &valid_config()).unwrap_err();
        assert_matches!(err, EngineError::ModeNotFound { mode, .. } if mode == "staging");
    }

    #[test]
    fn unknown_solid_in_selection() {
        let err = build_plan(&etl(), None, Some(vec!["ghost".into()]), &valid_config()).unwrap_err();
        assert_matches!(err, EngineError::InvalidSubset { unknown_solids, .. } if unknown_solids == vec!["ghost"]);
    }

    #[test]
    fn subset_drops_unselected_config_requirements() {
        let plan = build_plan(&etl(), None, Some(vec!["load".into()]), &Value::Null).unwrap();
        assert!(plan.is_subset());
        assert_eq!(plan.step_keys, vec!["load"]);
    }

    #[test]
    fn missing_required_config_is_rejected() {
        let err = build_plan(&etl(), None, None, &Value::Null).unwrap_err();
        assert_matches!(err, EngineError::RunConfigInvalid { errors, .. } if !errors.is_empty());
    }

    #[test]
    fn mismatched_wiring_reports_both_types() {
        let mut pipeline = etl();
        let load = pipeline.solids.iter_mut().find(|s| s.name == "load").unwrap();
        load.inputs[0].dagster_type = "Parquet".into();

        let err = build_plan(&pipeline, None, None, &valid_config()).unwrap_err();
        assert_matches!(
            err,
            EngineError::InvalidOutput { step_key, expected_type, actual_type, .. }
                if step_key == "load" && expected_type == "Parquet" && actual_type.as_deref() == Some("Table")
        );
    }

    #[test]
    fn wiring_to_undeclared_output_has_no_actual_type() {
        let mut pipeline = etl();
        let load = pipeline.solids.iter_mut().find(|s| s.name == "load").unwrap();
        load.inputs[0].from.as_mut().unwrap().output = "missing".into();

        let err = check_wiring(&pipeline, &pipeline.solids.iter().map(|s| s.name.clone()).collect())
            .unwrap_err();
        assert_matches!(err, EngineError::InvalidOutput { actual_type: None, .. });
    }
}
