//! Step execution.

use std::time::Duration;

use async_trait::async_trait;
use flowgate_core::definition::SolidDef;
use flowgate_core::types::RunId;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Everything a step needs to run.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub run_id: RunId,
    pub pipeline_name: String,
    pub mode: String,
    pub solid: SolidDef,
    /// This step's `config` section of the resolved run config.
    pub config: Value,
    pub cancel: CancellationToken,
}

impl StepContext {
    pub fn step_key(&self) -> &str {
        &self.solid.name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepMaterialization {
    pub asset_key: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Success {
        outputs: Vec<String>,
        materializations: Vec<StepMaterialization>,
    },
    Failure {
        error: String,
    },
}

/// Executes one step of a run.
///
/// Implementations should return promptly once `ctx.cancel` fires; the run
/// worker also stops waiting on a step when the run is cancelled.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(&self, ctx: &StepContext) -> StepOutcome;
}

/// Executes a step by producing whatever its definition declares: one
/// output per declared output and one materialization per declared asset.
///
/// A step whose config contains `"fail": true` fails, which lets
/// definitions exercise failure paths without a real compute layer.
#[derive(Debug, Clone, Default)]
pub struct DefinitionStepExecutor {
    delay: Duration,
}

impl DefinitionStepExecutor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl StepExecutor for DefinitionStepExecutor {
    async fn execute(&self, ctx: &StepContext) -> StepOutcome {
        if !self.delay.is_zero() {
            tokio::select! {
                _ = ctx.cancel.cancelled() => {
                    return StepOutcome::Failure { error: "Step interrupted".into() };
                }
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        if ctx.config.get("fail").and_then(Value::as_bool) == Some(true) {
            return StepOutcome::Failure {
                error: format!("Step '{}' was configured to fail", ctx.step_key()),
            };
        }

        StepOutcome::Success {
            outputs: ctx.solid.outputs.iter().map(|o| o.name.clone()).collect(),
            materializations: ctx
                .solid
                .materializes
                .iter()
                .map(|asset_key| StepMaterialization {
                    asset_key: asset_key.clone(),
                    description: Some(format!("Materialized by {}", ctx.step_key())),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn context(config: Value) -> StepContext {
        let solid: SolidDef = serde_json::from_value(json!({
            "name": "load",
            "outputs": [{"name": "count", "dagster_type": "Int"}],
            "materializes": ["warehouse/events"]
        }))
        .unwrap();
        StepContext {
            run_id: RunId::new_v4(),
            pipeline_name: "etl".into(),
            mode: "prod".into(),
            solid,
            config,
            cancel: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn produces_declared_outputs_and_assets() {
        let outcome = DefinitionStepExecutor::default()
            .execute(&context(Value::Null))
            .await;
        assert_eq!(
            outcome,
            StepOutcome::Success {
                outputs: vec!["count".into()],
                materializations: vec![StepMaterialization {
                    asset_key: "warehouse/events".into(),
                    description: Some("Materialized by load".into()),
                }],
            }
        );
    }

    #[tokio::test]
    async fn configured_failure() {
        let outcome = DefinitionStepExecutor::default()
            .execute(&context(json!({"fail": true})))
            .await;
        assert!(matches!(outcome, StepOutcome::Failure { .. }));
    }

    #[tokio::test]
    async fn cancellation_interrupts_delay() {
        let ctx = context(Value::Null);
        ctx.cancel.cancel();
        let outcome = DefinitionStepExecutor::new(Duration::from_secs(60))
            .execute(&ctx)
            .await;
        assert_eq!(
            outcome,
            StepOutcome::Failure {
                error: "Step interrupted".into()
            }
        );
    }
}
