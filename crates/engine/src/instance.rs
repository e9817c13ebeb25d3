//! The engine instance: runs, snapshots, assets and the workspace.
//!
//! Status changes and the event that announces them are applied under the
//! run table's write lock, so a run's event log never contradicts its
//! status history. Lock order is always runs, then events.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use flowgate_core::config_type::ConfigType;
use flowgate_core::definition::PipelineDef;
use flowgate_core::event::{EventKind, LogEvent};
use flowgate_core::log_filter::LogFilter;
use flowgate_core::run::{RunRecord, RunStats, RunsFilter};
use flowgate_core::status::RunStatus;
use flowgate_core::types::{RunId, Tags, Timestamp};
use flowgate_events::{EventStore, RunEventSubscription};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::executor::{DefinitionStepExecutor, StepContext, StepExecutor, StepOutcome};
use crate::location::LocationSource;
use crate::plan::{self, ExecutionPlan};
use crate::workspace::{LocationInfo, ReloadOutcome, Workspace};

/// Identifies a pipeline, optionally within one location and restricted
/// to a solid selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineSelector {
    pub pipeline_name: String,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub solid_selection: Option<Vec<String>>,
}

impl PipelineSelector {
    pub fn new(pipeline_name: impl Into<String>) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            ..Self::default()
        }
    }

    pub fn with_selection(mut self, clauses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.solid_selection = Some(clauses.into_iter().map(Into::into).collect());
        self
    }
}

/// Parameters of a run launch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaunchRequest {
    pub selector: PipelineSelector,
    #[serde(default)]
    pub mode: Option<String>,
    /// Named preset supplying mode, config and selection. Mutually
    /// exclusive with explicit values for those.
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub run_config: Option<Value>,
    #[serde(default)]
    pub tags: Tags,
}

/// A pipeline as currently served by the workspace.
#[derive(Debug, Clone)]
pub struct PipelineView {
    pub location_name: String,
    pub pipeline: PipelineDef,
    pub snapshot_id: String,
    pub parent_snapshot_id: Option<String>,
}

/// An immutable, content-addressed copy of a pipeline definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub snapshot_id: String,
    pub parent_snapshot_id: Option<String>,
    pub location_name: String,
    pub pipeline: PipelineDef,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializationRecord {
    pub run_id: RunId,
    pub step_key: Option<String>,
    pub description: Option<String>,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub asset_key: String,
    /// Oldest first.
    pub materializations: Vec<MaterializationRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct InstanceSettings {
    /// Simulated latency of every step.
    pub step_delay: Duration,
}

struct RunEntry {
    record: RunRecord,
    cancel: CancellationToken,
}

#[derive(Default)]
struct RunTable {
    by_id: HashMap<RunId, RunEntry>,
    /// Launch order.
    order: Vec<RunId>,
}

pub struct Instance {
    workspace: Workspace,
    runs: RwLock<RunTable>,
    snapshots: RwLock<HashMap<String, SnapshotRecord>>,
    events: Arc<EventStore>,
    executor: Arc<dyn StepExecutor>,
}

fn parse_run_id(run_id: &str) -> Result<RunId, EngineError> {
    run_id.parse().map_err(|_| EngineError::RunNotFound {
        run_id: run_id.to_string(),
    })
}

impl Instance {
    pub fn new(settings: InstanceSettings) -> Self {
        Self::with_executor(Arc::new(DefinitionStepExecutor::new(settings.step_delay)))
    }

    pub fn with_executor(executor: Arc<dyn StepExecutor>) -> Self {
        Self {
            workspace: Workspace::new(),
            runs: RwLock::new(RunTable::default()),
            snapshots: RwLock::new(HashMap::new()),
            events: Arc::new(EventStore::new()),
            executor,
        }
    }

    // ---------------------------------------------------------------------
    // Locations
    // ---------------------------------------------------------------------

    pub async fn add_location(&self, source: Arc<dyn LocationSource>) -> LocationInfo {
        self.workspace.add_location(source).await
    }

    pub async fn locations(&self) -> Vec<LocationInfo> {
        self.workspace.locations().await
    }

    pub async fn reload_location(
        &self,
        name: &str,
    ) -> Result<(ReloadOutcome, LocationInfo), EngineError> {
        self.workspace.reload(name).await
    }

    // ---------------------------------------------------------------------
    // Pipelines and snapshots
    // ---------------------------------------------------------------------

    /// The selected pipeline, restricted to its solid selection if any.
    pub async fn pipeline(&self, selector: &PipelineSelector) -> Result<PipelineView, EngineError> {
        let located = self
            .workspace
            .find_pipeline(&selector.pipeline_name, selector.location_name.as_deref())
            .await?;
        let full_id = located.pipeline.snapshot_id();

        match &selector.solid_selection {
            None => Ok(PipelineView {
                location_name: located.location_name,
                pipeline: located.pipeline,
                snapshot_id: full_id,
                parent_snapshot_id: None,
            }),
            Some(clauses) => {
                let selected = plan::resolve_subset(&located.pipeline, Some(clauses.as_slice()))?;
                let subset = located.pipeline.subset(&selected);
                Ok(PipelineView {
                    location_name: located.location_name,
                    snapshot_id: subset.snapshot_id(),
                    pipeline: subset,
                    parent_snapshot_id: Some(full_id),
                })
            }
        }
    }

    /// Snapshot of the selected pipeline as of now. The snapshot stays
    /// retrievable by id after the definition changes.
    pub async fn pipeline_snapshot(
        &self,
        selector: &PipelineSelector,
    ) -> Result<SnapshotRecord, EngineError> {
        let view = self.pipeline(selector).await?;
        if view.parent_snapshot_id.is_some() {
            let full = self
                .workspace
                .find_pipeline(&selector.pipeline_name, Some(&view.location_name))
                .await?;
            self.store_snapshot(&view.location_name, full.pipeline, None)
                .await;
        }
        Ok(self
            .store_snapshot(&view.location_name, view.pipeline, view.parent_snapshot_id)
            .await)
    }

    pub async fn snapshot_by_id(&self, snapshot_id: &str) -> Result<SnapshotRecord, EngineError> {
        self.snapshots
            .read()
            .await
            .get(snapshot_id)
            .cloned()
            .ok_or_else(|| EngineError::SnapshotNotFound {
                snapshot_id: snapshot_id.to_string(),
            })
    }

    async fn store_snapshot(
        &self,
        location_name: &str,
        pipeline: PipelineDef,
        parent_snapshot_id: Option<String>,
    ) -> SnapshotRecord {
        let snapshot_id = pipeline.snapshot_id();
        self.snapshots
            .write()
            .await
            .entry(snapshot_id.clone())
            .or_insert_with(|| SnapshotRecord {
                snapshot_id,
                parent_snapshot_id,
                location_name: location_name.to_string(),
                pipeline,
                created_at: chrono::Utc::now(),
            })
            .clone()
    }

    // ---------------------------------------------------------------------
    // Config
    // ---------------------------------------------------------------------

    /// Root run config type for the selected pipeline in `mode`.
    pub async fn environment_schema(
        &self,
        selector: &PipelineSelector,
        mode: Option<&str>,
    ) -> Result<ConfigType, EngineError> {
        let located = self
            .workspace
            .find_pipeline(&selector.pipeline_name, selector.location_name.as_deref())
            .await?;
        let mode = plan::resolve_mode(&located.pipeline, mode)?;
        let selected = plan::resolve_subset(&located.pipeline, selector.solid_selection.as_deref())?;
        Ok(plan::config_schema(&located.pipeline, &mode, &selected))
    }

    /// Run every launch check without launching. The returned plan carries
    /// the resolved mode and the config with defaults applied.
    pub async fn validate_run_config(
        &self,
        selector: &PipelineSelector,
        mode: Option<&str>,
        run_config: &Value,
    ) -> Result<ExecutionPlan, EngineError> {
        let located = self
            .workspace
            .find_pipeline(&selector.pipeline_name, selector.location_name.as_deref())
            .await?;
        plan::build_plan(
            &located.pipeline,
            mode,
            selector.solid_selection.clone(),
            run_config,
        )
    }

    /// A config type reachable from the pipeline's run config schema.
    pub async fn config_type(
        &self,
        selector: &PipelineSelector,
        mode: Option<&str>,
        config_type_key: &str,
    ) -> Result<ConfigType, EngineError> {
        let schema = self.environment_schema(selector, mode).await?;
        schema
            .find_by_key(config_type_key)
            .cloned()
            .ok_or_else(|| EngineError::ConfigTypeNotFound {
                pipeline_name: selector.pipeline_name.clone(),
                config_type_key: config_type_key.to_string(),
            })
    }

    // ---------------------------------------------------------------------
    // Runs
    // ---------------------------------------------------------------------

    /// Validate and enqueue a run. Returns as soon as the run is queued;
    /// execution continues in the background.
    pub async fn launch_run(self: &Arc<Self>, request: LaunchRequest) -> Result<RunRecord, EngineError> {
        let located = self
            .workspace
            .find_pipeline(
                &request.selector.pipeline_name,
                request.selector.location_name.as_deref(),
            )
            .await?;
        let pipeline = &located.pipeline;

        let mut tags = pipeline.tags.clone();
        let (mode, run_config, solid_selection) = match &request.preset {
            Some(preset_name) => {
                if request.mode.is_some()
                    || request.run_config.is_some()
                    || request.selector.solid_selection.is_some()
                {
                    return Err(EngineError::InvalidRequest(format!(
                        "Preset '{preset_name}' cannot be combined with an explicit mode, run config or solid selection"
                    )));
                }
                let preset = pipeline
                    .preset(preset_name)
                    .ok_or_else(|| EngineError::PresetNotFound {
                        pipeline_name: pipeline.name.clone(),
                        preset: preset_name.clone(),
                    })?;
                tags.extend(preset.tags.clone());
                (
                    Some(preset.mode.clone()),
                    preset.run_config.clone(),
                    preset.solid_selection.clone(),
                )
            }
            None => (
                request.mode.clone(),
                request.run_config.clone().unwrap_or(Value::Null),
                request.selector.solid_selection.clone(),
            ),
        };
        tags.extend(request.tags.clone());

        let plan = plan::build_plan(pipeline, mode.as_deref(), solid_selection, &run_config)?;

        let full = self
            .store_snapshot(&located.location_name, plan.pipeline.clone(), None)
            .await;
        let snapshot = if plan.is_subset() {
            self.store_snapshot(
                &located.location_name,
                plan.subset.clone(),
                Some(full.snapshot_id),
            )
            .await
        } else {
            full
        };

        let now = chrono::Utc::now();
        let record = RunRecord {
            run_id: RunId::new_v4(),
            pipeline_name: pipeline.name.clone(),
            location_name: located.location_name.clone(),
            pipeline_snapshot_id: snapshot.snapshot_id,
            mode: plan.mode.name.clone(),
            run_config: plan.run_config.clone(),
            solid_selection: plan.solid_selection.clone(),
            step_keys: plan.step_keys.clone(),
            tags,
            status: RunStatus::Queued,
            created_at: now,
            updated_at: now,
        };
        let cancel = CancellationToken::new();

        {
            let mut runs = self.runs.write().await;
            runs.by_id.insert(
                record.run_id,
                RunEntry {
                    record: record.clone(),
                    cancel: cancel.clone(),
                },
            );
            runs.order.push(record.run_id);
            self.events
                .append(LogEvent::new(
                    record.run_id,
                    EventKind::RunEnqueued,
                    format!("Run for pipeline \"{}\" enqueued", record.pipeline_name),
                ))
                .await;
        }

        tracing::info!(
            run_id = %record.run_id,
            pipeline = %record.pipeline_name,
            mode = %record.mode,
            steps = record.step_keys.len(),
            "Run launched",
        );

        let instance = Arc::clone(self);
        let run_id = record.run_id;
        tokio::spawn(async move {
            instance.execute_run(run_id, plan, cancel).await;
        });

        Ok(record)
    }

    /// Request cancellation of a run that has not finished.
    pub async fn terminate_run(&self, run_id: &str) -> Result<RunRecord, EngineError> {
        let id = parse_run_id(run_id)?;
        let mut runs = self.runs.write().await;
        let entry = runs.by_id.get_mut(&id).ok_or_else(|| EngineError::RunNotFound {
            run_id: run_id.to_string(),
        })?;

        if !entry.record.status.can_terminate() {
            return Err(EngineError::RunNotTerminable {
                run_id: run_id.to_string(),
                status: entry.record.status,
            });
        }

        entry.record.status = RunStatus::Canceling;
        entry.record.updated_at = chrono::Utc::now();
        entry.cancel.cancel();
        let record = entry.record.clone();
        self.events
            .append(LogEvent::new(id, EventKind::RunCanceling, "Sending run termination request"))
            .await;

        tracing::info!(run_id = %id, "Run termination requested");
        Ok(record)
    }

    pub async fn run(&self, run_id: &str) -> Result<RunRecord, EngineError> {
        let id = parse_run_id(run_id)?;
        self.runs
            .read()
            .await
            .by_id
            .get(&id)
            .map(|entry| entry.record.clone())
            .ok_or_else(|| EngineError::RunNotFound {
                run_id: run_id.to_string(),
            })
    }

    /// Runs matching `filter`, newest first.
    pub async fn runs(&self, filter: &RunsFilter) -> Vec<RunRecord> {
        let runs = self.runs.read().await;
        let matching = runs
            .order
            .iter()
            .rev()
            .filter_map(|id| runs.by_id.get(id))
            .map(|entry| &entry.record)
            .filter(|record| filter.matches(record))
            .cloned();
        match filter.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }

    pub async fn run_stats(&self, run_id: &str) -> Result<RunStats, EngineError> {
        let record = self.run(run_id).await?;
        let events = self.events.events(record.run_id, None).await;
        Ok(RunStats::from_events(&events))
    }

    /// Events of a run after sequence `after`, restricted by `filter`.
    pub async fn run_events(
        &self,
        run_id: &str,
        after: Option<u64>,
        filter: &LogFilter,
    ) -> Result<Vec<LogEvent>, EngineError> {
        let record = self.run(run_id).await?;
        Ok(self
            .events
            .events(record.run_id, after)
            .await
            .into_iter()
            .filter(|event| filter.matches(event))
            .collect())
    }

    pub async fn subscribe_run_events(&self, run_id: &str) -> Result<RunEventSubscription, EngineError> {
        let record = self.run(run_id).await?;
        Ok(self.events.subscribe(record.run_id).await)
    }

    // ---------------------------------------------------------------------
    // Assets
    // ---------------------------------------------------------------------

    /// Materialization history of an asset. An asset that some pipeline
    /// declares but no run has materialized yet has an empty history.
    pub async fn asset(&self, asset_key: &str) -> Result<AssetRecord, EngineError> {
        let mut materializations: Vec<MaterializationRecord> = self
            .events
            .all_events()
            .await
            .into_iter()
            .filter_map(|event| match event.kind {
                EventKind::AssetMaterialization {
                    asset_key: key,
                    description,
                } if key == asset_key => Some(MaterializationRecord {
                    run_id: event.run_id,
                    step_key: event.step_key,
                    description,
                    timestamp: event.timestamp,
                }),
                _ => None,
            })
            .collect();
        materializations.sort_by_key(|m| m.timestamp);

        if materializations.is_empty() {
            let declared = self.workspace.all_pipelines().await.iter().any(|located| {
                located
                    .pipeline
                    .solids
                    .iter()
                    .any(|s| s.materializes.iter().any(|key| key == asset_key))
            });
            if !declared {
                return Err(EngineError::AssetNotFound {
                    asset_key: asset_key.to_string(),
                });
            }
        }

        Ok(AssetRecord {
            asset_key: asset_key.to_string(),
            materializations,
        })
    }

    // ---------------------------------------------------------------------
    // Execution
    // ---------------------------------------------------------------------

    /// Move a run to `next` and append `event`, unless the run is already
    /// terminal or being canceled. Returns whether the transition happened.
    async fn transition(&self, run_id: RunId, next: RunStatus, event: LogEvent) -> bool {
        let mut runs = self.runs.write().await;
        let Some(entry) = runs.by_id.get_mut(&run_id) else {
            return false;
        };
        let current = entry.record.status;
        if current.is_terminal() || current == RunStatus::Canceling {
            return false;
        }
        entry.record.status = next;
        entry.record.updated_at = chrono::Utc::now();
        self.events.append(event).await;
        true
    }

    /// Record the run's end. A run that was asked to cancel ends canceled
    /// whatever its steps did.
    async fn finish_run(&self, run_id: RunId, pipeline_name: &str, outcome: RunStatus) {
        let mut runs = self.runs.write().await;
        let Some(entry) = runs.by_id.get_mut(&run_id) else {
            return;
        };
        if entry.record.status.is_terminal() {
            return;
        }

        let status = if entry.record.status == RunStatus::Canceling || entry.cancel.is_cancelled() {
            RunStatus::Canceled
        } else {
            outcome
        };
        let (kind, message) = match status {
            RunStatus::Success => (
                EventKind::RunSuccess,
                format!("Finished execution of run for \"{pipeline_name}\"."),
            ),
            RunStatus::Canceled => (
                EventKind::RunCanceled,
                format!("Execution of run for \"{pipeline_name}\" canceled."),
            ),
            _ => (
                EventKind::RunFailure,
                format!("Execution of run for \"{pipeline_name}\" failed."),
            ),
        };

        entry.record.status = status;
        entry.record.updated_at = chrono::Utc::now();
        self.events.append(LogEvent::new(run_id, kind, message)).await;

        tracing::info!(run_id = %run_id, status = %status, "Run finished");
    }

    async fn execute_run(self: Arc<Self>, run_id: RunId, plan: ExecutionPlan, cancel: CancellationToken) {
        let pipeline_name = plan.pipeline.name.clone();

        self.transition(
            run_id,
            RunStatus::Starting,
            LogEvent::new(run_id, EventKind::RunStarting, "Launching run"),
        )
        .await;
        self.transition(
            run_id,
            RunStatus::Started,
            LogEvent::new(
                run_id,
                EventKind::RunStart,
                format!("Started execution of run for \"{pipeline_name}\"."),
            ),
        )
        .await;

        let mut outcome = RunStatus::Success;
        for step_key in &plan.step_keys {
            if cancel.is_cancelled() {
                break;
            }
            let Some(solid) = plan.subset.solid(step_key).cloned() else {
                continue;
            };
            let ctx = StepContext {
                run_id,
                pipeline_name: pipeline_name.clone(),
                mode: plan.mode.name.clone(),
                config: plan.step_config(step_key),
                solid,
                cancel: cancel.clone(),
            };

            self.events
                .append(
                    LogEvent::new(
                        run_id,
                        EventKind::StepStart,
                        format!("Started execution of step \"{step_key}\"."),
                    )
                    .with_step(step_key),
                )
                .await;
            tracing::debug!(run_id = %run_id, step = %step_key, "Step started");

            let step = tokio::select! {
                _ = cancel.cancelled() => break,
                step = self.executor.execute(&ctx) => step,
            };

            match step {
                StepOutcome::Success {
                    outputs,
                    materializations,
                } => {
                    for output_name in outputs {
                        self.events
                            .append(
                                LogEvent::new(
                                    run_id,
                                    EventKind::StepOutput {
                                        output_name: output_name.clone(),
                                    },
                                    format!("Yielded output \"{output_name}\"."),
                                )
                                .with_step(step_key),
                            )
                            .await;
                    }
                    for m in materializations {
                        self.events
                            .append(
                                LogEvent::new(
                                    run_id,
                                    EventKind::AssetMaterialization {
                                        asset_key: m.asset_key.clone(),
                                        description: m.description,
                                    },
                                    format!("Materialized value {}.", m.asset_key),
                                )
                                .with_step(step_key),
                            )
                            .await;
                    }
                    self.events
                        .append(
                            LogEvent::new(
                                run_id,
                                EventKind::StepSuccess,
                                format!("Finished execution of step \"{step_key}\"."),
                            )
                            .with_step(step_key),
                        )
                        .await;
                    tracing::debug!(run_id = %run_id, step = %step_key, "Step succeeded");
                }
                StepOutcome::Failure { error } => {
                    if cancel.is_cancelled() {
                        break;
                    }
                    self.events
                        .append(
                            LogEvent::new(
                                run_id,
                                EventKind::StepFailure {
                                    error: error.clone(),
                                },
                                format!("Execution of step \"{step_key}\" failed."),
                            )
                            .with_step(step_key),
                        )
                        .await;
                    tracing::warn!(run_id = %run_id, step = %step_key, %error, "Step failed");
                    outcome = RunStatus::Failure;
                    break;
                }
            }
        }

        self.finish_run(run_id, &pipeline_name, outcome).await;
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use flowgate_core::definition::RepositoryDef;

    use super::*;
    use crate::location::StaticLocationSource;

    /// One `etl` pipeline: extract -> transform -> load, plus `audit`.
    /// `extract` requires a `source`; `load` materializes `warehouse/events`.
    pub fn etl_repository() -> RepositoryDef {
        serde_json::from_value(serde_json::json!({
            "name": "analytics",
            "pipelines": [{
                "name": "etl",
                "description": "Nightly event ETL",
                "tags": {"team": "data"},
                "solids": [
                    {
                        "name": "extract",
                        "config": {"kind": "Shape", "key": "ExtractConfig", "fields": {
                            "source": {"type": {"kind": "String"}},
                            "batch_size": {"type": {"kind": "Int"}, "default_value": 500},
                            "fail": {"type": {"kind": "Bool"}, "is_required": false}
                        }},
                        "outputs": [{"name": "rows", "dagster_type": "Rows"}]
                    },
                    {
                        "name": "transform",
                        "inputs": [{"name": "rows", "dagster_type": "Rows",
                                    "from": {"solid": "extract", "output": "rows"}}],
                        "outputs": [{"name": "table", "dagster_type": "Table"}]
                    },
                    {
                        "name": "load",
                        "inputs": [{"name": "table", "dagster_type": "Table",
                                    "from": {"solid": "transform", "output": "table"}}],
                        "materializes": ["warehouse/events"]
                    },
                    {"name": "audit"}
                ],
                "modes": [
                    {"name": "prod", "resources": [{
                        "name": "warehouse",
                        "config": {"kind": "Shape", "key": "WarehouseConfig", "fields": {
                            "pool": {"type": {"kind": "Int"}, "default_value": 4}
                        }}
                    }]},
                    {"name": "test"}
                ],
                "presets": [{
                    "name": "nightly",
                    "mode": "prod",
                    "run_config": {"solids": {"extract": {"config": {"source": "s3://events"}}}},
                    "tags": {"schedule": "nightly"}
                }]
            }]
        }))
        .unwrap()
    }

    pub async fn instance() -> Arc<Instance> {
        let instance = Arc::new(Instance::new(InstanceSettings::default()));
        instance
            .add_location(Arc::new(StaticLocationSource::new("analytics", etl_repository())))
            .await;
        instance
    }
}
