//! Handlers for `/pipelines` and `/snapshots`.

use axum::extract::{Path, State};
use axum::Json;
use flowgate_engine::PipelineSelector;
use flowgate_schema::{
    ConfigType, ConfigTypeOrError, PipelineConfigValidationResult, PipelineConfigValidationValid,
    PipelineOrError, PipelineSnapshotOrError,
};
use serde::Deserialize;
use serde_json::Value;

use crate::handlers::{project_pipeline, project_snapshot, split_param};
use crate::resolve::Resolve;
use crate::response::{AppJson, AppQuery, DataResponse};
use crate::state::AppState;

/// Query parameters selecting a pipeline.
#[derive(Debug, Default, Deserialize)]
pub struct PipelineParams {
    /// Restrict the lookup to one location.
    pub location: Option<String>,
    /// Comma-separated solid selection clauses.
    pub solids: Option<String>,
    pub mode: Option<String>,
}

impl PipelineParams {
    fn selector(&self, pipeline_name: String) -> PipelineSelector {
        PipelineSelector {
            pipeline_name,
            location_name: self.location.clone(),
            solid_selection: split_param(self.solids.as_deref()),
        }
    }
}

/// Body of a config validation request.
#[derive(Debug, Default, Deserialize)]
pub struct ValidateRunConfig {
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub solid_selection: Option<Vec<String>>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub run_config: Value,
}

/// GET /api/v1/pipelines/{name}
pub async fn get_pipeline(
    State(state): State<AppState>,
    Path(name): Path<String>,
    AppQuery(params): AppQuery<PipelineParams>,
) -> Json<DataResponse<PipelineOrError>> {
    let selector = params.selector(name);
    let result = state
        .instance
        .pipeline(&selector)
        .await
        .map(|view| project_pipeline(view, selector.solid_selection.clone()));

    Json(DataResponse {
        data: PipelineOrError::resolve_result(result),
    })
}

/// GET /api/v1/pipelines/{name}/snapshot
///
/// Stores and returns a snapshot of the pipeline as currently served.
pub async fn get_pipeline_snapshot(
    State(state): State<AppState>,
    Path(name): Path<String>,
    AppQuery(params): AppQuery<PipelineParams>,
) -> Json<DataResponse<PipelineSnapshotOrError>> {
    let selector = params.selector(name);
    let result = state
        .instance
        .pipeline_snapshot(&selector)
        .await
        .map(project_snapshot);

    Json(DataResponse {
        data: PipelineSnapshotOrError::resolve_result(result),
    })
}

/// GET /api/v1/snapshots/{id}
pub async fn get_snapshot(
    State(state): State<AppState>,
    Path(snapshot_id): Path<String>,
) -> Json<DataResponse<PipelineSnapshotOrError>> {
    let result = state
        .instance
        .snapshot_by_id(&snapshot_id)
        .await
        .map(project_snapshot);

    Json(DataResponse {
        data: PipelineSnapshotOrError::resolve_result(result),
    })
}

/// POST /api/v1/pipelines/{name}/validate
///
/// Runs every launch check without launching anything.
pub async fn validate_run_config(
    State(state): State<AppState>,
    Path(name): Path<String>,
    AppJson(body): AppJson<ValidateRunConfig>,
) -> Json<DataResponse<PipelineConfigValidationResult>> {
    let selector = PipelineSelector {
        pipeline_name: name,
        location_name: body.location_name,
        solid_selection: body.solid_selection,
    };
    let result = state
        .instance
        .validate_run_config(&selector, body.mode.as_deref(), &body.run_config)
        .await
        .map(|plan| PipelineConfigValidationValid {
            pipeline_name: plan.pipeline.name,
            mode: plan.mode.name,
        });

    Json(DataResponse {
        data: PipelineConfigValidationResult::resolve_result(result),
    })
}

/// GET /api/v1/pipelines/{name}/config-types/{key}
pub async fn get_config_type(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
    AppQuery(params): AppQuery<PipelineParams>,
) -> Json<DataResponse<ConfigTypeOrError>> {
    let selector = params.selector(name);
    let result = state
        .instance
        .config_type(&selector, params.mode.as_deref(), &key)
        .await
        .map(|config_type| ConfigType::from(&config_type));

    Json(DataResponse {
        data: ConfigTypeOrError::resolve_result(result),
    })
}
