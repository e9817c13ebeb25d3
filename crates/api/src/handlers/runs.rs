//! Handlers for the `/runs` resource.
//!
//! Launch and terminate acknowledge synchronously: they answer as soon as
//! the engine accepts or rejects the request, while the run itself
//! progresses in the background.

use axum::extract::{Path, State};
use axum::Json;
use flowgate_core::event::LogLevel;
use flowgate_core::log_filter::LogFilter;
use flowgate_core::run::RunsFilter;
use flowgate_core::status::RunStatus;
use flowgate_engine::{EngineError, Instance, LaunchRequest};
use flowgate_schema::{
    EventConnection, EventsOrError, LaunchRunResult, LaunchRunSuccess, PipelineRunEvent,
    PipelineRunOrError, PipelineRunStatsOrError, PipelineRunStatsSnapshot, PipelineRuns,
    PipelineRunsOrError, TerminateRunFailure, TerminateRunResult, TerminateRunSuccess,
};
use serde::Deserialize;

use crate::handlers::{project_run, split_param};
use crate::resolve::{invalid_request, Resolve};
use crate::response::{AppJson, AppQuery, DataResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct RunsParams {
    pub pipeline: Option<String>,
    pub status: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsParams {
    /// Only events with a greater sequence number.
    pub after: Option<u64>,
    /// Filter query, e.g. `step:load type:STEP_FAILURE`.
    pub filter: Option<String>,
    /// Comma-separated log levels.
    pub levels: Option<String>,
}

/// GET /api/v1/runs
///
/// Newest first. An unknown `status` is reported as an invalid request.
pub async fn list_runs(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<RunsParams>,
) -> Json<DataResponse<PipelineRunsOrError>> {
    let status = match params.status.as_deref().map(str::parse::<RunStatus>).transpose() {
        Ok(status) => status,
        Err(message) => {
            return Json(DataResponse {
                data: invalid_request(&EngineError::InvalidRequest(message)).into(),
            })
        }
    };
    let filter = RunsFilter {
        pipeline_name: params.pipeline,
        status,
        limit: params.limit,
    };

    let records = state.instance.runs(&filter).await;
    let mut results = Vec::with_capacity(records.len());
    for record in &records {
        results.push(project_run(&state.instance, record).await);
    }

    Json(DataResponse {
        data: PipelineRuns {
            count: results.len(),
            results,
        }
        .into(),
    })
}

/// GET /api/v1/runs/{id}
pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Json<DataResponse<PipelineRunOrError>> {
    let data = match state.instance.run(&run_id).await {
        Ok(record) => project_run(&state.instance, &record).await.into(),
        Err(err) => PipelineRunOrError::resolve(err),
    };
    Json(DataResponse { data })
}

async fn run_stats(instance: &Instance, run_id: &str) -> Result<PipelineRunStatsSnapshot, EngineError> {
    let record = instance.run(run_id).await?;
    let stats = instance.run_stats(run_id).await?;
    Ok(PipelineRunStatsSnapshot::project(record.run_id, &stats))
}

/// GET /api/v1/runs/{id}/stats
pub async fn get_run_stats(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Json<DataResponse<PipelineRunStatsOrError>> {
    Json(DataResponse {
        data: PipelineRunStatsOrError::resolve_result(run_stats(&state.instance, &run_id).await),
    })
}

async fn run_events(
    instance: &Instance,
    run_id: &str,
    params: EventsParams,
) -> Result<EventConnection, EngineError> {
    let levels = split_param(params.levels.as_deref())
        .unwrap_or_default()
        .iter()
        .map(|level| level.parse::<LogLevel>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(EngineError::InvalidRequest)?;
    let filter = LogFilter::parse(params.filter.as_deref().unwrap_or_default()).with_levels(levels);

    let record = instance.run(run_id).await?;
    let events = instance.run_events(run_id, params.after, &filter).await?;

    Ok(EventConnection {
        run_id: record.run_id,
        cursor: events.last().map(|e| e.sequence).or(params.after),
        events: events.iter().map(PipelineRunEvent::from).collect(),
        filter: (!filter.is_empty()).then(|| filter.to_query_string()),
    })
}

/// GET /api/v1/runs/{id}/events
pub async fn get_run_events(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    AppQuery(params): AppQuery<EventsParams>,
) -> Json<DataResponse<EventsOrError>> {
    Json(DataResponse {
        data: EventsOrError::resolve_result(run_events(&state.instance, &run_id, params).await),
    })
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// POST /api/v1/runs
///
/// Validates and enqueues a run. Every launch check failure comes back
/// as a typed member of `LaunchRunResult`.
pub async fn launch_run(
    State(state): State<AppState>,
    AppJson(request): AppJson<LaunchRequest>,
) -> Json<DataResponse<LaunchRunResult>> {
    let pipeline_name = request.selector.pipeline_name.clone();
    let data = match state.instance.launch_run(request).await {
        Ok(record) => LaunchRunSuccess {
            run: project_run(&state.instance, &record).await,
        }
        .into(),
        Err(err) => {
            tracing::info!(pipeline = %pipeline_name, reason = %err.reason(), "Launch rejected");
            LaunchRunResult::resolve(err)
        }
    };
    Json(DataResponse { data })
}

/// POST /api/v1/runs/{id}/terminate
///
/// A run that already finished or is being canceled yields a
/// `TerminateRunFailure` carrying the run as it stands.
pub async fn terminate_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Json<DataResponse<TerminateRunResult>> {
    let data = match state.instance.terminate_run(&run_id).await {
        Ok(record) => TerminateRunSuccess {
            run: project_run(&state.instance, &record).await,
        }
        .into(),
        Err(err @ EngineError::RunNotTerminable { .. }) => match state.instance.run(&run_id).await {
            Ok(record) => TerminateRunFailure {
                message: err.to_string(),
                run: project_run(&state.instance, &record).await,
            }
            .into(),
            Err(lookup) => TerminateRunResult::resolve(lookup),
        },
        Err(err) => TerminateRunResult::resolve(err),
    };
    Json(DataResponse { data })
}
