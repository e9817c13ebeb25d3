//! Handlers for `/locations`: the workspace and location reloads.

use axum::extract::{Path, State};
use axum::Json;
use flowgate_engine::{LocationInfo, ReloadOutcome};
use flowgate_schema::{
    ReloadRepositoryLocationResult, ReloadRepositoryLocationStatus, RepositoryLocationReload,
    Workspace, WorkspaceLocationEntry,
};

use crate::resolve::Resolve;
use crate::response::DataResponse;
use crate::state::AppState;

fn location_entry(info: LocationInfo) -> WorkspaceLocationEntry {
    WorkspaceLocationEntry {
        name: info.name,
        repository_name: info.repository_name,
        pipeline_names: info.pipeline_names,
        load_error: info.load_error,
        updated_at: info.updated_at,
    }
}

/// GET /api/v1/locations
pub async fn list_locations(State(state): State<AppState>) -> Json<DataResponse<Workspace>> {
    let locations = state
        .instance
        .locations()
        .await
        .into_iter()
        .map(location_entry)
        .collect();
    Json(DataResponse {
        data: Workspace { locations },
    })
}

/// POST /api/v1/locations/{name}/reload
///
/// Reloading a location whose definitions have not changed is a no-op
/// reported as `SKIPPED`. A failed load keeps the previous definitions
/// active and reports `ERROR` with the load error.
pub async fn reload_location(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Json<DataResponse<ReloadRepositoryLocationResult>> {
    let result = state
        .instance
        .reload_location(&name)
        .await
        .map(|(outcome, info)| {
            let (status, message) = match outcome {
                ReloadOutcome::Reloaded => (ReloadRepositoryLocationStatus::Success, None),
                ReloadOutcome::Unchanged => (
                    ReloadRepositoryLocationStatus::Skipped,
                    Some(format!("Location '{name}' is already up to date")),
                ),
                ReloadOutcome::Failed(error) => (ReloadRepositoryLocationStatus::Error, Some(error)),
            };
            tracing::info!(location = %name, status = %status, "Reload requested");
            RepositoryLocationReload {
                status,
                message,
                location: location_entry(info),
            }
        });

    Json(DataResponse {
        data: ReloadRepositoryLocationResult::resolve_result(result),
    })
}
