use axum::extract::{Path, State};
use axum::Json;
use flowgate_engine::AssetRecord;
use flowgate_schema::{Asset, AssetMaterialization, AssetOrError};

use crate::resolve::Resolve;
use crate::response::DataResponse;
use crate::state::AppState;

fn project_asset(record: AssetRecord) -> Asset {
    Asset {
        path: record.asset_key.split('/').map(str::to_string).collect(),
        materializations: record
            .materializations
            .into_iter()
            .map(|m| AssetMaterialization {
                asset_key: record.asset_key.clone(),
                run_id: m.run_id,
                step_key: m.step_key,
                description: m.description,
                timestamp: m.timestamp,
            })
            .collect(),
        asset_key: record.asset_key,
    }
}

/// GET /api/v1/assets/{*key}
///
/// Asset keys contain `/`, so the key is the rest of the path.
pub async fn get_asset(
    State(state): State<AppState>,
    Path(asset_key): Path<String>,
) -> Json<DataResponse<AssetOrError>> {
    let result = state.instance.asset(&asset_key).await.map(project_asset);
    Json(DataResponse {
        data: AssetOrError::resolve_result(result),
    })
}
