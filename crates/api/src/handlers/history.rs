//! Handlers for past runs.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use vlabs_core::error::CoreError;
use vlabs_core::types::RunId;
use vlabs_db::models::RunRecord;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Maximum number of records (default: everything kept).
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ClearedHistory {
    pub removed: usize,
}

/// GET /history
pub async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<DataResponse<Vec<RunRecord>>> {
    Json(DataResponse {
        data: state.history.list(query.limit).await,
    })
}

/// GET /history/{id}
pub async fn get_history(
    State(state): State<AppState>,
    Path(run_id): Path<RunId>,
) -> AppResult<Json<DataResponse<RunRecord>>> {
    let record = state.history.get(run_id).await.ok_or_else(|| {
        AppError::Core(CoreError::NotFound {
            entity: "run",
            id: run_id.to_string(),
        })
    })?;
    Ok(Json(DataResponse { data: record }))
}

/// DELETE /history
pub async fn clear_history(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<ClearedHistory>>> {
    let removed = state.history.clear().await?;
    tracing::info!(removed, "Cleared run history");
    Ok(Json(DataResponse {
        data: ClearedHistory { removed },
    }))
}
