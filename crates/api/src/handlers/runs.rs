//! Handlers for runs in progress.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use vlabs_core::types::RunId;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::scripting::ActiveRunInfo;
use crate::state::AppState;

/// GET /runs
pub async fn list_active_runs(
    State(state): State<AppState>,
) -> Json<DataResponse<Vec<ActiveRunInfo>>> {
    Json(DataResponse {
        data: state.orchestrator.active_runs().await,
    })
}

/// POST /runs/{id}/cancel
///
/// Cancellation is asynchronous: the run ends with a `cancelled` status
/// once the process has been killed.
pub async fn cancel_run(
    State(state): State<AppState>,
    Path(run_id): Path<RunId>,
) -> AppResult<StatusCode> {
    state.orchestrator.cancel(run_id).await?;
    Ok(StatusCode::ACCEPTED)
}
