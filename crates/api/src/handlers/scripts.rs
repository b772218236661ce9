//! Handlers for the script catalog and starting runs.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;
use vlabs_core::error::CoreError;
use vlabs_core::scripting::{select_runner, RunnerKind, ScriptDescriptor};
use vlabs_core::types::{ClientId, RunId};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::scripting::RunRequest;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// A catalog entry plus the runner the frontend should use for it.
#[derive(Debug, Serialize)]
pub struct ScriptView {
    #[serde(flatten)]
    pub script: ScriptDescriptor,
    pub runner: RunnerKind,
}

impl From<&ScriptDescriptor> for ScriptView {
    fn from(script: &ScriptDescriptor) -> Self {
        Self {
            runner: select_runner(&script.capabilities),
            script: script.clone(),
        }
    }
}

/// Request body for `POST /scripts/run`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RunScriptRequest {
    #[serde(alias = "script_id")]
    #[validate(length(min = 1, max = 128))]
    pub script_id: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Client id from the WebSocket welcome frame.
    #[serde(default, alias = "ws_client_id")]
    pub ws_client_id: Option<ClientId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStarted {
    pub run_id: RunId,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /scripts
pub async fn list_scripts(State(state): State<AppState>) -> Json<DataResponse<Vec<ScriptView>>> {
    let scripts = state.catalog.list().iter().map(ScriptView::from).collect();
    Json(DataResponse { data: scripts })
}

/// GET /scripts/{id}
pub async fn get_script(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<ScriptView>>> {
    let script = state.catalog.get(&id).ok_or_else(|| {
        AppError::Core(CoreError::NotFound {
            entity: "script",
            id: id.clone(),
        })
    })?;
    Ok(Json(DataResponse {
        data: ScriptView::from(script),
    }))
}

/// POST /scripts/run
///
/// Validates the request and starts the run in the background. Live output
/// goes to the WebSocket client named by `wsClientId`.
pub async fn run_script(
    State(state): State<AppState>,
    Json(input): Json<RunScriptRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<RunStarted>>)> {
    input.validate()?;

    if let Some(client_id) = input.ws_client_id {
        if !state.ws_manager.is_connected(&client_id).await {
            tracing::warn!(client_id = %client_id, script_id = %input.script_id, "Run requested for a client that is not connected");
        }
    }

    let run_id = state
        .orchestrator
        .start_run(RunRequest {
            script_id: input.script_id,
            parameters: input.parameters,
            client_id: input.ws_client_id,
        })
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: RunStarted { run_id },
        }),
    ))
}
