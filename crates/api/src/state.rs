use std::sync::Arc;

use vlabs_core::scripting::ScriptCatalog;
use vlabs_db::HistoryStore;
use vlabs_events::EventBus;

use crate::config::ServerConfig;
use crate::scripting::RunOrchestrator;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager (browser clients).
    pub ws_manager: Arc<WsManager>,
    /// Run event bus feeding the WebSocket relay.
    pub event_bus: Arc<EventBus>,
    /// Scripts loaded from the manifest at startup.
    pub catalog: Arc<ScriptCatalog>,
    pub history: Arc<HistoryStore>,
    pub orchestrator: Arc<RunOrchestrator>,
}
