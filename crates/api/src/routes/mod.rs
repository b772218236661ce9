pub mod health;
pub mod history;
pub mod runs;
pub mod scripts;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /ws                          WebSocket
///
/// /scripts                     list catalog (GET)
/// /scripts/{id}                get script (GET)
/// /scripts/run                 start a run (POST)
///
/// /runs                        active runs (GET)
/// /runs/{id}/cancel            cancel a run (POST)
///
/// /history                     list, clear (GET, DELETE)
/// /history/{id}                get a past run (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/scripts", scripts::router())
        .nest("/runs", runs::router())
        .nest("/history", history::router())
}
