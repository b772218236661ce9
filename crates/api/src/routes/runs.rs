use axum::routing::{get, post};
use axum::Router;

use crate::handlers::runs;
use crate::state::AppState;

/// Routes mounted at `/runs`.
///
/// ```text
/// GET    /              -> list_active_runs
/// POST   /{id}/cancel   -> cancel_run
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(runs::list_active_runs))
        .route("/{id}/cancel", post(runs::cancel_run))
}
