use axum::routing::get;
use axum::Router;

use crate::handlers::history;
use crate::state::AppState;

/// Routes mounted at `/history`.
///
/// ```text
/// GET    /        -> list_history
/// DELETE /        -> clear_history
/// GET    /{id}    -> get_history
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(history::list_history).delete(history::clear_history))
        .route("/{id}", get(history::get_history))
}
