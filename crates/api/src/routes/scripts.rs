use axum::routing::{get, post};
use axum::Router;

use crate::handlers::scripts;
use crate::state::AppState;

/// Routes mounted at `/scripts`.
///
/// ```text
/// GET    /             -> list_scripts
/// POST   /run          -> run_script
/// GET    /{id}         -> get_script
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(scripts::list_scripts))
        .route("/run", post(scripts::run_script))
        .route("/{id}", get(scripts::get_script))
}
