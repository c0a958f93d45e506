//! API routes.

pub mod logs;
pub mod webhooks;

use axum::Router;
use axum::routing::{get, post};

use crate::AppState;

/// Build the main router: webhook receiver at the root, log retrieval
/// under `/logs`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(webhooks::handle_webhook))
        .route("/logs/{id}", get(logs::get_log))
        .with_state(state)
}
