use axum::{Router, routing::get};
use rbdlxc::Orchestrator;
use tower_http::trace::TraceLayer;

use super::handlers;

/// Router for the `/lxc` API.
pub fn app(orchestrator: Orchestrator) -> Router {
    Router::new()
        .route("/lxc", get(handlers::list_containers))
        .route("/lxc/start", get(handlers::start_container))
        .route("/lxc/stop", get(handlers::stop_container))
        .route("/lxc/moveto", get(handlers::move_container))
        .layer(TraceLayer::new_for_http())
        .with_state(orchestrator)
}
