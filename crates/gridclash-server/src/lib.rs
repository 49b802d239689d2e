pub mod registry;
pub mod room;
pub mod routes;
pub mod state;
pub mod timer;
pub mod ws;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// Build a fully configured Router + shared state.
pub fn build_app() -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new());

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/ws", get(routes::ws_upgrade))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    (app, state)
}
