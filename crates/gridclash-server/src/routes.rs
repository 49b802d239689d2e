use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::state::AppState;
use crate::ws;

// ── Health ──────────────────────────────────────────────────────────────

pub async fn health() -> &'static str {
    "ok"
}

// ── WebSocket upgrade ───────────────────────────────────────────────────

pub async fn ws_upgrade(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, StatusCode> {
    let current = state.connection_count.load(Ordering::Relaxed);
    if current >= state.max_connections {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    // Connection identity is assigned here and never reused.
    let player_id = state.alloc_player_id();

    Ok(ws.on_upgrade(move |socket| ws::handle_socket(state, socket, player_id)))
}
