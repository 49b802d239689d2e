use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use tokio::sync::mpsc;

use gridclash_core::player::PlayerId;
use gridclash_core::protocol::{ClientMessage, ServerMessage};

use crate::room::{COUNTDOWN_SECS, RoomError};
use crate::state::{AppState, ConnectionHandle};
use crate::timer;

/// Top-level WebSocket handler -- spawned per connection.
pub async fn handle_socket(state: Arc<AppState>, mut socket: WebSocket, player_id: PlayerId) {
    state.connection_count.fetch_add(1, Ordering::Relaxed);
    log::debug!("connection {} opened", player_id);

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Register connection handle.
    state.connections.insert(
        player_id,
        ConnectionHandle {
            player_id,
            tx: tx.clone(),
            room_code: None,
            message_count: 0,
            rate_limit_window: Instant::now(),
        },
    );

    loop {
        tokio::select! {
            // Outbound: forward queued ServerMessage to the WebSocket.
            Some(msg) = rx.recv() => {
                if let Ok(json) = serde_json::to_string(&msg) {
                    if socket.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            }
            // Inbound: read from the WebSocket.
            maybe_msg = socket.recv() => {
                match maybe_msg {
                    Some(Ok(Message::Text(text))) => {
                        // Rate limiting: max 20 messages per second.
                        {
                            let mut conn = match state.connections.get_mut(&player_id) {
                                Some(c) => c,
                                None => break,
                            };
                            let now = Instant::now();
                            if now.duration_since(conn.rate_limit_window) > Duration::from_secs(1) {
                                conn.rate_limit_window = now;
                                conn.message_count = 0;
                            }
                            conn.message_count += 1;
                            if conn.message_count > 20 {
                                let _ = conn.tx.send(ServerMessage::Error {
                                    message: "Rate limited".into(),
                                });
                                continue;
                            }
                        }

                        let client_msg: ClientMessage = match serde_json::from_str(&text) {
                            Ok(m) => m,
                            Err(e) => {
                                let _ = tx.send(ServerMessage::Error {
                                    message: format!("Invalid message: {}", e),
                                });
                                continue;
                            }
                        };

                        handle_message(&state, player_id, &tx, client_msg);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    _ => continue,
                }
            }
        }
    }

    // Disconnected -- remove from the current room with full teardown
    // semantics (host migration, early end, room destruction).
    let room_code = state
        .connections
        .get(&player_id)
        .and_then(|c| c.room_code.clone());
    if let Some(code) = room_code {
        leave_room(&state, &code, player_id);
    }

    state.connections.remove(&player_id);
    state.connection_count.fetch_sub(1, Ordering::Relaxed);
    log::debug!("connection {} closed", player_id);
}

/// Dispatch a single client message.
fn handle_message(
    state: &Arc<AppState>,
    player_id: PlayerId,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    msg: ClientMessage,
) {
    match msg {
        ClientMessage::CreateRoom { name } => {
            if current_room(state, player_id).is_some() {
                let _ = tx.send(ServerMessage::Error {
                    message: "Already in a room".into(),
                });
                return;
            }

            let code = state.rooms.create();
            let created = {
                let mut room = match state.rooms.get_mut(&code) {
                    Some(r) => r,
                    None => return,
                };
                room.add_player(player_id, name)
            };

            match created {
                Ok(player) => {
                    set_room(state, player_id, Some(code.clone()));
                    log::info!("room {} created by {}", code, player_id);
                    let _ = tx.send(ServerMessage::RoomCreated {
                        code,
                        player_id,
                        player,
                    });
                }
                Err(e) => {
                    state.destroy_room(&code);
                    let _ = tx.send(ServerMessage::Error {
                        message: e.to_string(),
                    });
                }
            }
        }

        ClientMessage::JoinRoom { code, name } => {
            if current_room(state, player_id).is_some() {
                let _ = tx.send(ServerMessage::Error {
                    message: "Already in a room".into(),
                });
                return;
            }

            let joined = {
                let mut room = match state.rooms.get_mut(&code) {
                    Some(r) => r,
                    None => {
                        let _ = tx.send(ServerMessage::Error {
                            message: RoomError::NotFound.to_string(),
                        });
                        return;
                    }
                };

                match room.add_player(player_id, name) {
                    Ok(player) => {
                        state.broadcast_except(
                            &room,
                            player_id,
                            &ServerMessage::PlayerJoined { player },
                        );
                        Some((room.code.clone(), room.players_snapshot()))
                    }
                    Err(e) => {
                        let _ = tx.send(ServerMessage::Error {
                            message: e.to_string(),
                        });
                        None
                    }
                }
            };

            if let Some((code, players)) = joined {
                set_room(state, player_id, Some(code.clone()));
                log::info!("player {} joined room {}", player_id, code);
                let _ = tx.send(ServerMessage::RoomJoined {
                    code,
                    player_id,
                    players,
                });
            }
        }

        ClientMessage::SetReady { ready } => {
            let Some(code) = current_room(state, player_id) else {
                return;
            };
            let Some(mut room) = state.rooms.get_mut(&code) else {
                return;
            };
            // Unknown member: silent no-op.
            let Some(outcome) = room.set_ready(player_id, ready) else {
                return;
            };

            state.broadcast(
                &room,
                &ServerMessage::PlayerStatusUpdate {
                    player_id,
                    ready: outcome.ready,
                },
            );

            if outcome.starting {
                log::info!("room {} starting", code);
                state.broadcast(
                    &room,
                    &ServerMessage::GameStart {
                        countdown: COUNTDOWN_SECS,
                    },
                );
                let epoch = state.rearm_timer(&mut room);
                timer::spawn_countdown(state.clone(), code, epoch);
            }
        }

        ClientMessage::Move { x, y } => {
            let Some(code) = current_room(state, player_id) else {
                return;
            };
            let Some(mut room) = state.rooms.get_mut(&code) else {
                return;
            };
            let Some(outcome) = room.apply_move(player_id, x, y) else {
                return;
            };

            // Capture and position ride the same lock scope: observers
            // never see one without the other.
            if let Some(capture) = outcome.capture {
                state.broadcast(
                    &room,
                    &ServerMessage::CellUpdated {
                        x: outcome.position.x,
                        y: outcome.position.y,
                        color: capture.color,
                    },
                );
                state.broadcast(
                    &room,
                    &ServerMessage::ScoresUpdated {
                        scores: capture.scores,
                    },
                );
            }
            state.broadcast_except(
                &room,
                player_id,
                &ServerMessage::PlayerMoved {
                    player_id,
                    position: outcome.position,
                },
            );
        }

        ClientMessage::Restart => {
            let Some(code) = current_room(state, player_id) else {
                return;
            };
            let Some(mut room) = state.rooms.get_mut(&code) else {
                return;
            };
            match room.restart(player_id) {
                Ok(()) => {
                    // Cancels a pending countdown or ticker as well.
                    state.rearm_timer(&mut room);
                    log::info!("room {} restarted by host {}", code, player_id);
                    state.broadcast(&room, &ServerMessage::GameRestarted);
                }
                Err(e) => {
                    let _ = tx.send(ServerMessage::Error {
                        message: e.to_string(),
                    });
                }
            }
        }

        ClientMessage::Ping => {
            let _ = tx.send(ServerMessage::Pong);
        }
    }
}

// -- Helpers ------------------------------------------------------------------

fn current_room(state: &AppState, player_id: PlayerId) -> Option<String> {
    state
        .connections
        .get(&player_id)
        .and_then(|c| c.room_code.clone())
}

fn set_room(state: &AppState, player_id: PlayerId, code: Option<String>) {
    if let Some(mut conn) = state.connections.get_mut(&player_id) {
        conn.room_code = code;
    }
}

/// Remove a departing player from its room: notify survivors, migrate
/// the host, end a round that lost its second player, destroy the room
/// when it empties.
fn leave_room(state: &AppState, code: &str, player_id: PlayerId) {
    let destroy = {
        let mut room = match state.rooms.get_mut(code) {
            Some(r) => r,
            None => return,
        };
        let Some(outcome) = room.remove_player(player_id) else {
            return;
        };

        state.broadcast(&room, &ServerMessage::PlayerLeft { player_id });
        if let Some(new_host) = outcome.new_host {
            state.broadcast(
                &room,
                &ServerMessage::NewHost {
                    player_id: new_host,
                },
            );
        }

        if room.is_empty() {
            true
        } else {
            if outcome.end_game {
                timer::finish_game(state, &mut room);
            }
            false
        }
    };

    if destroy {
        log::info!("room {} emptied, destroying", code);
        state.destroy_room(code);
    }
}
