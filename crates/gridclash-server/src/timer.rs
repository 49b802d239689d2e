use std::sync::Arc;
use std::time::Duration;

use gridclash_core::protocol::ServerMessage;

use crate::room::{COUNTDOWN_SECS, Room, RoomPhase};
use crate::state::AppState;

/// One-shot countdown: after the fixed delay, move a Starting room into
/// Active, broadcast the fresh grid, and hand over to the game ticker.
///
/// `epoch` is the value returned by `rearm_timer` when this timer was
/// scheduled; the task stands down if the room is gone, left Starting,
/// or was re-armed in the meantime (restart, early end, destruction).
pub fn spawn_countdown(state: Arc<AppState>, code: String, epoch: u64) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(COUNTDOWN_SECS)).await;

        let ticker_epoch = {
            let mut room = match state.rooms.get_mut(&code) {
                Some(r) => r,
                None => return,
            };
            if room.timer_epoch != epoch || room.phase != RoomPhase::Starting {
                return;
            }
            room.start_active();
            state.broadcast(
                &room,
                &ServerMessage::GridInitialized {
                    grid: room.grid.clone(),
                },
            );
            log::info!("room {} is live", code);
            state.rearm_timer(&mut room)
        };

        spawn_ticker(state, code, ticker_epoch);
    });
}

/// Per-room game clock: one tick per second, broadcast to members, game
/// over at zero. Exits quietly whenever the room disappears, leaves
/// Active, or is re-armed under it.
pub fn spawn_ticker(state: Arc<AppState>, code: String, epoch: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;

            let mut room = match state.rooms.get_mut(&code) {
                Some(r) => r,
                None => return,
            };
            if room.timer_epoch != epoch || room.phase != RoomPhase::Active {
                return;
            }

            let time_left = room.tick();
            state.broadcast(&room, &ServerMessage::TimeUpdated { time_left });

            if time_left == 0 {
                finish_game(&state, &mut room);
                return;
            }
        }
    });
}

/// End the round: cancel the clock, announce final scores and the
/// winner, and leave the room as a replayable lobby. Called with the
/// room lock held, from timer expiry or from a mid-round departure that
/// left a single player.
pub fn finish_game(state: &AppState, room: &mut Room) {
    state.rearm_timer(room);
    let outcome = room.end_game();
    log::info!(
        "room {} finished, winner {:?}",
        room.code,
        outcome.winner
    );
    state.broadcast(
        room,
        &ServerMessage::GameEnded {
            scores: outcome.scores,
            winner: outcome.winner,
        },
    );
}
