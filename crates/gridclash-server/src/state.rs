use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::mpsc;

use gridclash_core::player::PlayerId;
use gridclash_core::protocol::ServerMessage;

use crate::registry::RoomRegistry;
use crate::room::Room;

/// Handle to push messages to a connected WebSocket client.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub player_id: PlayerId,
    pub tx: mpsc::UnboundedSender<ServerMessage>,
    /// The room this connection currently belongs to, maintained at the
    /// dispatch boundary (one connection, at most one room).
    pub room_code: Option<String>,
    /// Messages received in the current second window.
    pub message_count: u32,
    pub rate_limit_window: Instant,
}

/// Shared application state.
pub struct AppState {
    pub rooms: RoomRegistry,
    pub connections: DashMap<PlayerId, ConnectionHandle>,
    next_player_id: AtomicU64,
    /// Source of timer epochs; process-unique values, never reissued,
    /// so a stale timer task can never match a recreated room.
    timer_seq: AtomicU64,
    pub connection_count: AtomicU32,
    pub max_connections: u32,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            rooms: RoomRegistry::new(),
            connections: DashMap::new(),
            next_player_id: AtomicU64::new(0),
            timer_seq: AtomicU64::new(0),
            connection_count: AtomicU32::new(0),
            max_connections: 100,
        }
    }

    pub fn alloc_player_id(&self) -> PlayerId {
        self.next_player_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Invalidate any timer scheduled for this room and return the fresh
    /// epoch for the next one. A task that captured an older epoch finds
    /// the mismatch at its next fire and stands down, so a cancelled
    /// timer never mutates a room that has moved on.
    pub fn rearm_timer(&self, room: &mut Room) -> u64 {
        let epoch = self.timer_seq.fetch_add(1, Ordering::Relaxed) + 1;
        room.timer_epoch = epoch;
        epoch
    }

    /// Cancel the room's timer (if any) and drop it from the registry.
    /// Idempotent.
    pub fn destroy_room(&self, code: &str) {
        if let Some(mut room) = self.rooms.get_mut(code) {
            self.rearm_timer(&mut room);
        }
        self.rooms.remove(code);
    }

    pub fn send_to(&self, player_id: PlayerId, msg: ServerMessage) {
        if let Some(conn) = self.connections.get(&player_id) {
            let _ = conn.tx.send(msg);
        }
    }

    /// Queue a message to every member of the room.
    pub fn broadcast(&self, room: &Room, msg: &ServerMessage) {
        for id in room.member_ids() {
            self.send_to(id, msg.clone());
        }
    }

    /// Queue a message to every member except one (typically the actor).
    pub fn broadcast_except(&self, room: &Room, except: PlayerId, msg: &ServerMessage) {
        for id in room.member_ids() {
            if id != except {
                self.send_to(id, msg.clone());
            }
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_ids_are_unique() {
        let state = AppState::new();
        let a = state.alloc_player_id();
        let b = state.alloc_player_id();
        assert_ne!(a, b);
    }

    #[test]
    fn rearm_issues_fresh_epochs() {
        let state = AppState::new();
        let code = state.rooms.create();

        let mut room = state.rooms.get_mut(&code).unwrap();
        assert_eq!(room.timer_epoch, 0);
        let first = state.rearm_timer(&mut room);
        let second = state.rearm_timer(&mut room);
        assert_ne!(first, 0);
        assert_ne!(first, second);
        assert_eq!(room.timer_epoch, second);
    }

    #[test]
    fn epochs_never_collide_across_rooms() {
        let state = AppState::new();
        let a = state.rooms.create();
        let b = state.rooms.create();

        let epoch_a = {
            let mut room = state.rooms.get_mut(&a).unwrap();
            state.rearm_timer(&mut room)
        };
        let epoch_b = {
            let mut room = state.rooms.get_mut(&b).unwrap();
            state.rearm_timer(&mut room)
        };
        assert_ne!(epoch_a, epoch_b);
    }

    #[test]
    fn destroy_room_is_idempotent_and_forgets_the_code() {
        let state = AppState::new();
        let code = state.rooms.create();

        state.destroy_room(&code);
        assert!(state.rooms.get(&code).is_none());
        state.destroy_room(&code);
        assert!(state.rooms.is_empty());
    }
}
