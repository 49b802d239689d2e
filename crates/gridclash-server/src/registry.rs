use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::{Ref, RefMut};

use crate::room::Room;

/// Length of generated room codes.
pub const CODE_LEN: usize = 4;

/// Process-wide mapping from room code to live room. Owned by the
/// injected `AppState` rather than living as a global, so tests can run
/// isolated registries in parallel.
///
/// The `DashMap` entry guards double as the per-room exclusive-access
/// discipline: every read-then-write room operation runs under the
/// `get_mut` guard, so operations on one room are serialized while
/// different rooms proceed independently.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        RoomRegistry {
            rooms: DashMap::new(),
        }
    }

    /// Insert a fresh lobby room under a collision-free code. A freed
    /// code may be reused later; at most one live room holds it at any
    /// instant.
    pub fn create(&self) -> String {
        loop {
            let code = random_code();
            match self.rooms.entry(code.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(entry) => {
                    entry.insert(Room::new(code.clone()));
                    return code;
                }
            }
        }
    }

    pub fn get(&self, code: &str) -> Option<Ref<'_, String, Room>> {
        self.rooms.get(&code.to_uppercase())
    }

    pub fn get_mut(&self, code: &str) -> Option<RefMut<'_, String, Room>> {
        self.rooms.get_mut(&code.to_uppercase())
    }

    /// Remove a room. Idempotent; timer cancellation happens through
    /// `AppState::destroy_room`, which re-arms the epoch first.
    pub fn remove(&self, code: &str) {
        self.rooms.remove(&code.to_uppercase());
    }

    pub fn contains(&self, code: &str) -> bool {
        self.rooms.contains_key(&code.to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

/// Generate a random code drawn from the uppercase alphabet.
fn random_code() -> String {
    use rand::RngExt;
    let mut rng = rand::rng();
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    (0..CODE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..CHARS.len());
            CHARS[idx] as char
        })
        .collect()
}
