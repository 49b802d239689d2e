use serde::{Deserialize, Serialize};

use crate::color::PlayerColor;
use crate::grid::GRID_SIZE;

/// Opaque per-connection identity assigned by the server at accept time.
pub type PlayerId = u64;

/// A grid coordinate. Constructed through `clamped`, so a held value is
/// always within `[0, GRID_SIZE - 1]` on both axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: u8,
    pub y: u8,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0, y: 0 };

    /// Clamp client-supplied coordinates onto the grid, each axis
    /// independently. The server never trusts claimed positions.
    pub fn clamped(x: i64, y: i64) -> Position {
        let max = (GRID_SIZE - 1) as i64;
        Position {
            x: x.clamp(0, max) as u8,
            y: y.clamp(0, max) as u8,
        }
    }
}

/// Per-connection game state, also the wire representation sent in room
/// snapshots and join notifications.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: PlayerColor,
    pub is_host: bool,
    pub ready: bool,
    pub position: Position,
    pub score: u32,
}

impl Player {
    pub fn new(id: PlayerId, name: String, color: PlayerColor, is_host: bool) -> Self {
        Player {
            id,
            name,
            color,
            is_host,
            ready: false,
            position: Position::ORIGIN,
            score: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_each_axis_independently() {
        assert_eq!(Position::clamped(3, 7), Position { x: 3, y: 7 });
        assert_eq!(Position::clamped(-10, 4), Position { x: 0, y: 4 });
        assert_eq!(Position::clamped(99, -1), Position { x: 15, y: 0 });
        assert_eq!(
            Position::clamped(i64::MAX, i64::MIN),
            Position { x: 15, y: 0 }
        );
    }

    #[test]
    fn new_player_defaults() {
        let player = Player::new(7, "ana".into(), PlayerColor::Blue, true);
        assert!(player.is_host);
        assert!(!player.ready);
        assert_eq!(player.position, Position::ORIGIN);
        assert_eq!(player.score, 0);
    }
}
