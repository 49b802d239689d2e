use serde::{Deserialize, Serialize};

use crate::color::PlayerColor;
use crate::grid::Grid;
use crate::player::{Player, PlayerId, Position};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    CreateRoom {
        /// Display hint for the creating player.
        name: String,
    },
    JoinRoom {
        code: String,
        name: String,
    },
    SetReady {
        ready: bool,
    },
    /// Target cell; out-of-range coordinates are clamped server-side.
    Move {
        x: i64,
        y: i64,
    },
    Restart,
    Ping,
}

/// One row of the score table, in join order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub player_id: PlayerId,
    pub color: PlayerColor,
    pub score: u32,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    RoomCreated {
        code: String,
        player_id: PlayerId,
        player: Player,
    },
    /// Full snapshot for the joiner; existing members get `PlayerJoined`.
    RoomJoined {
        code: String,
        player_id: PlayerId,
        players: Vec<Player>,
    },
    PlayerJoined {
        player: Player,
    },
    PlayerLeft {
        player_id: PlayerId,
    },
    PlayerStatusUpdate {
        player_id: PlayerId,
        ready: bool,
    },
    NewHost {
        player_id: PlayerId,
    },
    GameStart {
        /// Seconds until the round goes live.
        countdown: u64,
    },
    /// Full grid snapshot at the moment the round goes live.
    GridInitialized {
        grid: Grid,
    },
    PlayerMoved {
        player_id: PlayerId,
        position: Position,
    },
    CellUpdated {
        x: u8,
        y: u8,
        color: PlayerColor,
    },
    ScoresUpdated {
        scores: Vec<ScoreEntry>,
    },
    TimeUpdated {
        time_left: u64,
    },
    GameEnded {
        scores: Vec<ScoreEntry>,
        winner: Option<PlayerId>,
    },
    GameRestarted,
    Error {
        message: String,
    },
    Pong,
}
