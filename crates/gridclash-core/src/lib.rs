pub mod color;
pub mod grid;
pub mod player;
pub mod protocol;

pub use color::PlayerColor;
pub use grid::{Grid, GRID_SIZE};
pub use player::{Player, PlayerId, Position};
pub use protocol::{ClientMessage, ServerMessage};
