use serde::{Deserialize, Serialize};

use crate::color::PlayerColor;
use crate::player::Position;

/// Side length of the (square) territory grid.
pub const GRID_SIZE: usize = 16;

/// The shared territory grid: every cell is either unowned or owned by
/// exactly one color. Rooms own their grid exclusively; it is rebuilt
/// empty at room creation and at every round reset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    /// Row-major: `cells[y][x]`.
    cells: [[Option<PlayerColor>; GRID_SIZE]; GRID_SIZE],
}

impl Grid {
    pub fn new() -> Self {
        Grid {
            cells: [[None; GRID_SIZE]; GRID_SIZE],
        }
    }

    pub fn owner(&self, pos: Position) -> Option<PlayerColor> {
        self.cells[pos.y as usize][pos.x as usize]
    }

    /// Paint a cell, returning its previous owner.
    pub fn paint(&mut self, pos: Position, color: PlayerColor) -> Option<PlayerColor> {
        let cell = &mut self.cells[pos.y as usize][pos.x as usize];
        cell.replace(color)
    }

    /// Number of owned cells. With fixed membership this always equals the
    /// sum of the players' scores.
    pub fn owned_count(&self) -> u32 {
        self.cells
            .iter()
            .flatten()
            .filter(|cell| cell.is_some())
            .count() as u32
    }

    pub fn clear(&mut self) {
        self.cells = [[None; GRID_SIZE]; GRID_SIZE];
    }

    pub fn is_empty(&self) -> bool {
        self.owned_count() == 0
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}
