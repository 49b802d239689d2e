use serde::{Deserialize, Serialize};

/// Player colors, drawn from a fixed six-entry palette. Serialized as the
/// hex string the client paints with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerColor {
    #[serde(rename = "#ff0000")]
    Red,
    #[serde(rename = "#00ff00")]
    Green,
    #[serde(rename = "#0000ff")]
    Blue,
    #[serde(rename = "#ffff00")]
    Yellow,
    #[serde(rename = "#ff00ff")]
    Magenta,
    #[serde(rename = "#00ffff")]
    Cyan,
}

impl PlayerColor {
    pub const ALL: [PlayerColor; 6] = [
        PlayerColor::Red,
        PlayerColor::Green,
        PlayerColor::Blue,
        PlayerColor::Yellow,
        PlayerColor::Magenta,
        PlayerColor::Cyan,
    ];

    pub fn hex(&self) -> &'static str {
        match self {
            PlayerColor::Red => "#ff0000",
            PlayerColor::Green => "#00ff00",
            PlayerColor::Blue => "#0000ff",
            PlayerColor::Yellow => "#ffff00",
            PlayerColor::Magenta => "#ff00ff",
            PlayerColor::Cyan => "#00ffff",
        }
    }

    /// Draw a uniformly random color not in `taken`. Returns `None` when the
    /// palette is exhausted, which callers treat as a full room.
    pub fn draw(taken: &[PlayerColor]) -> Option<PlayerColor> {
        use rand::RngExt;
        let free: Vec<PlayerColor> = Self::ALL
            .iter()
            .copied()
            .filter(|c| !taken.contains(c))
            .collect();
        if free.is_empty() {
            return None;
        }
        let mut rng = rand::rng();
        Some(free[rng.random_range(0..free.len())])
    }
}
