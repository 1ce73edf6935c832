//! Value types for imported games.

use serde::{Deserialize, Serialize};

/// One side of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    /// Parse the color string stored with a game record.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "white" | "w" => Some(Self::White),
            "black" | "b" => Some(Self::Black),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Black => "black",
        }
    }

    pub fn is_white(self) -> bool {
        matches!(self, Self::White)
    }
}

/// An imported game as the analysis pipeline consumes it.
/// Immutable once imported; `movetext` is the serialized move record.
#[derive(Debug, Clone)]
pub struct GameRecord {
    pub id: i64,
    pub movetext: String,
    pub user_color: Side,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_parse() {
        assert_eq!(Side::parse("white"), Some(Side::White));
        assert_eq!(Side::parse("B"), Some(Side::Black));
        assert_eq!(Side::parse("red"), None);
    }
}
