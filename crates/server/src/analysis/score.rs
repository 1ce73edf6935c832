//! Engine score representation.

use serde::{Deserialize, Serialize};

/// Sentinel magnitude for forced-mate scores where a linear centipawn value
/// is required.
pub const MATE_CP: i32 = 10_000;

/// A position score as the engine reports it, relative to the side to move.
/// Mate distance is preserved here; the centipawn clamp happens only at the
/// boundary where delta arithmetic needs one number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Score {
    Centipawns(i32),
    MateIn(i32),
}

impl Score {
    /// Build from the engine's `{cp?, mate?}` pair; mate wins when both are
    /// present. None when the engine reported neither.
    pub fn from_parts(cp: Option<i32>, mate: Option<i32>) -> Option<Self> {
        match (cp, mate) {
            (_, Some(m)) => Some(Score::MateIn(m)),
            (Some(c), None) => Some(Score::Centipawns(c)),
            (None, None) => None,
        }
    }

    /// Collapse to centipawns for delta arithmetic. Mate for the side to
    /// move clamps to +MATE_CP, mate against it (including mate 0, i.e.
    /// already checkmated) to -MATE_CP.
    pub fn clamped_cp(self) -> i32 {
        match self {
            Score::Centipawns(cp) => cp,
            Score::MateIn(m) if m > 0 => MATE_CP,
            Score::MateIn(_) => -MATE_CP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_prefers_mate() {
        assert_eq!(Score::from_parts(Some(35), None), Some(Score::Centipawns(35)));
        assert_eq!(Score::from_parts(Some(35), Some(3)), Some(Score::MateIn(3)));
        assert_eq!(Score::from_parts(None, Some(-2)), Some(Score::MateIn(-2)));
        assert_eq!(Score::from_parts(None, None), None);
    }

    #[test]
    fn test_clamped_cp() {
        assert_eq!(Score::Centipawns(-481).clamped_cp(), -481);
        assert_eq!(Score::MateIn(3).clamped_cp(), MATE_CP);
        assert_eq!(Score::MateIn(-1).clamped_cp(), -MATE_CP);
        assert_eq!(Score::MateIn(0).clamped_cp(), -MATE_CP);
    }
}
