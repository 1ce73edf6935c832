//! Practice scoring: replaying a stored blunder against a live attempt.

use serde::Serialize;

use crate::analysis::classify::Blunder;

/// How an attempt ranked against the stored candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptRank {
    Best,
    Second,
    Third,
    Wrong,
}

impl AttemptRank {
    /// Ranks 1-3 all count as correct, with decreasing enthusiasm.
    pub fn is_correct(self) -> bool {
        !matches!(self, AttemptRank::Wrong)
    }

    pub fn rank(self) -> Option<i32> {
        match self {
            AttemptRank::Best => Some(1),
            AttemptRank::Second => Some(2),
            AttemptRank::Third => Some(3),
            AttemptRank::Wrong => None,
        }
    }

    pub fn feedback(self) -> &'static str {
        match self {
            AttemptRank::Best => "Best move!",
            AttemptRank::Second => "Good move - the engine's second choice.",
            AttemptRank::Third => "Decent - the engine's third choice.",
            AttemptRank::Wrong => "Not this one. Try again.",
        }
    }
}

/// Match an attempt positionally against the stored candidate list.
/// Legacy blunders without one collapse to best-or-wrong.
pub fn score_attempt(blunder: &Blunder, attempt_uci: &str) -> AttemptRank {
    if blunder.top_moves.is_empty() {
        return if attempt_uci == blunder.best_move {
            AttemptRank::Best
        } else {
            AttemptRank::Wrong
        };
    }

    match blunder.top_moves.iter().position(|m| m.uci == attempt_uci) {
        Some(0) => AttemptRank::Best,
        Some(1) => AttemptRank::Second,
        Some(2) => AttemptRank::Third,
        // Candidates past the third never score.
        _ => AttemptRank::Wrong,
    }
}

/// Solve streaks, derived on read. Never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Streaks {
    pub current: u32,
    pub best: u32,
}

/// `solved_ranks` are the current run's solves in solve order. The current
/// streak is the trailing run of rank-1 solves; best is the maximal one.
pub fn compute_streaks(solved_ranks: &[Option<i32>]) -> Streaks {
    let mut best = 0u32;
    let mut run = 0u32;

    for rank in solved_ranks {
        if *rank == Some(1) {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }

    Streaks { current: run, best }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::classify::TopMove;

    fn blunder_with_candidates() -> Blunder {
        Blunder {
            ply: 20,
            move_number: 11,
            fen_before: "fen".to_string(),
            move_played: "d1d2".to_string(),
            move_played_san: "Qd2".to_string(),
            best_move: "f3e5".to_string(),
            top_moves: vec![
                TopMove { uci: "f3e5".to_string(), score_cp: 210 },
                TopMove { uci: "c4d5".to_string(), score_cp: 150 },
                TopMove { uci: "e1g1".to_string(), score_cp: 95 },
            ],
            eval_before_cp: 210,
            eval_after_cp: -40,
            eval_drop_cp: 250,
        }
    }

    #[test]
    fn test_rank_matching() {
        let blunder = blunder_with_candidates();
        assert_eq!(score_attempt(&blunder, "f3e5"), AttemptRank::Best);
        assert_eq!(score_attempt(&blunder, "c4d5"), AttemptRank::Second);
        assert_eq!(score_attempt(&blunder, "e1g1"), AttemptRank::Third);
        assert_eq!(score_attempt(&blunder, "a2a3"), AttemptRank::Wrong);
    }

    #[test]
    fn test_second_choice_is_correct() {
        let blunder = blunder_with_candidates();
        let rank = score_attempt(&blunder, "c4d5");
        assert!(rank.is_correct());
        assert_eq!(rank.rank(), Some(2));
    }

    #[test]
    fn test_wrong_is_not_correct_and_unranked() {
        let rank = score_attempt(&blunder_with_candidates(), "h2h4");
        assert!(!rank.is_correct());
        assert_eq!(rank.rank(), None);
    }

    #[test]
    fn test_legacy_blunder_collapses_to_best_or_wrong() {
        let mut blunder = blunder_with_candidates();
        blunder.top_moves.clear();

        assert_eq!(score_attempt(&blunder, "f3e5"), AttemptRank::Best);
        // The engine's old second choice no longer scores.
        assert_eq!(score_attempt(&blunder, "c4d5"), AttemptRank::Wrong);
    }

    #[test]
    fn test_streaks_trailing_and_best() {
        // rank-1, rank-1, rank-2, rank-1 → best 2, current 1
        let solves = [Some(1), Some(1), Some(2), Some(1)];
        assert_eq!(compute_streaks(&solves), Streaks { current: 1, best: 2 });
    }

    #[test]
    fn test_streaks_all_rank_one() {
        let solves = [Some(1), Some(1), Some(1)];
        assert_eq!(compute_streaks(&solves), Streaks { current: 3, best: 3 });
    }

    #[test]
    fn test_streaks_empty() {
        assert_eq!(compute_streaks(&[]), Streaks::default());
    }
}
