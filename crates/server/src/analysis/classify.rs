//! Blunder classification.
//!
//! The one place the before/after evaluation pair becomes a side-relative
//! drop; both the bulk job and the interactive path call through here.

use serde::{Deserialize, Serialize};

use chess_core::replay::Ply;

use crate::analysis::score::Score;
use crate::clients::engine::Evaluation;

#[derive(Debug, Clone)]
pub struct ClassifyConfig {
    /// Minimum drop, in centipawns, that flags a move.
    pub threshold_cp: i32,
    /// When set, positions the mover had already lost by more than this
    /// are not flagged.
    pub lost_position_ceiling_cp: Option<i32>,
    /// How many ranked candidates to carry on the stored blunder.
    pub top_moves_kept: usize,
}

/// A stored candidate move, for later practice scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopMove {
    pub uci: String,
    pub score_cp: i32,
}

/// A flagged move, as embedded in an Analysis row. Append-only once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blunder {
    /// 0-based index into the game's move record.
    pub ply: usize,
    pub move_number: u32,
    pub fen_before: String,
    pub move_played: String,
    pub move_played_san: String,
    pub best_move: String,
    /// Ranked alternatives, best first. Empty on legacy data.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_moves: Vec<TopMove>,
    /// From the mover's perspective.
    pub eval_before_cp: i32,
    pub eval_after_cp: i32,
    pub eval_drop_cp: i32,
}

/// The mover's loss of ground across one move.
///
/// Both scores are side-to-move relative, exactly as the engine reports
/// them: `before` with the mover on move, `after` with the opponent on
/// move, so the second flips sign in the mover's fixed frame. Negating
/// both inputs (the same pair seen from the other side) negates the drop.
pub fn eval_drop(before: Score, after: Score) -> i32 {
    before.clamped_cp() - (-after.clamped_cp())
}

/// Classify one user move. `eval_before` was taken with the user to move,
/// `eval_after` right after the user's move, with the opponent to move.
pub fn classify(
    ply: &Ply,
    eval_before: &Evaluation,
    eval_after: Score,
    config: &ClassifyConfig,
) -> Option<Blunder> {
    let eval_before_cp = eval_before.score.clamped_cp();
    let eval_after_cp = -eval_after.clamped_cp();
    let drop = eval_drop(eval_before.score, eval_after);

    if let Some(ceiling) = config.lost_position_ceiling_cp {
        // Already lost before the move; flagging adds noise, not puzzles.
        if eval_before_cp <= -ceiling {
            return None;
        }
    }

    if drop < config.threshold_cp {
        return None;
    }

    let top_moves = eval_before
        .candidates
        .iter()
        .take(config.top_moves_kept)
        .map(|line| TopMove {
            uci: line.uci.clone(),
            score_cp: line.score.clamped_cp(),
        })
        .collect();

    Some(Blunder {
        ply: ply.ply,
        move_number: ply.move_number,
        fen_before: ply.fen_before.clone(),
        move_played: ply.uci.clone(),
        move_played_san: ply.san.clone(),
        best_move: eval_before.best_move().to_string(),
        top_moves,
        eval_before_cp,
        eval_after_cp,
        eval_drop_cp: drop,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::engine::CandidateLine;
    use chess_core::game_data::Side;

    fn test_ply() -> Ply {
        Ply {
            ply: 14,
            move_number: 8,
            fen_before: "r1bqkb1r/pppp1ppp/2n2n2/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 5"
                .to_string(),
            fen_after: "r1bqkb1r/pppp1ppp/2n2n2/4p3/2B1P3/3P1N2/PPP2PPP/RNBQK2R b KQkq - 0 5"
                .to_string(),
            san: "d3".to_string(),
            uci: "d2d3".to_string(),
            side_to_move: Side::White,
            is_user_move: true,
        }
    }

    fn evaluation(score: Score, candidates: &[(&str, Score)]) -> Evaluation {
        Evaluation {
            score,
            candidates: candidates
                .iter()
                .map(|(uci, score)| CandidateLine {
                    uci: uci.to_string(),
                    score: *score,
                    continuation: vec![uci.to_string()],
                })
                .collect(),
        }
    }

    fn config() -> ClassifyConfig {
        ClassifyConfig {
            threshold_cp: 100,
            lost_position_ceiling_cp: None,
            top_moves_kept: 3,
        }
    }

    #[test]
    fn test_flags_documented_scenario() {
        // +50 with the user to move, +380 for the opponent after the move.
        let before = evaluation(
            Score::Centipawns(50),
            &[("g1f3", Score::Centipawns(50)), ("b1c3", Score::Centipawns(42))],
        );
        let blunder = classify(&test_ply(), &before, Score::Centipawns(380), &config())
            .expect("430cp drop crosses the threshold");

        assert_eq!(blunder.eval_before_cp, 50);
        assert_eq!(blunder.eval_after_cp, -380);
        assert_eq!(blunder.eval_drop_cp, 430);
        assert_eq!(blunder.best_move, "g1f3");
        assert_eq!(blunder.move_played, "d2d3");
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let before = evaluation(Score::Centipawns(0), &[("g1f3", Score::Centipawns(0))]);
        assert!(classify(&test_ply(), &before, Score::Centipawns(100), &config()).is_some());
        assert!(classify(&test_ply(), &before, Score::Centipawns(99), &config()).is_none());
    }

    #[test]
    fn test_good_move_not_flagged() {
        let before = evaluation(Score::Centipawns(50), &[("g1f3", Score::Centipawns(50))]);
        // Opponent slightly better off than the eval promised; small drop.
        assert!(classify(&test_ply(), &before, Score::Centipawns(-20), &config()).is_none());
    }

    #[test]
    fn test_drop_negates_under_side_swap() {
        let a = Score::Centipawns(50);
        let b = Score::Centipawns(380);
        assert_eq!(eval_drop(a, b), 430);
        assert_eq!(eval_drop(Score::Centipawns(-50), Score::Centipawns(-380)), -430);
    }

    #[test]
    fn test_mate_scores_clamp_in_drop() {
        // Missing a mate: +M3 before, dead even after.
        let before = evaluation(Score::MateIn(3), &[("d8h4", Score::MateIn(3))]);
        let blunder =
            classify(&test_ply(), &before, Score::Centipawns(0), &config()).unwrap();
        assert_eq!(blunder.eval_before_cp, 10_000);
        assert_eq!(blunder.eval_drop_cp, 10_000);
    }

    #[test]
    fn test_lost_position_ceiling_suppresses() {
        let mut cfg = config();
        cfg.lost_position_ceiling_cp = Some(900);

        let before = evaluation(Score::Centipawns(-950), &[("g1f3", Score::Centipawns(-950))]);
        // A further collapse in an already-lost position stays unflagged.
        assert!(classify(&test_ply(), &before, Score::Centipawns(2000), &cfg).is_none());

        // Without the ceiling it would be flagged.
        assert!(classify(&test_ply(), &before, Score::Centipawns(2000), &config()).is_some());
    }

    #[test]
    fn test_top_moves_truncated_and_ranked() {
        let before = evaluation(
            Score::Centipawns(10),
            &[
                ("e2e4", Score::Centipawns(10)),
                ("d2d4", Score::Centipawns(5)),
                ("g1f3", Score::Centipawns(1)),
                ("b1c3", Score::Centipawns(-4)),
            ],
        );
        let blunder = classify(&test_ply(), &before, Score::Centipawns(300), &config()).unwrap();
        assert_eq!(blunder.top_moves.len(), 3);
        assert_eq!(blunder.top_moves[0].uci, "e2e4");
        assert_eq!(blunder.top_moves[2].uci, "g1f3");
    }
}
