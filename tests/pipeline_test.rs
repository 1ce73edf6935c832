//! Integration tests: run real miniature games through the decode →
//! classify → practice pipeline with canned engine evaluations.
//!
//! No database or engine service required; these exercise the pure seams
//! the orchestrator is built from.

use chess_core::game_data::Side;
use chess_core::replay::{GameReplay, Ply};

use server::analysis::classify::{classify, ClassifyConfig};
use server::analysis::orchestrator::TierLimits;
use server::analysis::practice::{compute_streaks, score_attempt, AttemptRank, Streaks};
use server::analysis::score::Score;
use server::clients::engine::{CandidateLine, Evaluation};
use server::config::AnalysisConfig;

const SCHOLARS_MATE: &str = "1. e4 e5 2. Qh5 Nc6 3. Bc4 Nf6 4. Qxf7# 1-0";

fn classify_config() -> ClassifyConfig {
    ClassifyConfig {
        threshold_cp: 100,
        lost_position_ceiling_cp: None,
        top_moves_kept: 3,
    }
}

fn analysis_config() -> AnalysisConfig {
    AnalysisConfig {
        blunder_threshold_cp: 100,
        lost_position_ceiling_cp: None,
        candidate_moves: 3,
        batch_size: 5,
        free_max_depth: 12,
        premium_max_depth: 25,
        free_retention_limit: 100,
        daily_engine_request_limit: None,
    }
}

fn evaluation(candidates: &[(&str, Score)]) -> Evaluation {
    let candidates: Vec<CandidateLine> = candidates
        .iter()
        .map(|(uci, score)| CandidateLine {
            uci: uci.to_string(),
            score: *score,
            continuation: vec![uci.to_string()],
        })
        .collect();
    Evaluation {
        score: candidates[0].score,
        candidates,
    }
}

/// Replay the scholar's mate as the losing (black) user and flag the
/// mate-allowing move with canned engine output.
#[test]
fn test_scholars_mate_blunder_flagged_for_black_user() {
    let replay = GameReplay::new(SCHOLARS_MATE, Side::Black).unwrap();
    let plies: Vec<Ply> = replay.plies().collect::<Result<_, _>>().unwrap();

    // Only black's plies go to the evaluator.
    let user_plies: Vec<&Ply> = plies.iter().filter(|p| p.is_user_move).collect();
    assert_eq!(user_plies.len(), 3);

    // 3... Nf6?? is black's final ply; the defense was forced.
    let fatal = user_plies[2];
    assert_eq!(fatal.san, "Nf6");
    assert_eq!(fatal.uci, "g8f6");

    let before = evaluation(&[
        ("d8e7", Score::Centipawns(-30)),
        ("g7g6", Score::Centipawns(-35)),
        ("d7d6", Score::Centipawns(-60)),
    ]);
    // After Nf6 it is white to move with mate on the board.
    let after = Score::MateIn(1);

    let blunder = classify(fatal, &before, after, &classify_config())
        .expect("allowing mate in one crosses any threshold");

    assert_eq!(blunder.ply, 5);
    assert_eq!(blunder.move_number, 3);
    assert_eq!(blunder.move_played, "g8f6");
    assert_eq!(blunder.best_move, "d8e7");
    assert_eq!(blunder.eval_before_cp, -30);
    assert_eq!(blunder.eval_after_cp, -10_000);
    assert_eq!(blunder.eval_drop_cp, 9_970);
    assert_eq!(blunder.top_moves.len(), 3);
}

/// A quiet move with a small drift stays unflagged.
#[test]
fn test_quiet_move_not_flagged() {
    let replay = GameReplay::new(SCHOLARS_MATE, Side::Black).unwrap();
    let plies: Vec<Ply> = replay.plies().collect::<Result<_, _>>().unwrap();
    let first_black = plies.iter().find(|p| p.is_user_move).unwrap();
    assert_eq!(first_black.san, "e5");

    let before = evaluation(&[("e7e5", Score::Centipawns(-20))]);
    // White keeps a nominal edge; 30cp of drift is no blunder.
    let after = Score::Centipawns(50);

    assert!(classify(first_black, &before, after, &classify_config()).is_none());
}

/// The stored blunder feeds practice scoring: second-best counts, off-list
/// moves do not, and the legacy fallback still recognizes the best move.
#[test]
fn test_practice_scoring_against_stored_blunder() {
    let replay = GameReplay::new(SCHOLARS_MATE, Side::Black).unwrap();
    let plies: Vec<Ply> = replay.plies().collect::<Result<_, _>>().unwrap();
    let fatal = plies.iter().filter(|p| p.is_user_move).nth(2).unwrap();

    let before = evaluation(&[
        ("d8e7", Score::Centipawns(-30)),
        ("g7g6", Score::Centipawns(-35)),
        ("d7d6", Score::Centipawns(-60)),
    ]);
    let blunder = classify(fatal, &before, Score::MateIn(1), &classify_config()).unwrap();

    assert_eq!(score_attempt(&blunder, "d8e7"), AttemptRank::Best);

    let second = score_attempt(&blunder, "g7g6");
    assert_eq!(second, AttemptRank::Second);
    assert!(second.is_correct());
    assert_eq!(second.rank(), Some(2));

    // Repeating the original mistake scores nothing.
    let wrong = score_attempt(&blunder, "g8f6");
    assert_eq!(wrong, AttemptRank::Wrong);
    assert!(!wrong.is_correct());
    assert_eq!(wrong.rank(), None);

    let mut legacy = blunder.clone();
    legacy.top_moves.clear();
    assert_eq!(score_attempt(&legacy, "d8e7"), AttemptRank::Best);
    assert_eq!(score_attempt(&legacy, "g7g6"), AttemptRank::Wrong);
}

/// Retention enforcement arithmetic: at the cap nothing proceeds, below it
/// the unanalyzed set is truncated.
#[test]
fn test_free_tier_retention_truncation() {
    let tier = TierLimits::for_account(&analysis_config(), false);

    assert_eq!(tier.remaining(100), Some(0));

    let mut unanalyzed: Vec<i64> = (1..=40).collect();
    let remaining = tier.remaining(95).unwrap();
    unanalyzed.truncate(remaining as usize);
    assert_eq!(unanalyzed.len(), 5);

    let premium = TierLimits::for_account(&analysis_config(), true);
    assert_eq!(premium.remaining(100), None);
}

/// Streaks derive from solve order within the run.
#[test]
fn test_streak_derivation() {
    let solves = [Some(1), Some(1), Some(3), Some(1), Some(1)];
    assert_eq!(compute_streaks(&solves), Streaks { current: 2, best: 2 });

    let perfect = [Some(1); 4];
    assert_eq!(compute_streaks(&perfect), Streaks { current: 4, best: 4 });
}

/// Swapping which side is "the user" negates the drop: the same evaluation
/// pair seen from the other side has both signs flipped.
#[test]
fn test_drop_antisymmetry_under_side_swap() {
    use server::analysis::classify::eval_drop;

    let before = Score::Centipawns(50);
    let after = Score::Centipawns(380);

    let as_user = eval_drop(before, after);
    let as_opponent = eval_drop(Score::Centipawns(-50), Score::Centipawns(-380));

    assert_eq!(as_user, 430);
    assert_eq!(as_opponent, -430);
}
