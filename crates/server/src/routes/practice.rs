use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use sqlx::PgPool;

use crate::analysis::practice;
use crate::auth::AuthUser;
use crate::db;
use crate::error::AppError;

/// GET /api/practice/puzzles
/// The user's blunder puzzles with progress scoped to the current practice
/// run (legacy rows without a run number still count).
pub async fn get_puzzles(
    Extension(pool): Extension<PgPool>,
    user: AuthUser,
) -> Result<Json<JsonValue>, AppError> {
    let puzzles = db::analysis::get_user_puzzles(&pool, user.id).await?;
    let progress = db::progress::run_progress(&pool, user.id, user.current_practice_run).await?;

    let total = puzzles.len();
    let mut solved_count = 0usize;
    let mut items = Vec::with_capacity(total);

    for puzzle in &puzzles {
        let row = progress.get(&(puzzle.analysis_id, puzzle.blunder_index));
        let solved = row.map(|r| r.solved).unwrap_or(false);
        if solved {
            solved_count += 1;
        }

        // The solution stays server-side until the puzzle is solved.
        items.push(json!({
            "analysisId": puzzle.analysis_id,
            "gameId": puzzle.game_id,
            "blunderIndex": puzzle.blunder_index,
            "fen": puzzle.blunder.fen_before,
            "moveNumber": puzzle.blunder.move_number,
            "movePlayed": puzzle.blunder.move_played_san,
            "evalDropCp": puzzle.blunder.eval_drop_cp,
            "solved": solved,
            "attempts": row.map(|r| r.attempts).unwrap_or(0),
        }));
    }

    let solves = db::progress::solved_ranks_in_run(&pool, user.id, user.current_practice_run)
        .await?;
    let streaks = practice::compute_streaks(&solves);

    Ok(Json(json!({
        "puzzles": items,
        "total": total,
        "solved": solved_count,
        "completionPct": if total > 0 { solved_count * 100 / total } else { 0 },
        "practiceRun": user.current_practice_run,
        "currentStreak": streaks.current,
        "bestStreak": streaks.best,
    })))
}

#[derive(Deserialize)]
pub struct AttemptRequest {
    pub analysis_id: i64,
    pub blunder_index: i32,
    pub move_uci: String,
}

/// POST /api/practice/attempts
/// Score one attempt against the stored blunder. Every attempt is recorded;
/// a wrong one keeps the user on the same puzzle.
pub async fn submit_attempt(
    Extension(pool): Extension<PgPool>,
    user: AuthUser,
    Json(body): Json<AttemptRequest>,
) -> Result<Json<JsonValue>, AppError> {
    let attempt = body.move_uci.trim();
    if attempt.is_empty() {
        return Err(AppError::BadRequest("move_uci must not be empty".into()));
    }

    let blunder = db::analysis::get_blunder(&pool, user.id, body.analysis_id, body.blunder_index)
        .await?
        .ok_or_else(|| AppError::NotFound("Puzzle not found".into()))?;

    let rank = practice::score_attempt(&blunder, attempt);
    let row = db::progress::record_attempt(
        &pool,
        user.id,
        body.analysis_id,
        body.blunder_index,
        user.current_practice_run,
        rank.rank(),
    )
    .await?;

    tracing::info!(
        user_id = user.id,
        analysis_id = body.analysis_id,
        blunder_index = body.blunder_index,
        correct = rank.is_correct(),
        "Practice attempt scored"
    );

    Ok(Json(json!({
        "correct": rank.is_correct(),
        "rank": rank.rank(),
        "feedback": rank.feedback(),
        "bestMove": if rank.is_correct() { Some(blunder.best_move.as_str()) } else { None },
        "attempts": row.attempts,
        "solved": row.solved,
        "advance": rank.is_correct(),
    })))
}

/// POST /api/practice/runs
/// Start a new practice run: one atomic epoch bump. Prior progress rows are
/// kept; they just stop being "current".
pub async fn start_run(
    Extension(pool): Extension<PgPool>,
    user: AuthUser,
) -> Result<Json<JsonValue>, AppError> {
    let run = db::accounts::bump_practice_run(&pool, user.id).await?;
    let puzzle_count = db::analysis::blunder_total(&pool, user.id).await?;

    tracing::info!(user_id = user.id, run, "Started new practice run");

    Ok(Json(json!({
        "practiceRun": run,
        "puzzleCount": puzzle_count,
    })))
}
