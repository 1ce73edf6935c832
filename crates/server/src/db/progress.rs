use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::AppError;

/// Practice progress for one puzzle within one run.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProgressRow {
    pub analysis_id: i64,
    pub blunder_index: i32,
    pub solved: bool,
    pub solved_rank: Option<i32>,
    pub attempts: i32,
    pub solved_at: Option<DateTime<Utc>>,
}

/// Record one attempt: attempts always increment; solved fields are set
/// only by the first correct attempt. `solved_rank` is Some iff the attempt
/// was correct.
pub async fn record_attempt(
    pool: &PgPool,
    user_id: i64,
    analysis_id: i64,
    blunder_index: i32,
    practice_run: i32,
    solved_rank: Option<i32>,
) -> Result<ProgressRow, AppError> {
    let solved = solved_rank.is_some();

    let row = sqlx::query_as::<_, ProgressRow>(
        r#"INSERT INTO user_progress
               (user_id, analysis_id, blunder_index, practice_run,
                attempts, solved, solved_rank, last_attempt_at, solved_at)
           VALUES ($1, $2, $3, $4, 1, $5, $6, NOW(), CASE WHEN $5 THEN NOW() END)
           ON CONFLICT (user_id, analysis_id, blunder_index, practice_run) DO UPDATE SET
               attempts = user_progress.attempts + 1,
               solved = user_progress.solved OR EXCLUDED.solved,
               solved_rank = COALESCE(user_progress.solved_rank, EXCLUDED.solved_rank),
               solved_at = COALESCE(user_progress.solved_at, EXCLUDED.solved_at),
               last_attempt_at = NOW()
           RETURNING analysis_id, blunder_index, solved, solved_rank, attempts, solved_at"#,
    )
    .bind(user_id)
    .bind(analysis_id)
    .bind(blunder_index)
    .bind(practice_run)
    .bind(solved)
    .bind(solved_rank)
    .fetch_one(pool)
    .await
    .map_err(AppError::Sqlx)?;

    Ok(row)
}

/// Progress for the user's current pass, keyed by (analysis, index).
/// Rows with NULL practice_run predate runs and still count.
pub async fn run_progress(
    pool: &PgPool,
    user_id: i64,
    practice_run: i32,
) -> Result<HashMap<(i64, i32), ProgressRow>, AppError> {
    let rows = sqlx::query_as::<_, ProgressRow>(
        r#"SELECT analysis_id, blunder_index, solved, solved_rank, attempts, solved_at
           FROM user_progress
           WHERE user_id = $1 AND (practice_run = $2 OR practice_run IS NULL)"#,
    )
    .bind(user_id)
    .bind(practice_run)
    .fetch_all(pool)
    .await
    .map_err(AppError::Sqlx)?;

    Ok(rows
        .into_iter()
        .map(|row| ((row.analysis_id, row.blunder_index), row))
        .collect())
}

/// Ranks of the current run's solves, in solve order. Streaks derive from
/// this on read.
pub async fn solved_ranks_in_run(
    pool: &PgPool,
    user_id: i64,
    practice_run: i32,
) -> Result<Vec<Option<i32>>, AppError> {
    let rows: Vec<(Option<i32>,)> = sqlx::query_as(
        r#"SELECT solved_rank
           FROM user_progress
           WHERE user_id = $1 AND solved AND (practice_run = $2 OR practice_run IS NULL)
           ORDER BY solved_at"#,
    )
    .bind(user_id)
    .bind(practice_run)
    .fetch_all(pool)
    .await
    .map_err(AppError::Sqlx)?;

    Ok(rows.into_iter().map(|(rank,)| rank).collect())
}
