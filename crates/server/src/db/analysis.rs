use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::analysis::classify::Blunder;
use crate::error::AppError;

/// A stored blunder flattened out of an Analysis row's embedded list.
#[derive(Debug, Clone)]
pub struct StoredPuzzle {
    pub analysis_id: i64,
    pub game_id: i64,
    pub blunder_index: i32,
    pub blunder: Blunder,
}

/// "Has this game been analyzed": the idempotency check both the bulk and
/// interactive paths run before spending engine requests.
pub async fn analysis_exists(pool: &PgPool, game_id: i64) -> Result<bool, AppError> {
    let (exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM analyses WHERE game_id = $1)")
            .bind(game_id)
            .fetch_one(pool)
            .await
            .map_err(AppError::Sqlx)?;

    Ok(exists)
}

pub async fn analyzed_count(pool: &PgPool, user_id: i64) -> Result<i64, AppError> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM analyses WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Sqlx)?;

    Ok(count)
}

/// Write-once insert. Returns false when another writer already claimed the
/// game; the existing Analysis wins and this one is discarded.
pub async fn insert_analysis(
    pool: &PgPool,
    user_id: i64,
    game_id: i64,
    threshold_cp: i32,
    blunders: &[Blunder],
) -> Result<bool, AppError> {
    let blunders_json = serde_json::to_value(blunders)
        .map_err(|e| AppError::Internal(format!("failed to serialize blunders: {e}")))?;

    let result = sqlx::query(
        r#"INSERT INTO analyses (game_id, user_id, threshold_cp, blunders, blunder_count)
           VALUES ($1, $2, $3, $4, $5)
           ON CONFLICT (game_id) DO NOTHING"#,
    )
    .bind(game_id)
    .bind(user_id)
    .bind(threshold_cp)
    .bind(&blunders_json)
    .bind(blunders.len() as i32)
    .execute(pool)
    .await
    .map_err(AppError::Sqlx)?;

    Ok(result.rows_affected() == 1)
}

/// Every stored blunder of the user, flattened in (analysis, index) order.
pub async fn get_user_puzzles(
    pool: &PgPool,
    user_id: i64,
) -> Result<Vec<StoredPuzzle>, AppError> {
    let rows: Vec<(i64, i64, JsonValue)> = sqlx::query_as(
        r#"SELECT id, game_id, blunders
           FROM analyses
           WHERE user_id = $1 AND blunder_count > 0
           ORDER BY id"#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::Sqlx)?;

    let mut puzzles = Vec::new();
    for (analysis_id, game_id, blunders_json) in rows {
        let blunders: Vec<Blunder> = serde_json::from_value(blunders_json).map_err(|e| {
            AppError::Internal(format!("analysis {analysis_id} has invalid blunder data: {e}"))
        })?;
        for (i, blunder) in blunders.into_iter().enumerate() {
            puzzles.push(StoredPuzzle {
                analysis_id,
                game_id,
                blunder_index: i as i32,
                blunder,
            });
        }
    }

    Ok(puzzles)
}

/// One stored blunder by (analysis, index), ownership-checked.
pub async fn get_blunder(
    pool: &PgPool,
    user_id: i64,
    analysis_id: i64,
    blunder_index: i32,
) -> Result<Option<Blunder>, AppError> {
    let row: Option<(JsonValue,)> =
        sqlx::query_as("SELECT blunders FROM analyses WHERE id = $1 AND user_id = $2")
            .bind(analysis_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Sqlx)?;

    let Some((blunders_json,)) = row else {
        return Ok(None);
    };

    let mut blunders: Vec<Blunder> = serde_json::from_value(blunders_json).map_err(|e| {
        AppError::Internal(format!("analysis {analysis_id} has invalid blunder data: {e}"))
    })?;

    if blunder_index < 0 || blunder_index as usize >= blunders.len() {
        return Ok(None);
    }
    Ok(Some(blunders.swap_remove(blunder_index as usize)))
}

pub async fn blunder_total(pool: &PgPool, user_id: i64) -> Result<i64, AppError> {
    let (total,): (Option<i64>,) = sqlx::query_as(
        "SELECT SUM(blunder_count)::BIGINT FROM analyses WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(AppError::Sqlx)?;

    Ok(total.unwrap_or(0))
}
