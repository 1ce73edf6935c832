use sqlx::PgPool;

use crate::error::AppError;

/// Count one engine request. Many in-flight evaluator calls race on the
/// same row, so the increment is a single atomic statement, never a
/// read-modify-write in application code.
pub async fn increment(pool: &PgPool, user_id: i64) -> Result<(), AppError> {
    sqlx::query(
        r#"INSERT INTO engine_usage (user_id, day, requests)
           VALUES ($1, CURRENT_DATE, 1)
           ON CONFLICT (user_id, day) DO UPDATE SET
               requests = engine_usage.requests + 1"#,
    )
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(AppError::Sqlx)?;
    Ok(())
}

/// Today's request count for the user; the counter resets daily by keying
/// on the date.
pub async fn today(pool: &PgPool, user_id: i64) -> Result<i64, AppError> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT requests FROM engine_usage WHERE user_id = $1 AND day = CURRENT_DATE",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::Sqlx)?;

    Ok(row.map(|(r,)| r).unwrap_or(0))
}
