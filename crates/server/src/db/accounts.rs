use sqlx::PgPool;

use crate::error::AppError;

/// The slice of an account the analysis core reads.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub premium: bool,
    pub current_practice_run: i32,
}

pub async fn fetch_account(pool: &PgPool, user_id: i64) -> Result<Option<Account>, AppError> {
    let account = sqlx::query_as::<_, Account>(
        "SELECT id, username, premium, current_practice_run FROM accounts WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::Sqlx)?;

    Ok(account)
}

/// Start a new practice run: a single atomic read-increment-write.
/// Returns the new run number.
pub async fn bump_practice_run(pool: &PgPool, user_id: i64) -> Result<i32, AppError> {
    let (run,): (i32,) = sqlx::query_as(
        r#"UPDATE accounts
           SET current_practice_run = current_practice_run + 1
           WHERE id = $1
           RETURNING current_practice_run"#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(AppError::Sqlx)?;

    Ok(run)
}
