//! Gateway-trust user extraction.
//!
//! Authentication lives in the upstream product gateway; it forwards the
//! authenticated account id in the `x-user-id` header. This service only
//! verifies the account exists and loads the tier and practice-run state
//! the pipeline needs.

use axum::{extract::FromRequestParts, http::request::Parts};
use sqlx::PgPool;

use crate::db;
use crate::error::AppError;

/// Authenticated account, loaded fresh per request.
/// Use as an extractor in route handlers.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub premium: bool,
    pub current_practice_run: i32,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let pool = parts
            .extensions
            .get::<PgPool>()
            .ok_or(AppError::Internal("Missing database pool".into()))?
            .clone();

        let user_id: i64 = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or(AppError::Unauthorized)?;

        let account = db::accounts::fetch_account(&pool, user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(AuthUser {
            id: account.id,
            premium: account.premium,
            current_practice_run: account.current_practice_run,
        })
    }
}
