use sqlx::PgPool;

use chess_core::game_data::{GameRecord, Side};

use crate::error::AppError;

/// Page size for game-id listing; the store caps page size, so the full
/// unanalyzed set is assembled page by page.
const PAGE_SIZE: i64 = 500;

/// Fetch one game owned by the user, as the decoder consumes it.
pub async fn fetch_game(
    pool: &PgPool,
    user_id: i64,
    game_id: i64,
) -> Result<Option<GameRecord>, AppError> {
    let row: Option<(i64, String, String)> = sqlx::query_as(
        "SELECT id, movetext, user_color FROM user_games WHERE id = $1 AND user_id = $2",
    )
    .bind(game_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::Sqlx)?;

    match row {
        None => Ok(None),
        Some((id, movetext, color)) => {
            let user_color = Side::parse(&color).ok_or_else(|| {
                AppError::Internal(format!("game {id} has invalid user_color {color:?}"))
            })?;
            Ok(Some(GameRecord {
                id,
                movetext,
                user_color,
            }))
        }
    }
}

/// All game ids of the user with no Analysis row yet, in import order.
/// An Analysis written by any path (bulk or interactive) excludes the game.
pub async fn unanalyzed_game_ids(pool: &PgPool, user_id: i64) -> Result<Vec<i64>, AppError> {
    let mut ids = Vec::new();
    let mut offset = 0i64;

    loop {
        let page: Vec<(i64,)> = sqlx::query_as(
            r#"SELECT g.id
               FROM user_games g
               LEFT JOIN analyses a ON a.game_id = g.id
               WHERE g.user_id = $1 AND a.id IS NULL
               ORDER BY g.id
               LIMIT $2 OFFSET $3"#,
        )
        .bind(user_id)
        .bind(PAGE_SIZE)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(AppError::Sqlx)?;

        let page_len = page.len();
        ids.extend(page.into_iter().map(|(id,)| id));

        if (page_len as i64) < PAGE_SIZE {
            return Ok(ids);
        }
        offset += PAGE_SIZE;
    }
}
