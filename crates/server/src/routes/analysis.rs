use axum::{extract::Path, Extension, Json};
use serde_json::{json, Value as JsonValue};
use sqlx::PgPool;

use crate::analysis::orchestrator::{AnalyzeOneOutcome, Orchestrator, StartJobOutcome};
use crate::auth::AuthUser;
use crate::db;
use crate::error::AppError;

/// POST /api/analysis/jobs
/// Start a background job over the user's unanalyzed games. Returns
/// immediately with a job snapshot; `limitReached` is a normal stop, not an
/// error, and always carries the current counts.
pub async fn start_job(
    Extension(orchestrator): Extension<Orchestrator>,
    user: AuthUser,
) -> Result<Json<JsonValue>, AppError> {
    match orchestrator.start_job(user.id, user.premium).await? {
        StartJobOutcome::Started(job) => Ok(Json(json!({
            "started": true,
            "job": job_body(&job),
        }))),
        StartJobOutcome::AlreadyRunning(job) => Ok(Json(json!({
            "started": false,
            "alreadyRunning": true,
            "job": job_body(&job),
        }))),
        StartJobOutcome::LimitReached {
            analyzed_count,
            retention_limit,
        } => Ok(Json(json!({
            "started": false,
            "limitReached": true,
            "analyzedCount": analyzed_count,
            "retentionLimit": retention_limit,
        }))),
        StartJobOutcome::NoGames => Ok(Json(json!({
            "started": false,
            "message": "No unanalyzed games",
        }))),
    }
}

/// GET /api/analysis/jobs/current
/// Poll-able snapshot of the user's most recent job, terminal or not.
pub async fn job_status(
    Extension(pool): Extension<PgPool>,
    user: AuthUser,
) -> Result<Json<JsonValue>, AppError> {
    match db::jobs::latest_job(&pool, user.id).await? {
        Some(job) => {
            let mut body = json!({ "hasJob": true });
            merge(&mut body, job_body(&job));
            Ok(Json(body))
        }
        None => Ok(Json(json!({ "hasJob": false }))),
    }
}

/// POST /api/analysis/jobs/cancel
/// Cooperative stop: the in-flight batch finishes, no further batch starts.
pub async fn cancel_job(
    Extension(pool): Extension<PgPool>,
    user: AuthUser,
) -> Result<Json<JsonValue>, AppError> {
    let cancelled = db::jobs::request_cancel(&pool, user.id).await?;
    Ok(Json(json!({ "cancelRequested": cancelled })))
}

/// POST /api/games/{game_id}/analyze
/// Interactive single-game analysis ("analyze next N" flow).
pub async fn analyze_game(
    Extension(orchestrator): Extension<Orchestrator>,
    Path(game_id): Path<i64>,
    user: AuthUser,
) -> Result<Json<JsonValue>, AppError> {
    match orchestrator.analyze_one(user.id, user.premium, game_id).await? {
        AnalyzeOneOutcome::Analyzed { blunders } => Ok(Json(json!({
            "success": true,
            "alreadyAnalyzed": false,
            "blunderCount": blunders.len(),
            "blunders": blunders,
        }))),
        AnalyzeOneOutcome::AlreadyAnalyzed => Ok(Json(json!({
            "success": true,
            "alreadyAnalyzed": true,
        }))),
        AnalyzeOneOutcome::LimitReached {
            analyzed_count,
            retention_limit,
        } => Ok(Json(json!({
            "success": false,
            "limitReached": true,
            "analyzedCount": analyzed_count,
            "retentionLimit": retention_limit,
        }))),
        AnalyzeOneOutcome::Failed { error } => Ok(Json(json!({
            "success": false,
            "limitReached": false,
            "error": error,
        }))),
    }
}

fn job_body(job: &db::jobs::JobSnapshot) -> JsonValue {
    json!({
        "status": job.status.as_str(),
        "analyzedCount": job.analyzed_count,
        "totalCount": job.total_count,
        "failedCount": job.failed_count,
        "startedAt": job.started_at.map(|t| t.to_rfc3339()),
        "completedAt": job.completed_at.map(|t| t.to_rfc3339()),
        "error": job.error,
    })
}

fn merge(target: &mut JsonValue, extra: JsonValue) {
    if let (Some(target), Some(extra)) = (target.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            target.insert(k.clone(), v.clone());
        }
    }
}
