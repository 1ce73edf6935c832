use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::error::AppError;

/// AnalysisJob state machine: pending → running → {completed | failed}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: i64,
    pub user_id: i64,
    pub status: JobStatus,
    pub total_count: i32,
    pub analyzed_count: i32,
    pub failed_count: i32,
    pub error: Option<String>,
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

type JobRow = (
    i64,
    i64,
    String,
    i32,
    i32,
    i32,
    Option<String>,
    bool,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
);

const JOB_COLUMNS: &str = "id, user_id, status, total_count, analyzed_count, failed_count, \
                           error, cancel_requested, created_at, started_at, completed_at";

fn snapshot_from_row(row: JobRow) -> Result<JobSnapshot, AppError> {
    let (
        id,
        user_id,
        status,
        total_count,
        analyzed_count,
        failed_count,
        error,
        cancel_requested,
        created_at,
        started_at,
        completed_at,
    ) = row;

    let status = JobStatus::parse(&status)
        .ok_or_else(|| AppError::Internal(format!("job {id} has unknown status {status:?}")))?;

    Ok(JobSnapshot {
        id,
        user_id,
        status,
        total_count,
        analyzed_count,
        failed_count,
        error,
        cancel_requested,
        created_at,
        started_at,
        completed_at,
    })
}

/// Atomically claim the one non-terminal job slot for the user.
/// Returns None when another non-terminal job already holds it.
pub async fn try_create(
    pool: &PgPool,
    user_id: i64,
    total_count: i32,
) -> Result<Option<JobSnapshot>, AppError> {
    let row: Option<JobRow> = sqlx::query_as(&format!(
        r#"INSERT INTO analysis_jobs (user_id, status, total_count)
           VALUES ($1, 'pending', $2)
           ON CONFLICT (user_id) WHERE status IN ('pending', 'running') DO NOTHING
           RETURNING {JOB_COLUMNS}"#
    ))
    .bind(user_id)
    .bind(total_count)
    .fetch_optional(pool)
    .await
    .map_err(AppError::Sqlx)?;

    row.map(snapshot_from_row).transpose()
}

/// The user's current non-terminal job, if any.
pub async fn active_job(pool: &PgPool, user_id: i64) -> Result<Option<JobSnapshot>, AppError> {
    let row: Option<JobRow> = sqlx::query_as(&format!(
        r#"SELECT {JOB_COLUMNS} FROM analysis_jobs
           WHERE user_id = $1 AND status IN ('pending', 'running')"#
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::Sqlx)?;

    row.map(snapshot_from_row).transpose()
}

/// The most recent job for the user regardless of terminal state; this is
/// what the status poll reports.
pub async fn latest_job(pool: &PgPool, user_id: i64) -> Result<Option<JobSnapshot>, AppError> {
    let row: Option<JobRow> = sqlx::query_as(&format!(
        r#"SELECT {JOB_COLUMNS} FROM analysis_jobs
           WHERE user_id = $1
           ORDER BY created_at DESC, id DESC
           LIMIT 1"#
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::Sqlx)?;

    row.map(snapshot_from_row).transpose()
}

pub async fn mark_running(pool: &PgPool, job_id: i64) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE analysis_jobs SET status = 'running', started_at = NOW() WHERE id = $1",
    )
    .bind(job_id)
    .execute(pool)
    .await
    .map_err(AppError::Sqlx)?;
    Ok(())
}

/// Persist counters mid-job so a crashed process leaves an accurate partial
/// count rather than losing work silently.
pub async fn update_progress(
    pool: &PgPool,
    job_id: i64,
    analyzed_count: i32,
    failed_count: i32,
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE analysis_jobs SET analyzed_count = $2, failed_count = $3 WHERE id = $1",
    )
    .bind(job_id)
    .bind(analyzed_count)
    .bind(failed_count)
    .execute(pool)
    .await
    .map_err(AppError::Sqlx)?;
    Ok(())
}

pub async fn mark_completed(pool: &PgPool, job_id: i64) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE analysis_jobs SET status = 'completed', completed_at = NOW() WHERE id = $1",
    )
    .bind(job_id)
    .execute(pool)
    .await
    .map_err(AppError::Sqlx)?;
    Ok(())
}

pub async fn mark_failed(pool: &PgPool, job_id: i64, error: &str) -> Result<(), AppError> {
    sqlx::query(
        r#"UPDATE analysis_jobs
           SET status = 'failed', error = $2, completed_at = NOW()
           WHERE id = $1"#,
    )
    .bind(job_id)
    .bind(error)
    .execute(pool)
    .await
    .map_err(AppError::Sqlx)?;
    Ok(())
}

/// Cooperative stop: flag the user's active job; the runner checks the flag
/// between batches. Returns false when there is nothing to cancel.
pub async fn request_cancel(pool: &PgPool, user_id: i64) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"UPDATE analysis_jobs SET cancel_requested = TRUE
           WHERE user_id = $1 AND status IN ('pending', 'running')"#,
    )
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(AppError::Sqlx)?;

    Ok(result.rows_affected() > 0)
}

pub async fn cancel_requested(pool: &PgPool, job_id: i64) -> Result<bool, AppError> {
    let (requested,): (bool,) =
        sqlx::query_as("SELECT cancel_requested FROM analysis_jobs WHERE id = $1")
            .bind(job_id)
            .fetch_one(pool)
            .await
            .map_err(AppError::Sqlx)?;

    Ok(requested)
}

/// Sweep jobs orphaned by a dead process. Their in-flight loop state is
/// gone; persisted progress plus a fresh unanalyzed-game listing is the
/// recovery path, so the rows just get a terminal marker.
pub async fn fail_orphaned(pool: &PgPool) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"UPDATE analysis_jobs
           SET status = 'failed', error = 'interrupted by restart', completed_at = NOW()
           WHERE status IN ('pending', 'running')"#,
    )
    .execute(pool)
    .await
    .map_err(AppError::Sqlx)?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("paused"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
