//! Analysis job orchestration.
//!
//! Turns "analyze everything I haven't" into a resumable, rate-limited,
//! concurrency-bounded background job with persisted progress, and hosts
//! the single-game interactive entry point. The triggering request only
//! claims a job row and returns; the job body runs detached, and the only
//! durable truth it leaves behind is what it persisted. Recovery after a
//! crash is a fresh job: re-listing unanalyzed games naturally excludes
//! every Analysis already written.

use futures::future::join_all;
use sqlx::PgPool;
use tracing::{error, info, warn};

use chess_core::replay::{GameReplay, Ply};

use crate::analysis::classify::{self, Blunder, ClassifyConfig};
use crate::clients::engine::EngineClient;
use crate::config::AnalysisConfig;
use crate::db;
use crate::db::jobs::JobSnapshot;
use crate::error::AppError;

/// Per-tier analysis caps. `retention_limit` of None means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    pub max_depth: u32,
    pub retention_limit: Option<i64>,
}

impl TierLimits {
    pub fn for_account(config: &AnalysisConfig, premium: bool) -> Self {
        if premium {
            Self {
                max_depth: config.premium_max_depth,
                retention_limit: None,
            }
        } else {
            Self {
                max_depth: config.free_max_depth,
                retention_limit: Some(config.free_retention_limit),
            }
        }
    }

    /// How many more games this account may analyze; None = unlimited.
    pub fn remaining(&self, already_analyzed: i64) -> Option<i64> {
        self.retention_limit
            .map(|limit| (limit - already_analyzed).max(0))
    }
}

pub enum StartJobOutcome {
    Started(JobSnapshot),
    /// A non-terminal job already exists; creation is an idempotent no-op
    /// returning it.
    AlreadyRunning(JobSnapshot),
    /// Retention cap hit before any engine call. A normal stop condition,
    /// reported with counts so the caller can show "87 of 100 analyzed".
    LimitReached {
        analyzed_count: i64,
        retention_limit: i64,
    },
    NoGames,
}

pub enum AnalyzeOneOutcome {
    Analyzed { blunders: Vec<Blunder> },
    AlreadyAnalyzed,
    LimitReached {
        analyzed_count: i64,
        retention_limit: i64,
    },
    /// Every attempted evaluation failed; the game stays unanalyzed and a
    /// later run retries it.
    Failed { error: String },
}

/// Outcome of one game inside a job.
enum GameOutcome {
    Analyzed { blunders: Vec<Blunder> },
    /// Raced with another writer (interactive analysis, usually); the
    /// existing Analysis wins and nothing is lost.
    AlreadyAnalyzed,
    EvaluationFailed,
}

#[derive(Clone)]
pub struct Orchestrator {
    pool: PgPool,
    engine: EngineClient,
    config: AnalysisConfig,
}

impl Orchestrator {
    pub fn new(pool: PgPool, engine: EngineClient, config: AnalysisConfig) -> Self {
        Self {
            pool,
            engine,
            config,
        }
    }

    fn classify_config(&self) -> ClassifyConfig {
        ClassifyConfig {
            threshold_cp: self.config.blunder_threshold_cp,
            lost_position_ceiling_cp: self.config.lost_position_ceiling_cp,
            top_moves_kept: self.config.candidate_moves as usize,
        }
    }

    /// Start a bulk job for the user's unanalyzed games. Fire and continue:
    /// the snapshot returns immediately, the body runs detached.
    pub async fn start_job(
        &self,
        user_id: i64,
        premium: bool,
    ) -> Result<StartJobOutcome, AppError> {
        let tier = TierLimits::for_account(&self.config, premium);
        let analyzed = db::analysis::analyzed_count(&self.pool, user_id).await?;

        let remaining = tier.remaining(analyzed);
        if remaining == Some(0) {
            info!(user_id, analyzed, "Retention limit reached, not starting job");
            return Ok(StartJobOutcome::LimitReached {
                analyzed_count: analyzed,
                retention_limit: tier.retention_limit.unwrap_or(0),
            });
        }

        let mut game_ids = db::games::unanalyzed_game_ids(&self.pool, user_id).await?;
        if let Some(remaining) = remaining {
            game_ids.truncate(remaining as usize);
        }
        if game_ids.is_empty() {
            return Ok(StartJobOutcome::NoGames);
        }

        let Some(job) = db::jobs::try_create(&self.pool, user_id, game_ids.len() as i32).await?
        else {
            let existing = db::jobs::active_job(&self.pool, user_id)
                .await?
                .ok_or_else(|| {
                    AppError::Internal("job claim lost but no active job found".into())
                })?;
            info!(user_id, job_id = existing.id, "Job already running, returning it");
            return Ok(StartJobOutcome::AlreadyRunning(existing));
        };

        info!(
            user_id,
            job_id = job.id,
            total = game_ids.len(),
            depth = tier.max_depth,
            "Starting analysis job"
        );

        let runner = self.clone();
        let job_id = job.id;
        let depth = tier.max_depth;
        tokio::spawn(async move {
            if let Err(e) = runner.run_job(job_id, user_id, depth, &game_ids).await {
                // The only alarming case: something escaped the batch loop.
                error!(job_id, error = %e, "Analysis job failed");
                let _ = db::jobs::mark_failed(&runner.pool, job_id, &e.to_string()).await;
            }
        });

        Ok(StartJobOutcome::Started(job))
    }

    async fn run_job(
        &self,
        job_id: i64,
        user_id: i64,
        depth: u32,
        game_ids: &[i64],
    ) -> Result<(), AppError> {
        db::jobs::mark_running(&self.pool, job_id).await?;

        let mut analyzed = 0i32;
        let mut failed = 0i32;

        for batch in game_ids.chunks(self.config.batch_size.max(1)) {
            // Cooperative stop: in-flight work finishes, no new batch starts.
            if db::jobs::cancel_requested(&self.pool, job_id).await? {
                info!(job_id, analyzed, failed, "Cancel requested, stopping job");
                break;
            }

            if let Some(cap) = self.config.daily_engine_request_limit {
                let used = db::usage::today(&self.pool, user_id).await?;
                if used >= cap {
                    warn!(job_id, user_id, used, cap, "Daily engine cap reached, stopping job");
                    break;
                }
            }

            // All-settled: every game gets its own task and every result is
            // awaited; one game's failure or panic never cancels siblings.
            let handles: Vec<_> = batch
                .iter()
                .map(|&game_id| {
                    let runner = self.clone();
                    tokio::spawn(
                        async move { runner.analyze_game(user_id, game_id, depth).await },
                    )
                })
                .collect();

            for (&game_id, joined) in batch.iter().zip(join_all(handles).await) {
                match joined {
                    Ok(Ok(GameOutcome::Analyzed { blunders })) => {
                        analyzed += 1;
                        info!(job_id, game_id, blunder_count = blunders.len(), "Game analyzed");
                    }
                    Ok(Ok(GameOutcome::AlreadyAnalyzed)) => {
                        analyzed += 1;
                    }
                    Ok(Ok(GameOutcome::EvaluationFailed)) => {
                        failed += 1;
                        warn!(job_id, game_id, "Game failed: no position could be evaluated");
                    }
                    Ok(Err(e)) => {
                        failed += 1;
                        warn!(job_id, game_id, error = %e, "Game failed");
                    }
                    Err(e) => {
                        failed += 1;
                        error!(job_id, game_id, error = %e, "Game task panicked");
                    }
                }
            }

            // Progress lands after every batch, so a crashed process leaves
            // an accurate partial count.
            db::jobs::update_progress(&self.pool, job_id, analyzed, failed).await?;
        }

        // Per-game failures are an outcome, not a job failure.
        db::jobs::mark_completed(&self.pool, job_id).await?;
        info!(job_id, analyzed, failed, "Analysis job complete");
        Ok(())
    }

    /// Interactive single-game entry point. Same idempotency check and tier
    /// caps as the bulk path; `LimitReached` is distinct from failure so
    /// the caller stops requesting more work instead of retrying.
    pub async fn analyze_one(
        &self,
        user_id: i64,
        premium: bool,
        game_id: i64,
    ) -> Result<AnalyzeOneOutcome, AppError> {
        if db::analysis::analysis_exists(&self.pool, game_id).await? {
            return Ok(AnalyzeOneOutcome::AlreadyAnalyzed);
        }

        let tier = TierLimits::for_account(&self.config, premium);
        let analyzed = db::analysis::analyzed_count(&self.pool, user_id).await?;
        if tier.remaining(analyzed) == Some(0) {
            return Ok(AnalyzeOneOutcome::LimitReached {
                analyzed_count: analyzed,
                retention_limit: tier.retention_limit.unwrap_or(0),
            });
        }

        match self.analyze_game(user_id, game_id, tier.max_depth).await? {
            GameOutcome::Analyzed { blunders } => Ok(AnalyzeOneOutcome::Analyzed { blunders }),
            GameOutcome::AlreadyAnalyzed => Ok(AnalyzeOneOutcome::AlreadyAnalyzed),
            GameOutcome::EvaluationFailed => Ok(AnalyzeOneOutcome::Failed {
                error: "no position could be evaluated".to_string(),
            }),
        }
    }

    /// Decode → evaluate-before → evaluate-after → classify, for every ply
    /// the user was on move.
    async fn analyze_game(
        &self,
        user_id: i64,
        game_id: i64,
        depth: u32,
    ) -> Result<GameOutcome, AppError> {
        if db::analysis::analysis_exists(&self.pool, game_id).await? {
            return Ok(GameOutcome::AlreadyAnalyzed);
        }

        let game = db::games::fetch_game(&self.pool, user_id, game_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Game {game_id} not found")))?;

        let classify_config = self.classify_config();

        // A malformed record is a data problem, not a transient one: store
        // an empty analysis so no future job re-attempts it.
        let plies: Vec<Ply> = match GameReplay::new(&game.movetext, game.user_color) {
            Ok(replay) => match replay.plies().collect::<Result<Vec<Ply>, _>>() {
                Ok(plies) => plies,
                Err(e) => {
                    warn!(game_id, error = %e, "Malformed game record, storing empty analysis");
                    return self
                        .store_analysis(user_id, game_id, &classify_config, vec![])
                        .await;
                }
            },
            Err(e) => {
                warn!(game_id, error = %e, "Malformed game record, storing empty analysis");
                return self
                    .store_analysis(user_id, game_id, &classify_config, vec![])
                    .await;
            }
        };

        let mut blunders: Vec<Blunder> = Vec::new();
        let mut user_plies = 0u32;
        let mut skipped_plies = 0u32;

        for ply in plies.iter().filter(|p| p.is_user_move) {
            user_plies += 1;

            let before = match self
                .engine
                .evaluate(
                    &self.pool,
                    user_id,
                    &ply.fen_before,
                    depth,
                    self.config.candidate_moves,
                )
                .await
            {
                Ok(eval) => eval,
                Err(e) => {
                    skipped_plies += 1;
                    warn!(game_id, ply = ply.ply, error = %e, "Evaluation failed, skipping ply");
                    continue;
                }
            };

            // Only the score is consumed after the move; one line suffices.
            let after = match self
                .engine
                .evaluate(&self.pool, user_id, &ply.fen_after, depth, 1)
                .await
            {
                Ok(eval) => eval,
                Err(e) => {
                    skipped_plies += 1;
                    warn!(game_id, ply = ply.ply, error = %e, "Evaluation failed, skipping ply");
                    continue;
                }
            };

            if let Some(blunder) = classify::classify(ply, &before, after.score, &classify_config)
            {
                info!(
                    game_id,
                    ply = ply.ply,
                    drop = blunder.eval_drop_cp,
                    "Blunder flagged"
                );
                blunders.push(blunder);
            }
        }

        if user_plies > 0 && skipped_plies >= user_plies {
            // Storing an analysis here would be indistinguishable from a
            // clean game; leave the game unanalyzed for a later retry and
            // let the per-game failure count surface the difference.
            return Ok(GameOutcome::EvaluationFailed);
        }

        self.store_analysis(user_id, game_id, &classify_config, blunders)
            .await
    }

    async fn store_analysis(
        &self,
        user_id: i64,
        game_id: i64,
        classify_config: &ClassifyConfig,
        blunders: Vec<Blunder>,
    ) -> Result<GameOutcome, AppError> {
        let inserted = db::analysis::insert_analysis(
            &self.pool,
            user_id,
            game_id,
            classify_config.threshold_cp,
            &blunders,
        )
        .await?;

        if inserted {
            Ok(GameOutcome::Analyzed { blunders })
        } else {
            Ok(GameOutcome::AlreadyAnalyzed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AnalysisConfig {
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

    #[test]
    fn test_tier_limits_by_account() {
        let free = TierLimits::for_account(&config(), false);
        assert_eq!(free.max_depth, 12);
        assert_eq!(free.retention_limit, Some(100));

        let premium = TierLimits::for_account(&config(), true);
        assert_eq!(premium.max_depth, 25);
        assert_eq!(premium.retention_limit, None);
    }

    #[test]
    fn test_retention_remaining() {
        let free = TierLimits::for_account(&config(), false);
        assert_eq!(free.remaining(0), Some(100));
        assert_eq!(free.remaining(95), Some(5));
        assert_eq!(free.remaining(100), Some(0));
        // Over-limit history never goes negative.
        assert_eq!(free.remaining(130), Some(0));

        let premium = TierLimits::for_account(&config(), true);
        assert_eq!(premium.remaining(100_000), None);
    }

    #[test]
    fn test_truncation_to_remaining() {
        // 95 analyzed of 100: at most 5 of the unanalyzed set proceed.
        let free = TierLimits::for_account(&config(), false);
        let mut game_ids: Vec<i64> = (1..=20).collect();
        if let Some(remaining) = free.remaining(95) {
            game_ids.truncate(remaining as usize);
        }
        assert_eq!(game_ids, vec![1, 2, 3, 4, 5]);
    }
}
