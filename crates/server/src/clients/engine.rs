//! Client for the shared engine evaluation service.
//!
//! Normalization and failure containment only; depth and candidate count
//! are decided by the caller from account tier. Every attempted call bumps
//! the user's usage counter, success or failure alike: usage is billed on
//! request, not on result.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::analysis::score::Score;
use crate::config::Config;
use crate::db;

#[derive(Debug, Serialize)]
struct EvalRequest<'a> {
    fen: &'a str,
    depth: u32,
    multipv: u32,
}

#[derive(Debug, Deserialize)]
struct EvalResponse {
    lines: Vec<LineBody>,
}

#[derive(Debug, Deserialize)]
struct LineBody {
    score: ScoreBody,
    #[serde(default)]
    pv: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ScoreBody {
    cp: Option<i32>,
    mate: Option<i32>,
}

/// A ranked candidate line, best first. `uci` is the line's first move.
#[derive(Debug, Clone)]
pub struct CandidateLine {
    pub uci: String,
    pub score: Score,
    pub continuation: Vec<String>,
}

/// Normalized engine output for one position. `candidates` is never empty.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Score of the best line, relative to the side to move.
    pub score: Score,
    pub candidates: Vec<CandidateLine>,
}

impl Evaluation {
    pub fn best_move(&self) -> &str {
        &self.candidates[0].uci
    }
}

/// An evaluation that produced no usable score. Contained by callers: the
/// ply is skipped, the game goes on.
#[derive(Debug, thiserror::Error)]
pub enum EvalFailure {
    #[error("engine request timed out")]
    Timeout,

    #[error("engine transport error: {0}")]
    Transport(String),

    #[error("engine returned HTTP {0}")]
    Status(u16),

    #[error("engine response had no scored lines")]
    Empty,

    #[error("usage accounting failed: {0}")]
    Usage(String),
}

#[derive(Clone)]
pub struct EngineClient {
    client: Client,
    base_url: String,
}

impl EngineClient {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .user_agent("ChessBlunders/1.0")
            .timeout(Duration::from_secs(config.engine_timeout_secs))
            .build()
            .expect("failed to build engine HTTP client");

        Self {
            client,
            base_url: config.engine_api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Evaluate one position at the given depth with `multipv` candidate
    /// lines. A hung service cannot stall a batch: the per-call timeout
    /// turns into an `EvalFailure` like any other failed evaluation.
    pub async fn evaluate(
        &self,
        pool: &PgPool,
        user_id: i64,
        fen: &str,
        depth: u32,
        multipv: u32,
    ) -> Result<Evaluation, EvalFailure> {
        db::usage::increment(pool, user_id)
            .await
            .map_err(|e| EvalFailure::Usage(e.to_string()))?;

        let resp = self
            .client
            .post(format!("{}/analyze", self.base_url))
            .json(&EvalRequest { fen, depth, multipv })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EvalFailure::Timeout
                } else {
                    EvalFailure::Transport(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            return Err(EvalFailure::Status(resp.status().as_u16()));
        }

        let body: EvalResponse = resp
            .json()
            .await
            .map_err(|e| EvalFailure::Transport(e.to_string()))?;

        normalize(body)
    }
}

/// Lines without a move or score are dropped; an evaluation with nothing
/// left is a failure, not a panic downstream.
fn normalize(body: EvalResponse) -> Result<Evaluation, EvalFailure> {
    let candidates: Vec<CandidateLine> = body
        .lines
        .into_iter()
        .filter_map(|line| {
            let uci = line.pv.first()?.clone();
            let score = Score::from_parts(line.score.cp, line.score.mate)?;
            Some(CandidateLine {
                uci,
                score,
                continuation: line.pv,
            })
        })
        .collect();

    match candidates.first() {
        Some(best) => Ok(Evaluation {
            score: best.score,
            candidates,
        }),
        None => Err(EvalFailure::Empty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::score::MATE_CP;

    fn parse(json: &str) -> EvalResponse {
        serde_json::from_str(json).expect("valid response JSON")
    }

    #[test]
    fn test_normalize_ranked_lines() {
        let body = parse(
            r#"{"lines": [
                {"score": {"cp": 35}, "pv": ["e2e4", "e7e5", "g1f3"]},
                {"score": {"cp": 28}, "pv": ["d2d4", "d7d5"]},
                {"score": {"cp": 12}, "pv": ["g1f3"]}
            ]}"#,
        );

        let eval = normalize(body).unwrap();
        assert_eq!(eval.score, Score::Centipawns(35));
        assert_eq!(eval.best_move(), "e2e4");
        assert_eq!(eval.candidates.len(), 3);
        assert_eq!(eval.candidates[1].uci, "d2d4");
        assert_eq!(eval.candidates[0].continuation, vec!["e2e4", "e7e5", "g1f3"]);
    }

    #[test]
    fn test_normalize_clamps_mate_at_boundary_only() {
        let body = parse(
            r#"{"lines": [
                {"score": {"mate": 2}, "pv": ["d8h4"]},
                {"score": {"mate": -3}, "pv": ["g2g3"]}
            ]}"#,
        );

        let eval = normalize(body).unwrap();
        // The variant survives normalization...
        assert_eq!(eval.score, Score::MateIn(2));
        // ...and only collapses where a linear value is required.
        assert_eq!(eval.score.clamped_cp(), MATE_CP);
        assert_eq!(eval.candidates[1].score.clamped_cp(), -MATE_CP);
    }

    #[test]
    fn test_normalize_skips_unusable_lines() {
        let body = parse(
            r#"{"lines": [
                {"score": {}, "pv": ["e2e4"]},
                {"score": {"cp": 10}, "pv": []},
                {"score": {"cp": 7}, "pv": ["b1c3"]}
            ]}"#,
        );

        let eval = normalize(body).unwrap();
        assert_eq!(eval.candidates.len(), 1);
        assert_eq!(eval.best_move(), "b1c3");
    }

    #[test]
    fn test_normalize_empty_is_failure() {
        let body = parse(r#"{"lines": []}"#);
        assert!(matches!(normalize(body), Err(EvalFailure::Empty)));
    }
}
