use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    /// Base URL of the engine evaluation service.
    pub engine_api_url: String,
    /// Per-call timeout; an expired call is a failed evaluation, never a
    /// stalled batch.
    pub engine_timeout_secs: u64,
    pub host: String,
    pub port: u16,
    pub analysis: AnalysisConfig,
}

/// Tunables for the analysis pipeline.
///
/// Threshold and lost-position ceiling are both externally configurable;
/// product has not settled 100-vs-60 or whether the 900cp ceiling applies.
#[derive(Clone, Debug)]
pub struct AnalysisConfig {
    pub blunder_threshold_cp: i32,
    pub lost_position_ceiling_cp: Option<i32>,
    /// Candidate lines requested per before-move evaluation; also the
    /// number of ranked alternatives practice scoring can match against.
    pub candidate_moves: u32,
    /// Games analyzed concurrently per batch.
    pub batch_size: usize,
    pub free_max_depth: u32,
    pub premium_max_depth: u32,
    pub free_retention_limit: i64,
    /// Optional per-user daily cap on engine requests; a running job stops
    /// starting batches once the cap is hit.
    pub daily_engine_request_limit: Option<i64>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            engine_api_url: env::var("ENGINE_API_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            engine_timeout_secs: parse_env("ENGINE_TIMEOUT_SECS", 30),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_env("PORT", 8000),
            analysis: AnalysisConfig::from_env(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_env() -> Self {
        Self {
            blunder_threshold_cp: parse_env("BLUNDER_THRESHOLD_CP", 100),
            lost_position_ceiling_cp: env::var("LOST_POSITION_CEILING_CP")
                .ok()
                .and_then(|v| v.parse().ok()),
            candidate_moves: parse_env("ENGINE_CANDIDATE_MOVES", 3),
            batch_size: parse_env("ANALYSIS_BATCH_SIZE", 5),
            free_max_depth: parse_env("FREE_TIER_DEPTH", 12),
            premium_max_depth: parse_env("PREMIUM_TIER_DEPTH", 25),
            free_retention_limit: parse_env("FREE_TIER_RETENTION", 100),
            daily_engine_request_limit: env::var("DAILY_ENGINE_REQUEST_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
