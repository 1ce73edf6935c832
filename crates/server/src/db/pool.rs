use sqlx::postgres::{PgPool, PgPoolOptions};

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Run the full Postgres schema migration inline.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Accounts. Registration/billing live in the upstream product service;
-- the pipeline reads tier and practice-run state from here.
CREATE TABLE IF NOT EXISTS accounts (
    id                   BIGSERIAL PRIMARY KEY,
    username             TEXT UNIQUE NOT NULL,
    premium              BOOLEAN NOT NULL DEFAULT FALSE,
    current_practice_run INTEGER NOT NULL DEFAULT 1,
    created_at           TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Imported games; immutable after import
CREATE TABLE IF NOT EXISTS user_games (
    id             BIGSERIAL PRIMARY KEY,
    user_id        BIGINT NOT NULL REFERENCES accounts(id),
    source_game_id TEXT NOT NULL,
    movetext       TEXT NOT NULL,
    user_color     TEXT NOT NULL,
    result         TEXT NOT NULL,
    time_control   TEXT,
    played_at      TIMESTAMPTZ,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_user_games_source
    ON user_games (user_id, source_game_id);
CREATE INDEX IF NOT EXISTS idx_user_games_user_id
    ON user_games (user_id);

-- One analysis per game, write-once. The unique index on game_id is the
-- idempotency key that prevents re-analysis and closes the concurrent
-- check-then-insert race.
CREATE TABLE IF NOT EXISTS analyses (
    id            BIGSERIAL PRIMARY KEY,
    game_id       BIGINT NOT NULL UNIQUE REFERENCES user_games(id) ON DELETE CASCADE,
    user_id       BIGINT NOT NULL REFERENCES accounts(id),
    threshold_cp  INTEGER NOT NULL,
    blunders      JSONB NOT NULL DEFAULT '[]'::jsonb,
    blunder_count INTEGER NOT NULL DEFAULT 0,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_analyses_user_id ON analyses (user_id);

-- Background analysis jobs. The partial unique index allows at most one
-- non-terminal job per user, as an atomic claim rather than an
-- application-level read-then-write.
CREATE TABLE IF NOT EXISTS analysis_jobs (
    id               BIGSERIAL PRIMARY KEY,
    user_id          BIGINT NOT NULL REFERENCES accounts(id),
    status           TEXT NOT NULL DEFAULT 'pending',
    total_count      INTEGER NOT NULL DEFAULT 0,
    analyzed_count   INTEGER NOT NULL DEFAULT 0,
    failed_count     INTEGER NOT NULL DEFAULT 0,
    error            TEXT,
    cancel_requested BOOLEAN NOT NULL DEFAULT FALSE,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    started_at       TIMESTAMPTZ,
    completed_at     TIMESTAMPTZ
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_analysis_jobs_active
    ON analysis_jobs (user_id) WHERE status IN ('pending', 'running');
CREATE INDEX IF NOT EXISTS idx_analysis_jobs_user_created
    ON analysis_jobs (user_id, created_at DESC);

-- Per-puzzle practice progress, scoped by practice-run epoch.
-- practice_run IS NULL marks rows that predate runs.
CREATE TABLE IF NOT EXISTS user_progress (
    id              BIGSERIAL PRIMARY KEY,
    user_id         BIGINT NOT NULL REFERENCES accounts(id),
    analysis_id     BIGINT NOT NULL REFERENCES analyses(id) ON DELETE CASCADE,
    blunder_index   INTEGER NOT NULL,
    practice_run    INTEGER,
    solved          BOOLEAN NOT NULL DEFAULT FALSE,
    solved_rank     INTEGER,
    attempts        INTEGER NOT NULL DEFAULT 0,
    last_attempt_at TIMESTAMPTZ,
    solved_at       TIMESTAMPTZ
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_user_progress_key
    ON user_progress (user_id, analysis_id, blunder_index, practice_run);
CREATE INDEX IF NOT EXISTS idx_user_progress_user_run
    ON user_progress (user_id, practice_run);

-- Per-user per-day engine request counter
CREATE TABLE IF NOT EXISTS engine_usage (
    user_id  BIGINT NOT NULL REFERENCES accounts(id),
    day      DATE NOT NULL,
    requests BIGINT NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, day)
);
"#;
