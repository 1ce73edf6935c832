use server::analysis::orchestrator::Orchestrator;
use server::clients::engine::EngineClient;
use server::config;
use server::db;
use server::routes;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env();

    // Connect to Postgres
    tracing::info!("Connecting to database...");
    let pool = db::pool::create_pool(&config.database_url).await?;

    // Run schema migrations
    tracing::info!("Running migrations...");
    db::pool::run_migrations(&pool).await?;

    // Jobs orphaned by a dead process cannot be resumed mid-loop; their
    // persisted progress is the durable truth, and the next job re-lists
    // whatever is still unanalyzed.
    match db::jobs::fail_orphaned(&pool).await {
        Ok(0) => {}
        Ok(n) => tracing::warn!("Marked {} orphaned analysis jobs as failed", n),
        Err(e) => tracing::warn!("Failed to sweep orphaned jobs: {}", e),
    }

    let engine = EngineClient::new(&config);
    let orchestrator = Orchestrator::new(pool.clone(), engine, config.analysis.clone());

    // CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        // Health
        .route("/health", get(routes::health::health_check))
        // Analysis jobs
        .route("/api/analysis/jobs", post(routes::analysis::start_job))
        .route("/api/analysis/jobs/current", get(routes::analysis::job_status))
        .route("/api/analysis/jobs/cancel", post(routes::analysis::cancel_job))
        .route("/api/games/{game_id}/analyze", post(routes::analysis::analyze_game))
        // Practice
        .route("/api/practice/puzzles", get(routes::practice::get_puzzles))
        .route("/api/practice/attempts", post(routes::practice::submit_attempt))
        .route("/api/practice/runs", post(routes::practice::start_run))
        // Shared state
        .layer(Extension(pool))
        .layer(Extension(orchestrator))
        .layer(cors);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
