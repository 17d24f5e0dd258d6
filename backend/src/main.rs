//! Pool Finalizer Service
//!
//! Runs the job worker that finalizes pools, awards prizes, stores LIVE
//! leaderboard snapshots and redeems invite codes and invitations.

use anyhow::Context;
use pool_finalizer::database::{create_pool, run_migrations};
use pool_finalizer::AppConfig;
use pool_finalizer::AppState;
use tracing::{error, info};

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("pool_finalizer={},sqlx=warn", config.log_level).into());

    if config.json_logs() {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()
        .map_err(anyhow::Error::msg)
        .context("Configuration error")?;

    init_tracing(&config);

    info!("Pool finalizer starting");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);
    info!("Prize overlap policy: {}", config.prize_overlap_policy.as_str());

    // =========================================================================
    // DATABASE SETUP
    // =========================================================================
    info!("Connecting to database...");
    let pool = create_pool(&config.database)
        .await
        .context("Failed to create database pool")?;
    info!("Database connection pool created (max connections: {})", config.database.max_connections);

    info!("Running database migrations...");
    run_migrations(&pool, None)
        .await
        .context("Database migration failed")?;
    info!("Database migrations completed successfully");

    // =========================================================================
    // SERVICES
    // =========================================================================
    let state = AppState::new(pool, &config).context("Failed to initialize services")?;
    if let Some(dir) = &config.audit_log_dir {
        info!("Audit records mirrored to {:?}", dir);
    }

    // =========================================================================
    // BACKGROUND TASKS
    // =========================================================================
    let worker = state.worker();
    let worker_handle = tokio::spawn(async move {
        worker.start().await;
    });
    info!(
        "Job worker started (poll every {:?}, batch {})",
        config.jobs.poll_interval(),
        config.jobs.batch_size
    );
    info!("Press Ctrl+C to shutdown gracefully");

    // =========================================================================
    // SHUTDOWN HANDLING
    // =========================================================================
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, shutting down gracefully...");
        }
        _ = worker_handle => {
            error!("Job worker exited unexpectedly");
        }
    }

    state.database.pool().close().await;
    info!("Pool finalizer shutdown complete");
    Ok(())
}
