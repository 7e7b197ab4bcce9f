//! KPR Auth Maintenance Worker
//!
//! Periodically deletes login sessions idle past the retention window and
//! verification tokens long past their expiry.
//!
//! # Usage
//!
//! ```bash
//! # Run forever, sweeping every hour
//! kpr-auth-worker
//!
//! # Single sweep, e.g. from cron
//! kpr-auth-worker --once
//!
//! # Environment overrides
//! KPR__WORKER__INTERVAL=15m KPR__AUTH__SESSION__RETENTION=7days kpr-auth-worker
//! ```

mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kpr_auth::{AuthService, LogNotifier, PgStore};
use kpr_db::Database;

use crate::config::WorkerConfig;

// =============================================================================
// CLI Arguments
// =============================================================================

/// KPR Auth Worker - session and verification token cleanup
#[derive(Parser, Debug)]
#[command(name = "kpr-auth-worker")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, env = "KPR_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "KPR_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (json, pretty)
    #[arg(long, env = "KPR_LOG_FORMAT", default_value = "pretty")]
    log_format: String,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Seconds between sweeps
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Run migrations before the first sweep
    #[arg(long)]
    migrate: bool,

    /// Run one sweep and exit
    #[arg(long)]
    once: bool,
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut worker_config = WorkerConfig::load(args.config.as_deref())?;

    // Override with CLI arguments
    if let Some(db_url) = args.database_url {
        worker_config.database.postgres_url = db_url;
    }
    if let Some(secs) = args.interval_secs {
        worker_config.worker.interval = Duration::from_secs(secs);
    }
    if args.migrate {
        worker_config.database.run_migrations = true;
    }
    worker_config.logging.level = args.log_level;
    worker_config.logging.format = args.log_format;

    init_logging(&worker_config.logging);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting KPR auth worker"
    );

    validate_config(&worker_config)?;

    if worker_config.metrics.enabled {
        start_metrics_server(&worker_config.metrics)?;
    }

    let db = init_database(&worker_config.database).await?;
    let store = Arc::new(PgStore::new(db));
    let auth = AuthService::with_store(worker_config.auth.clone(), store, Arc::new(LogNotifier));

    if args.once {
        sweep(&auth, worker_config.worker.sweep_tokens).await?;
        return Ok(());
    }

    run(&auth, &worker_config.worker).await;

    tracing::info!("Worker shutdown complete");

    Ok(())
}

// =============================================================================
// Initialization Functions
// =============================================================================

/// Initialize tracing/logging
fn init_logging(config: &config::LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            subscriber
                .with(fmt::layer().json().with_target(true))
                .init();
        }
        _ => {
            subscriber
                .with(fmt::layer().pretty().with_target(true))
                .init();
        }
    }
}

/// Validate configuration
fn validate_config(config: &WorkerConfig) -> anyhow::Result<()> {
    if config.worker.interval.is_zero() {
        anyhow::bail!("Sweep interval must be greater than zero");
    }
    if config.auth.session.retention.is_zero() {
        anyhow::bail!("Session retention must be greater than zero");
    }
    Ok(())
}

/// Initialize database connection
async fn init_database(config: &config::DatabaseSettings) -> anyhow::Result<Arc<Database>> {
    let db = Database::connect(&config.to_db_config()).await?;

    if !db.health_check().await {
        anyhow::bail!("Database health check failed");
    }

    if config.run_migrations {
        db.migrate().await?;
    }

    Ok(Arc::new(db))
}

/// Start Prometheus metrics endpoint
fn start_metrics_server(config: &config::MetricsConfig) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    metrics::describe_counter!(
        "auth_sessions_purged_total",
        "Sessions deleted by the cleanup sweep"
    );
    metrics::describe_counter!(
        "auth_verification_tokens_purged_total",
        "Expired verification tokens deleted by the cleanup sweep"
    );

    tracing::info!(port = config.port, "Metrics server started");

    Ok(())
}

// =============================================================================
// Sweep Loop
// =============================================================================

/// One cleanup pass. Returns (sessions, tokens) deleted.
async fn sweep(auth: &AuthService, sweep_tokens: bool) -> anyhow::Result<(u64, u64)> {
    let sessions = auth.cleanup_expired_sessions().await?;
    metrics::counter!("auth_sessions_purged_total").increment(sessions);

    let tokens = if sweep_tokens {
        let tokens = auth.cleanup_expired_tokens().await?;
        metrics::counter!("auth_verification_tokens_purged_total").increment(tokens);
        tokens
    } else {
        0
    };

    tracing::info!(sessions = sessions, tokens = tokens, "Sweep complete");

    Ok((sessions, tokens))
}

/// Sweep on every tick until a shutdown signal arrives
async fn run(auth: &AuthService, settings: &config::WorkerSettings) {
    let mut ticker = tokio::time::interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    tracing::info!(interval_secs = settings.interval.as_secs(), "Sweep loop started");

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                if let Err(e) = sweep(auth, settings.sweep_tokens).await {
                    tracing::error!(error = %e, "Sweep failed");
                }
            }
        }
    }
}

// =============================================================================
// Graceful Shutdown
// =============================================================================

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
