//! Health Horizon: cardiovascular risk assessment service
//!
//! Main entry point for the HTTP server.

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use health_horizon::adapters::model::ArtifactModel;
use health_horizon::adapters::sanitize::SanitizingMakeWriter;
use health_horizon::adapters::sqlite::SqliteStorage;
use health_horizon::application::{AssessmentService, PredictionService, SessionRegistry};
use health_horizon::config::AppConfig;
use health_horizon::http::{router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();

    let config = AppConfig::from_env().context("Invalid configuration")?;

    // Logging: file when attached to a terminal (auto) or when asked, stdout otherwise.
    let use_file = config.log_mode.use_file(std::io::stdout().is_terminal());
    let (writer, _guard) = if use_file {
        if let Some(parent) = config.log_file.parent() {
            // Best-effort: don't fail startup just because the directory is missing.
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)
            .with_context(|| format!("Failed to open log file {}", config.log_file.display()))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stdout())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    tracing::info!("Starting Health Horizon...");

    let storage = Arc::new(
        SqliteStorage::new(&config.db_path)
            .with_context(|| format!("Failed to open database {}", config.db_path.display()))?,
    );

    let prediction = match ArtifactModel::load(&config.model_dir, config.require_manifest) {
        Ok(model) => PredictionService::new(Arc::new(model)),
        Err(e) if config.require_model => {
            tracing::error!("Model artifacts failed to load: {}", e);
            return Err(e).context("Model artifacts are required");
        }
        Err(e) => {
            tracing::warn!(
                "Model artifacts failed to load ({}); predictions are disabled",
                e
            );
            PredictionService::unavailable()
        }
    };

    let sessions = SessionRegistry::with_limits(config.session_ttl, config.max_sessions);
    let state = AppState::with_sessions(AssessmentService::new(prediction, storage), sessions);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to address: {}", config.bind))?;
    tracing::info!("Listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("Health Horizon shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
