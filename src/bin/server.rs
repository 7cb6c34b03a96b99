use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use photo_colorizer::config::AppConfig;
use photo_colorizer::pipeline::{load_model, Colorizer};
use photo_colorizer::state::Library;
use photo_colorizer::web::{self, AppState, ColorizeWorker};

/// Multi-user colorization web service
#[derive(Parser, Debug)]
#[command(name = "colorizer-server")]
struct Cli {
    /// TOML configuration file (defaults to ./colorizer.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address (overrides config)
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    config
        .ensure_dirs()
        .context("failed to create data directories")?;

    // The session is created once here and moved onto the worker thread
    let model = load_model(&config.model_path)
        .with_context(|| format!("failed to load model from {}", config.model_path.display()))?;
    let colorizer = Colorizer::new(model);
    tracing::info!("🎨 Loaded model {}", colorizer.model_name());
    let worker = ColorizeWorker::spawn(colorizer).context("failed to start inference worker")?;

    let library = Library::open(&config.database_path, config.artifact_dirs())
        .context("failed to open record database")?
        .with_retention(config.retention());

    // Bring records and directories back in line after an unclean stop
    let dropped = library.verify_outputs()?;
    let orphans = library.remove_orphan_files()?;
    if dropped > 0 || orphans > 0 {
        tracing::info!(
            "🧹 Startup cleanup: {} dangling output records, {} orphan files",
            dropped,
            orphans
        );
    }

    let state = Arc::new(AppState::new(library, worker.clone()));
    let app = web::router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    web::serve(listener, app, shutdown_signal())
        .await
        .context("server error")?;

    // Queued jobs finish before the worker thread exits
    worker.shutdown().await;
    tracing::info!("Server shut down gracefully");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received, draining requests..."),
        Err(e) => {
            // Without a signal handler, run until killed
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await
        }
    }
}
