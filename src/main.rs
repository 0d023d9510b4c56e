use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rafflr::config::Config;
use rafflr::engine::Engine;
use rafflr::AppState;

#[derive(Parser, Debug)]
#[command(name = "rafflr")]
#[command(author, version, about = "A fast, lightweight prize-competition engine", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "rafflr.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Rafflr v{}", env!("CARGO_PKG_VERSION"));

    // Ensure data directory exists
    rafflr::utils::ensure_dir(&config.server.data_dir)?;

    // Initialize database
    let db = rafflr::db::init(&config.server.data_dir).await?;

    // Ensure default admin user exists
    rafflr::api::auth::ensure_admin_user(
        &db,
        &config.auth.admin_email,
        &config.auth.admin_password,
    )
    .await?;

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), db.clone()));

    // Start background engine (reservation expiry + auto draw)
    let engine = Engine::new(
        db.clone(),
        config.clone(),
        state.email.clone(),
        state.rate_limiter.clone(),
    );
    tokio::spawn(async move {
        engine.run().await;
    });

    // Create API router
    let app = rafflr::api::create_router(state);

    // Start API server
    let api_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&api_addr).await?;

    tracing::info!("API server listening on http://{}", api_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
