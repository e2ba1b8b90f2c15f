//! arkla-server - ARKLA archive backend
//!
//! Startup order: configuration (TOML → environment → CLI), logging, root
//! folder, database, Gemini client, HTTP listener.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use arkla_common::config::{self, ArchiveLayout, ArklaConfig, ROOT_ENV_VAR};
use arkla_server::services::GeminiClient;
use arkla_server::{build_router, db, error::set_hide_internal_details, AppState};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for arkla-server
#[derive(Parser, Debug)]
#[command(name = "arkla-server")]
#[command(about = "ARKLA document archive backend")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "ARKLA_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the database, uploads and exports
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Bind address
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,
}

fn init_tracing(config: &ArklaConfig) {
    let fallback = config.logging.level.clone().unwrap_or_else(|| {
        if config.is_development() {
            "debug".to_string()
        } else {
            "info".to_string()
        }
    });

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        ArklaConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    init_tracing(&config);

    info!("Starting arkla-server v{}", env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", config.environment);

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref(), ROOT_ENV_VAR, &config);
    let layout = ArchiveLayout::new(root_folder);
    layout
        .ensure_directories()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", layout.root.display());

    let db_path = layout.database_path();
    info!("Database: {}", db_path.display());
    let pool = db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let gemini = GeminiClient::new(config.gemini.clone()).context("Failed to create Gemini client")?;
    if gemini.is_configured() {
        info!("Gemini configured (model {})", gemini.model());
    } else {
        warn!("GOOGLE_API_KEY not set; document processing is disabled");
    }

    set_hide_internal_details(config.is_production());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.host, config.port))?;

    let state = AppState::new(pool, gemini, config, layout);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
