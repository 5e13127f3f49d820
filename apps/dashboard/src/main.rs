//! Outreach dashboard: the four-step wizard over HTTP, with live logs via SSE.

mod error;
mod events;
mod router;
mod routes;
mod settings;
mod state;

#[cfg(test)]
mod tests;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use outreach_core::Pipeline;
use outreach_shared::{config_file_path, load_config_or_default, validate_credentials};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use events::{DashboardLogLayer, EventHub};
use state::AppState;

#[derive(Parser)]
#[command(name = "outreach-dashboard", version, about)]
struct Args {
    /// Config file (defaults to ~/.outreach/outreach.toml).
    #[arg(long, env = "OUTREACH_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind (overrides `dashboard.host`).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides `dashboard.port`).
    #[arg(long)]
    port: Option<u16>,

    /// Directory of static assets (overrides `dashboard.static_dir`).
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let hub = Arc::new(EventHub::new());
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("outreach=info,tower_http=info")),
        )
        .with(fmt::layer())
        .with(DashboardLogLayer::new(hub.clone()))
        .init();

    let config_path = match args.config {
        Some(path) => path,
        None => config_file_path()?,
    };
    let config = load_config_or_default(&config_path)?;
    validate_credentials(&config)?;
    let pipeline = Pipeline::from_config(&config)?;

    let host = args.host.unwrap_or_else(|| config.dashboard.host.clone());
    let port = args.port.unwrap_or(config.dashboard.port);
    let static_dir = args
        .static_dir
        .or_else(|| config.dashboard.static_dir.as_deref().map(PathBuf::from));

    let state = AppState::new(pipeline, hub, config, config_path);
    let app = router::build_app_router(state, static_dir.as_deref());

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .wrap_err_with(|| format!("invalid listen address {host}:{port}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "dashboard listening at http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("server error")?;

    tracing::info!("dashboard stopped");
    Ok(())
}

/// Resolves on Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
