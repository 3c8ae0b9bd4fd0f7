#![forbid(unsafe_code)]

//! HTTP server for the academy site and its content APIs.

use std::{net::IpAddr, net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use gamestudy_academy::{
    api::{AppState, build_router},
    config::{SettingsOverrides, load_settings},
    telemetry::init_tracing,
};
use tokio::signal;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "academy-server", about = "Serve the Game Study Academy API")]
struct ServerArgs {
    /// Listen address (overrides ACADEMY_HOST).
    #[arg(long)]
    host: Option<String>,

    /// Listen port (overrides ACADEMY_PORT).
    #[arg(long)]
    port: Option<u16>,

    /// Dotenv file to read before the process environment.
    #[arg(long = "env-file")]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();
    init_tracing("info")?;

    let settings = load_settings(SettingsOverrides {
        host: args.host,
        port: args.port,
        env_path: args.env_file,
    })?;
    let host: IpAddr = settings
        .host
        .parse()
        .with_context(|| format!("invalid listen host {:?}", settings.host))?;
    let addr = SocketAddr::new(host, settings.port);

    let state = AppState::from_settings(&settings)
        .await
        .context("initializing services")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    info!(%addr, site_url = %settings.site_url, "academy server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running academy server")?;
    info!("academy server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        warn!(error = %err, "failed to install Ctrl+C handler");
    }
}
