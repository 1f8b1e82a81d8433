//! Resolve API Server
//!
//! Bootstraps the web API host: loads layered configuration, wires the
//! logging sinks, assembles the request pipeline and serves it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use resolve_server::routes::AppState;
use resolve_server::{app, logging, reload, Settings};

#[derive(Debug, Parser)]
#[command(name = "resolve-server", version, about = "Web API host for the Resolve issue tracker")]
struct Args {
    /// Directory containing settings.json and its environment overlays
    #[arg(long, env = "RESOLVE_CONFIG_DIR", default_value = ".")]
    config_dir: PathBuf,

    /// Deployment environment used to pick the settings overlay
    #[arg(long, env = "RESOLVE_ENVIRONMENT", default_value = "production")]
    environment: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Configuration must be in place before the sinks it configures
    let settings = Settings::load(&args.config_dir, &args.environment)?;
    let _log_guards = logging::init(&settings.logging)?;

    info!(
        "Starting Resolve API host (environment: {})",
        args.environment
    );

    // The connection string is fixed at startup; reloads only refresh the
    // shared settings snapshot
    let listen = settings.server.listen;
    let database_url = settings.data.default_connection.clone();
    let (tx, rx) = watch::channel(settings);
    let _reload = reload::watch(&args.config_dir, &args.environment, tx)?;

    let state = AppState {
        environment: args.environment,
        database_url,
        settings: rx,
    };
    let router = app(state);

    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind {listen}"))?;
    info!("Server listening on http://{listen}");

    axum::serve(listener, router).await?;

    Ok(())
}
