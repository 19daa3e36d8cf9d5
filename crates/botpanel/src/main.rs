//! Bot Panel server entry point.

mod cli;

use std::sync::Arc;

use botpanel_api::{serve, AppState};
use botpanel_core::{BotController, TelegramSender};
use botpanel_remote::SshConnector;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    fmt().with_env_filter(filter).with_target(false).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let ssh = cli.ssh_config()?;
    info!(remote = %ssh.target(), "managing bots on remote host");

    let controller = BotController::new(Arc::new(SshConnector::new(ssh)), cli.panel_config());
    let state = AppState::new(cli.api_config(), controller, Arc::new(TelegramSender::new()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let broadcaster = state.broadcaster.clone();
    let status_task = tokio::spawn(async move { broadcaster.run(shutdown_rx).await });

    serve(state, shutdown_signal()).await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = status_task.await {
        warn!(error = %e, "status broadcaster task failed");
    }
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "cannot listen for ctrl-c, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
