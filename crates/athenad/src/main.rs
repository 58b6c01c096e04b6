//! # athenad
//!
//! Athena device gateway binary: loads settings, wires the method table into
//! the gateway server, and runs until Ctrl-C or SIGTERM.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use athena_core::logging::{LogFormat, init_subscriber};
use athena_gateway::shutdown::ShutdownOutcome;
use athena_gateway::{GatewayServer, ServerConfig};
use athena_rpc::MethodRegistry;
use athena_settings::GatewaySettings;
use clap::Parser;

/// Athena device gateway.
#[derive(Parser, Debug)]
#[command(name = "athenad", about = "Athena device gateway")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.athena/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level or `EnvFilter` directive (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Apply command-line overrides, which win over file and env values.
    fn apply(&self, settings: &mut GatewaySettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.json_logs {
            settings.logging.json = true;
        }
    }
}

fn load_settings(cli: &Cli) -> Result<GatewaySettings> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(athena_settings::settings_path);
    let mut settings = athena_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);
    Ok(settings)
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.context("Failed to listen for ctrl-c")?,
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    init_subscriber(
        &settings.logging.level,
        LogFormat::from_json_flag(settings.logging.json),
    );

    let metrics = athena_gateway::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let mut methods = MethodRegistry::new();
    athena_rpc::handlers::register_all(&mut methods);
    let method_count = methods.methods().len();

    let server = GatewayServer::new(ServerConfig::from_settings(&settings), methods)
        .with_metrics(metrics);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    let liveness = server.spawn_liveness();

    tracing::info!(
        %addr,
        method_count,
        "Athena gateway listening on ws://{addr}/ws/athena/{{deviceId}}"
    );

    shutdown_signal().await?;

    tracing::info!("Shutting down...");
    let outcome = server
        .shutdown()
        .graceful_shutdown(vec![handle, liveness], None)
        .await;
    if outcome == ShutdownOutcome::TimedOut {
        tracing::warn!("some tasks did not stop in time");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
