//! Condor Relay
//!
//! Receives Condor telemetry over UDP, converts the selected quantities to the
//! configured units and forwards the datagrams to another UDP endpoint.

use anyhow::{Context, Result};
use clap::Parser;
use condor_relay::config::{default_config_path, AppConfig, ConfigOrigin};
use condor_relay::{api, logging, monitor, state, Bridge};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Condor telemetry unit-conversion relay
#[derive(Debug, Parser)]
#[command(name = "condor-relay", version, about)]
struct Args {
    /// Configuration file (default: ~/.condor-relay/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level or filter directive, overriding the configuration
    #[arg(short, long)]
    log_level: Option<String>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// UDP port to receive Condor telemetry on
    #[arg(long)]
    input_port: Option<u16>,

    /// Host to forward converted telemetry to
    #[arg(long)]
    output_host: Option<String>,

    /// UDP port to forward converted telemetry to
    #[arg(long)]
    output_port: Option<u16>,

    /// Do not serve the HTTP control API
    #[arg(long)]
    no_api: bool,

    /// Port for the HTTP control API
    #[arg(long)]
    api_port: Option<u16>,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(path) = &self.log_file {
            config.logging.log_to_file = true;
            config.logging.log_file_path = Some(path.clone());
        }
        if let Some(port) = self.input_port {
            config.network.input_port = port;
        }
        if let Some(host) = &self.output_host {
            config.network.output_host = host.clone();
        }
        if let Some(port) = self.output_port {
            config.network.output_port = port;
        }
        if self.no_api {
            config.api.enabled = false;
        }
        if let Some(port) = self.api_port {
            config.api.port = port;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let (mut config, origin) = AppConfig::load_or_create(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    args.apply(&mut config);
    config.validate()?;

    let _log_guard = logging::init_logging(&config.logging)?;

    info!("Starting Condor Relay v{}", env!("CARGO_PKG_VERSION"));
    match origin {
        ConfigOrigin::Created => {
            info!("Default configuration created at {}", config_path.display())
        }
        ConfigOrigin::Loaded => info!("Configuration loaded from {}", config_path.display()),
    }

    let bridge = Bridge::new(config.conversions);
    if let Err(e) = bridge.start(config.network.clone()).await {
        // Keep serving the API so the network settings can be fixed remotely.
        error!("Relay did not start: {}", e);
        if !config.api.enabled {
            return Err(e.into());
        }
    }

    let shutdown = CancellationToken::new();
    let monitor_task = tokio::spawn(monitor::run(bridge.clone(), shutdown.clone()));

    let api_task = if config.api.enabled {
        let addr = format!("{}:{}", config.api.host, config.api.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding control API on {}", addr))?;
        info!("Control API listening on http://{}", addr);

        let app_state = state::AppState::new(bridge.clone(), config.clone(), Some(config_path));
        let app = api::create_router(app_state);
        let cancel = shutdown.clone();
        Some(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { cancel.cancelled().await })
                .await
        }))
    } else {
        None
    };

    info!("Relay running, press Ctrl+C to stop");
    shutdown_signal().await;
    info!("Shutdown signal received");

    shutdown.cancel();
    bridge.stop().await;

    if let Some(task) = api_task {
        if let Err(e) = task.await? {
            error!("Control API error: {}", e);
        }
    }
    monitor_task.await?;

    info!("Condor Relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
