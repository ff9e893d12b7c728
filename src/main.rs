//! Handshake-routing proxy for game servers.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌───────────────────────────────────────────────────┐
//!                       │                 HANDSHAKE PROXY                    │
//!                       │                                                    │
//!   Client connection   │  ┌──────────┐   ┌───────────┐   ┌──────────┐       │
//!   ────────────────────┼─▶│   net    │──▶│ protocol  │──▶│ routing  │       │
//!                       │  │ listener │   │ handshake │   │ resolve  │       │
//!                       │  └──────────┘   └───────────┘   └────┬─────┘       │
//!                       │                                      │             │
//!                       │                                      ▼             │
//!   Raw bytes both ways │                               ┌──────────────┐     │
//!   ◀───────────────────┼───────────────────────────────│ proxy relay  │◀────┼──── Backend
//!                       │                               └──────────────┘     │     Server
//!                       │                                                    │
//!                       │  ┌──────────────────────────────────────────────┐  │
//!                       │  │ config (ArcSwap snapshot, watcher)           │  │
//!                       │  │ lifecycle (console, signals, shutdown)       │  │
//!                       │  │ observability (tracing)                      │  │
//!                       │  └──────────────────────────────────────────────┘  │
//!                       └───────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;

use handshake_proxy::config::{load_config, ConfigHandle, ConfigWatcher, LogFormat};
use handshake_proxy::lifecycle::console::{self, ControlCommand};
use handshake_proxy::lifecycle::{Shutdown, SignalEvent, SignalListener};
use handshake_proxy::net::Listener;
use handshake_proxy::observability::{self, logging::DEFAULT_LOG_LEVEL};
use handshake_proxy::ProxyServer;

#[derive(Parser)]
#[command(name = "handshake-proxy")]
#[command(about = "Routes game client connections to backends by handshake hostname", long_about = None)]
struct Cli {
    /// Config file (TOML, or JSON when it ends in .json)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Do not read operator commands from stdin
    #[arg(long)]
    no_console: bool,

    /// Do not watch the config file for changes
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            let _ = observability::init_logging(DEFAULT_LOG_LEVEL, LogFormat::Pretty);
            tracing::error!(path = %cli.config.display(), "Failed to load config: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = observability::init_logging(&config.log_level, config.log_format) {
        eprintln!("failed to initialize logging: {e}");
    }

    tracing::info!("handshake-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!("{}", config.summary());

    let listener = Listener::bind(config.listen_addr(), config.max_connections).await?;
    let handle = Arc::new(ConfigHandle::with_source(config, &cli.config));

    let shutdown = Shutdown::new();
    let server = ProxyServer::new(Arc::clone(&handle));
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let (watcher, mut config_changes) = ConfigWatcher::new(&cli.config);
    let watcher = if cli.no_watch {
        None
    } else {
        match watcher.run() {
            Ok(w) => Some(w),
            Err(e) => {
                tracing::error!(error = %e, "Config watcher failed to start; reload still works");
                None
            }
        }
    };

    let (command_tx, mut commands) = mpsc::channel::<ControlCommand>(16);
    if !cli.no_console {
        console::spawn_console(command_tx.clone())?;
        tracing::info!("Type \"reload\" to apply config changes, \"help\" for commands");
    }

    let mut signals = SignalListener::new()?;

    loop {
        tokio::select! {
            event = signals.recv() => match event {
                SignalEvent::Shutdown => break,
                SignalEvent::Reload => console::execute(ControlCommand::Reload, &handle),
            },
            Some(command) = commands.recv() => console::execute(command, &handle),
            Some(change) = config_changes.recv() => {
                tracing::debug!(path = %change.path.display(), "Config change pending");
            }
        }
    }

    shutdown.trigger();
    drop(watcher);
    drop(command_tx);
    commands.close();

    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Proxy server error"),
        Err(e) => tracing::error!(error = %e, "Proxy server task failed"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
