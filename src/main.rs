//! PRISMA telemetry service.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────────────┐
//!                    │                  PRISMA TELEMETRY                     │
//!                    │                                                       │
//!   Client Request   │  ┌─────────┐   ┌───────────────┐   ┌──────────────┐   │
//!   ─────────────────┼─▶│  http   │──▶│ apm_tracking  │──▶│  handlers    │   │
//!                    │  │ server  │   │  middleware   │   │              │   │
//!                    │  └─────────┘   └───────┬───────┘   └──────┬───────┘   │
//!                    │                        │                  │           │
//!                    │                        ▼                  ▼           │
//!                    │                ┌──────────────┐   ┌──────────────┐    │
//!                    │                │  apm ledger  │◀──│ correlation  │────┼──▶ Analytics
//!                    │                └──────┬───────┘   └──────────────┘    │
//!                    │                       │ sinks                         │
//!                    │             ┌─────────┴─────────┐                     │
//!                    │             ▼                   ▼                     │
//!                    │      ┌────────────┐     ┌──────────────┐             │
//!                    │      │ prometheus │     │ opentelemetry│             │
//!                    │      └────────────┘     └──────────────┘             │
//!                    │                                                       │
//!   /health /ready   │  ┌──────────────────┐   ┌──────────────────────────┐  │
//!   ─────────────────┼─▶│ health aggregator│──▶│ probes (db, cache, apis, │  │
//!                    │  │  cache + timeout │   │ memory, generation)      │  │
//!                    │  └──────────────────┘   └──────────────────────────┘  │
//!                    └───────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use prisma_telemetry::config::{load_config, watcher::ConfigWatcher, PrismaConfig};
use prisma_telemetry::http::HttpServer;
use prisma_telemetry::lifecycle::{signals, startup, Shutdown};
use prisma_telemetry::observability::{logging, otel};

#[derive(Parser)]
#[command(name = "prisma-telemetry")]
#[command(about = "PRISMA APM, health and portfolio API service", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => PrismaConfig::default(),
    };
    logging::init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "prisma-telemetry starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        apm_enabled = config.apm.enabled,
        tracing_enabled = config.observability.tracing_enabled,
        "Configuration loaded"
    );

    let tracer_provider = startup::init_exporters(&config)?;

    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (updates, None)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config)?;

    let shutdown = Arc::new(Shutdown::new());
    signals::spawn_signal_listener(shutdown.clone());
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    if let Some(provider) = tracer_provider {
        otel::shutdown_tracer_provider(provider);
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
