//! Edge gateway.
//!
//! Single entry point in front of a web UI renderer, a task API and a
//! desktop-streaming service.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                  EDGE GATEWAY                    │
//!                        │                                                  │
//!   Client request       │  ┌─────────┐   ┌───────────┐   ┌──────────────┐ │
//!   ─────────────────────┼─▶│   net   │──▶│   http    │──▶│   security   │ │
//!                        │  │listener │   │  server   │   │ gate (admit) │ │
//!                        │  └─────────┘   └───────────┘   └──────┬───────┘ │
//!                        │                                       ▼         │
//!                        │                               ┌──────────────┐  │
//!                        │                               │   routing    │  │
//!                        │                               │ prefix table │  │
//!                        │                               └──────┬───────┘  │
//!                        │                                      ▼          │
//!   Client response      │                               ┌──────────────┐  │      Renderer
//!   ◀────────────────────┼───────────────────────────────│    proxy     │◀─┼───── Task API
//!                        │                               │ http + relay │  │      Desktop stream
//!                        │                               └──────────────┘  │
//!                        │  ┌────────────────────────────────────────────┐ │
//!                        │  │ config · observability · lifecycle         │ │
//!                        │  └────────────────────────────────────────────┘ │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use edge_gateway::config::load_config;
use edge_gateway::lifecycle::{signals, startup, Shutdown};
use edge_gateway::observability::{logging, metrics};

#[derive(Debug, Parser)]
#[command(name = "edge-gateway", version, about = "Edge gateway for the renderer, task API and desktop stream")]
struct Cli {
    /// Optional TOML configuration file. Environment variables override it.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Listen port; overrides PORT and the file.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine.
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.listener.port = port;
    }

    logging::init(&config.observability);
    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address(),
        renderer = %config.backends.renderer_url,
        task_api = %config.backends.task_api_url,
        desktop_stream = %config.backends.desktop_stream_url,
        local_desktop = ?config.backends.local_desktop_url,
        api_key_required = config.admission.api_key.is_some(),
        rate_limit_max = config.admission.max_requests,
        rate_limit_window_ms = config.admission.window_ms,
        "edge-gateway starting"
    );

    if let Some(addr) = config.observability.metrics_socket_addr() {
        metrics::init_metrics(addr);
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let (server, listener) = startup::prepare(config, shutdown).await?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
