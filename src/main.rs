//! Planka auth proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────┐
//!                        │               PLANKA AUTH PROXY               │
//!                        │                                               │
//!   Client Request       │  ┌──────────┐   upgrade?   ┌──────────────┐   │
//!   ─────────────────────┼─▶│  http    │─────yes─────▶│   upgrade    │───┼──┐
//!                        │  │  server  │              │  forwarder   │   │  │
//!                        │  └────┬─────┘              └──────────────┘   │  │
//!                        │       │ no                                    │  │
//!                        │       ▼                                       │  │
//!                        │  /planka-login ──────▶ ┌──────────────────┐   │  │
//!                        │  /proxy-auth-login ──▶ │ credential bridge│───┼──┤
//!                        │       │                └──────────────────┘   │  │
//!                        │       ▼ anything else                         │  │  Backend
//!                        │  ┌──────────────┐  accessToken cookie         │  ├─▶ (Planka)
//!                        │  │   request    │  → Authorization: Bearer    │  │
//!                        │  │  forwarder   │─────────────────────────────┼──┘
//!                        │  └──────────────┘                             │
//!                        │                                               │
//!                        │  config · observability · security · lifecycle│
//!                        └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use planka_auth_proxy::config::load_config;
use planka_auth_proxy::lifecycle::{signals, startup};
use planka_auth_proxy::observability::{logging, metrics};
use planka_auth_proxy::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "planka-auth-proxy", version)]
#[command(about = "Authenticating reverse proxy for Planka", long_about = None)]
struct Cli {
    /// TOML configuration file; environment variables override its values.
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    logging::init(&config.observability);

    tracing::info!("planka-auth-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    startup::log_configuration(&config);

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Listening for connections");

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    tokio::spawn(signals::listen(shutdown.clone()));

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
