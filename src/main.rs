//! Animal buttons API server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ handlers ──▶ latency::sampler   (delay by clock window)
//!                          │               │    └─▶ latency::failure   (synthetic errors)
//!                          │               ▼
//!     Client Response ◀────┴──────── response (CORS, error mapping)
//!
//!     tracing events ──▶ console
//!                    └─▶ ShipperLayer ──▶ LogShipper ──▶ channel ──▶ ShipperWorker ──▶ OpenSearch
//!                                              └─▶ local log file (shipping disabled)
//!
//!     metrics ──▶ /metrics (Prometheus)
//! ```

use std::path::PathBuf;

use clap::Parser;

use animalbuttons_api::config::load_config;
use animalbuttons_api::lifecycle::startup;

#[derive(Parser)]
#[command(name = "animalbuttons-api", version)]
#[command(about = "Animal buttons demo API with latency injection and log shipping", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    startup::run(config).await?;
    Ok(())
}
