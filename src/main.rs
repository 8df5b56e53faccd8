//! API gateway node.
//!
//! ```text
//!   clients ──▶ listener ──▶ /tyk/* ──▶ control API
//!                    │
//!                    └─────▶ registry snapshot ──▶ per-API chain ──▶ upstream
//!                                  ▲
//!   files / control plane / RPC ───┴── reload loop (coalescing, one at a time)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use api_gateway::config::load_config;
use api_gateway::lifecycle::Gateway;
use api_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "api-gateway", version, about = "API gateway node")]
struct Args {
    /// Path to the gateway configuration file
    #[arg(long = "conf", default_value = "gateway.toml")]
    conf: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match load_config(&args.conf) {
        Ok(config) => config,
        Err(e) => {
            logging::init("");
            tracing::error!(
                path = %args.conf.display(),
                error = %e,
                "Failed to load configuration"
            );
            return Err(e.into());
        }
    };
    logging::init(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        "api-gateway starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    Gateway::new(config)?.start(listener).await?;
    Ok(())
}
