//! Ticker relay - entry point.
//!
//! Streams exchange tickers, converts them with the latest USD→INR rate and
//! pushes throttled snapshots to WebSocket subscribers.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Real-time crypto ticker relay
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via RELAY_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before the first TLS connection.
    relay_ws::init_crypto();

    let args = Args::parse();

    relay_telemetry::init_logging().map_err(relay_app::AppError::from)?;

    info!("Starting ticker relay v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > RELAY_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("RELAY_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let config = relay_app::AppConfig::from_file(&config_path)?;
    info!(
        port = config.server.port,
        upstream = %config.upstream.url,
        symbols = config.symbols.len(),
        "Configuration loaded"
    );

    let app = relay_app::Application::new(config)?;
    app.run().await?;

    Ok(())
}
