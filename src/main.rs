//! alert-relay - Alertmanager webhook relay
//!
//! Receives Alertmanager notifications over HTTP and relays them to the
//! configured sink: Kafka, a Teams workflow webhook, NRDP or the console.

use alert_relay::{app::App, cli::Cli, config::Config};
use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli).unwrap_or_else(|err| {
        // Manually initialize logging for this specific error
        tracing_subscriber::fmt().init();
        error!("Failed to load configuration: {}", err);
        std::process::exit(1);
    });

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("alert-relay starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_filter());
    info!("Listen Address: {}", config.server.listen_address);
    info!("Metrics: {}", if config.metrics.enabled { "Enabled" } else { "Disabled" });
    info!("Sink: {}", config.sink.kind);
    info!("-------------------------------------------------------");

    let app = App::builder(config).build().await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Shutting down gracefully...");
    app.shutdown().await?;

    info!("Exiting.");
    Ok(())
}
