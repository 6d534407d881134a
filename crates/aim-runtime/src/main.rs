//! AIM runtime entry point.

use aim_runtime::{config::load_config, AimRuntime};
use aim_telemetry::{init_telemetry, TelemetryConfig};
use anyhow::{Context, Result};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = TelemetryConfig::from_env();
    init_telemetry(&telemetry).context("Failed to initialize telemetry")?;

    let config = load_config()?;
    info!(
        addr = %config.gateway.http_addr(),
        concurrency = config.dispatcher.concurrency,
        auth = config.gateway.auth.enabled,
        "Starting AIM runtime"
    );

    let runtime = AimRuntime::new(config)?;

    info!("AIM is running. Press Ctrl+C to stop.");
    runtime.run(shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        // Without a signal handler, keep serving until the process is killed.
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
