//! # Courier Runtime
//!
//! Process entry point.
//!
//! 1. Load configuration from the environment
//! 2. Initialize logging and metrics
//! 3. Build the buses and attach the stack service
//! 4. Run until Ctrl+C, then detach everything

use std::sync::Arc;

use anyhow::{Context, Result};
use courier_runtime::{CourierRuntime, RuntimeConfig};
use courier_telemetry::init_telemetry;
use stack_service::LogSink;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = RuntimeConfig::from_env();

    let _telemetry =
        init_telemetry(config.telemetry.clone()).context("Failed to initialize telemetry")?;

    info!(
        locations = config.stack_locations.len(),
        default_timeout_ms = config.bus.default_timeout.as_millis(),
        "Configuration loaded"
    );

    let runtime = CourierRuntime::new(&config)?;
    runtime.start(Arc::new(LogSink)).await?;

    info!("Courier is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    runtime.shutdown();
    Ok(())
}
