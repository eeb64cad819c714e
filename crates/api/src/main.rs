//! Health Sentinel - Main Entry Point

use anyhow::Context;
use api::{init_logging, run_server, settings::Settings};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load configuration")?;
    init_logging(&settings.logging)?;

    info!("=== Health Sentinel v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Starting health monitoring service...");

    run_server(settings).await
}
