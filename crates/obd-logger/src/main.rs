//! OBD-II Session Logger - Main Entry Point

use anyhow::Context;
use obd_logger::{init_logging, run, AppConfig, DEFAULT_CONFIG_FILE};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
    let config = AppConfig::load(&path).with_context(|| format!("Failed to load {path}"))?;
    init_logging(&config.logger.log_level)?;

    info!("=== OBD Logger v{} ===", env!("CARGO_PKG_VERSION"));
    let record = run(&config).await?;
    if let Some(overall) = record.overall_score {
        info!(
            "Driver scores: accel {:?}, fuel {:?}, overall {}",
            record.accel_score, record.fuel_score, overall
        );
    }

    Ok(())
}
