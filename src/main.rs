mod bot;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use golden_cross_bot::config::Config;
use golden_cross_bot::exchange::ExecutionAdapter;

use crate::bot::GoldenCrossBot;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env().context("Invalid configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    let adapter = ExecutionAdapter::from_config(&cfg)?;

    let mut bot = GoldenCrossBot::new(&cfg, adapter);
    bot.run().await?;

    Ok(())
}
