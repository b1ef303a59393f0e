use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use golden_cross_bot::config::Config;
use golden_cross_bot::exchange::ExecutionAdapter;
use golden_cross_bot::trading::TradingSession;

pub struct GoldenCrossBot {
    session: TradingSession,
    poll_interval: Duration,
}

impl GoldenCrossBot {
    pub fn new(cfg: &Config, adapter: ExecutionAdapter) -> Self {
        info!("{}", "=".repeat(60));
        info!("Golden cross bot starting up");
        info!("Mode: {}", adapter.mode());
        info!("Order size: ${:.2} | Poll every {}s", cfg.order_size_usd, cfg.poll_interval_secs);
        for inst in &cfg.instruments {
            let s = &inst.strategy;
            info!(
                "  {} {}: SMA {}/{} | ADX({}) > {} | SL {}% | TP {}%",
                inst.symbol,
                inst.timeframe,
                s.sma_short_period,
                s.sma_long_period,
                s.adx_period,
                s.adx_threshold,
                s.stop_loss_pct,
                s.take_profit_pct
            );
        }
        info!("{}", "=".repeat(60));

        Self {
            session: TradingSession::from_config(cfg, adapter),
            poll_interval: Duration::from_secs(cfg.poll_interval_secs),
        }
    }

    /// Evaluate immediately, then once per poll interval until Ctrl+C.
    pub async fn run(&mut self) -> Result<()> {
        info!("Bot is now running. Press Ctrl+C to stop.");

        // The first tick of a tokio interval completes immediately
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    self.shutdown();
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.session.run_cycle().await {
                        self.shutdown();
                        return Err(e).context("Stopping on configuration error");
                    }
                }
            }
        }
    }

    fn print_status(&self) {
        let ledger = self.session.ledger();
        info!(
            "Trades: {} | Win Rate: {:.1}% | Net Return: {:+.2}%",
            ledger.len(),
            ledger.win_rate(),
            ledger.net_return()
        );
        for engine in self.session.engines() {
            match engine.position.entry_price() {
                Some(entry) => info!("  {}: LONG from ${:.6}", engine.symbol(), entry),
                None => info!("  {}: flat", engine.symbol()),
            }
        }
    }

    fn shutdown(&self) {
        info!("Shutting down...");
        self.print_status();
        info!("Bot stopped.");
    }
}
