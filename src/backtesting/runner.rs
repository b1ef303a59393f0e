use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Config, InstrumentConfig};
use crate::error::BotError;
use crate::exchange::{ExecutionAdapter, HistoricalExchange, SimulatedExecution};
use crate::notify::NoopNotifier;
use crate::trading::{TradeLedger, TradingSession};

use super::report::BacktestReport;

/// Replays each instrument's full history through a `TradingSession` with
/// synthetic fills and no alerts. Instruments run one after another in
/// configured order, so two runs over the same data are identical.
pub struct BacktestRunner {
    exchange: Arc<HistoricalExchange>,
    instruments: Vec<InstrumentConfig>,
    session: TradingSession,
}

impl BacktestRunner {
    pub fn new(exchange: HistoricalExchange, config: &Config) -> Self {
        let exchange = Arc::new(exchange);
        let adapter = ExecutionAdapter::new(
            exchange.clone(),
            Arc::new(SimulatedExecution::quiet()),
            Arc::new(NoopNotifier),
        );
        Self {
            exchange,
            instruments: config.instruments.clone(),
            session: TradingSession::from_config(config, adapter),
        }
    }

    pub fn ledger(&self) -> &TradeLedger {
        self.session.ledger()
    }

    /// Run the full backtest. Instruments with no or too little data are
    /// skipped with a warning.
    pub async fn run(&mut self) -> Result<BacktestReport, BotError> {
        info!("=== BACKTEST START ===");

        for inst in &self.instruments {
            let Some(series) = self.exchange.series(&inst.symbol, inst.timeframe) else {
                warn!("No {} data for {}, skipping", inst.timeframe, inst.symbol);
                continue;
            };

            let required = inst.strategy.warmup() + 1;
            if series.len() < required {
                let e = BotError::InsufficientHistory {
                    instrument: inst.symbol.clone(),
                    bars: series.len(),
                    required,
                };
                warn!("Skipping {}: {}", inst.symbol, e);
                continue;
            }

            info!("BACKTESTING {} ({} {} bars)...", inst.symbol, series.len(), inst.timeframe);
            let before = self.session.ledger().len();
            self.session.replay(&inst.symbol, series).await?;
            info!(
                "  {}: {} trades",
                inst.symbol,
                self.session.ledger().len() - before
            );
        }

        let open_positions: Vec<String> = self
            .session
            .engines()
            .iter()
            .filter(|e| e.position.is_long())
            .map(|e| e.symbol().to_string())
            .collect();

        let now = Utc::now();
        let report = BacktestReport::from_ledger(
            self.session.ledger(),
            self.exchange.earliest_time().unwrap_or(now),
            self.exchange.latest_time().unwrap_or(now),
            open_positions,
        );
        info!("=== BACKTEST END === {}", report.headline());
        Ok(report)
    }
}
