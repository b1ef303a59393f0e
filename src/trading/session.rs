use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::{Config, InstrumentConfig};
use crate::error::BotError;
use crate::exchange::{ExecutionAdapter, FetchWindow, MarketOrder};
use crate::models::{CandleSeries, ExitReason, Side};
use crate::strategies::{EntrySignal, InstrumentEngine};
use crate::trading::ledger::TradeLedger;
use crate::trading::position::Action;
use crate::trading::trade_record::TradeRecord;

/// Owns every instrument's engine and position plus the trade ledger, and
/// drives them against one `ExecutionAdapter`. Backtests call `replay`,
/// the live loop calls `poll_all` once per tick.
pub struct TradingSession {
    engines: Vec<InstrumentEngine>,
    ledger: TradeLedger,
    adapter: ExecutionAdapter,
    order_size_usd: f64,
    history_limit: usize,
}

impl TradingSession {
    pub fn new(
        instruments: Vec<InstrumentConfig>,
        order_size_usd: f64,
        history_limit: usize,
        adapter: ExecutionAdapter,
    ) -> Self {
        Self {
            engines: instruments.into_iter().map(InstrumentEngine::new).collect(),
            ledger: TradeLedger::new(),
            adapter,
            order_size_usd,
            history_limit,
        }
    }

    pub fn from_config(cfg: &Config, adapter: ExecutionAdapter) -> Self {
        Self::new(
            cfg.instruments.clone(),
            cfg.order_size_usd,
            cfg.history_limit,
            adapter,
        )
    }

    pub fn engines(&self) -> &[InstrumentEngine] {
        &self.engines
    }

    pub fn engine(&self, symbol: &str) -> Option<&InstrumentEngine> {
        self.engines.iter().find(|e| e.symbol() == symbol)
    }

    pub fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    fn index_of(&self, symbol: &str) -> Result<usize, BotError> {
        self.engines
            .iter()
            .position(|e| e.symbol() == symbol)
            .ok_or_else(|| BotError::config(symbol, "not a configured instrument"))
    }

    /// Walk every unseen bar of `series` in order: exits are checked against
    /// each bar's close while long, entries against each bar's signal while
    /// flat. Failed orders are logged and the walk continues.
    pub async fn replay(&mut self, symbol: &str, series: &CandleSeries) -> Result<(), BotError> {
        let idx = self.index_of(symbol)?;
        let fresh = match self.engines[idx].last_seen() {
            Some(ts) => series.after(ts),
            None => series.as_slice(),
        };

        for candle in fresh {
            let engine = &mut self.engines[idx];
            let signal = engine.observe(candle);
            let action = engine.position.decide(
                signal.as_ref(),
                candle.close,
                candle.timestamp,
                engine.strategy(),
            );
            if let Err(e) = self.execute(idx, action).await {
                warn!("{}: {} at {}", symbol, e, candle.timestamp);
            }
        }

        debug!(
            "{}: replayed {} bars, {} trades so far",
            symbol,
            fresh.len(),
            self.ledger.len()
        );
        Ok(())
    }

    /// One live evaluation of one instrument: fetch the recent window, feed
    /// the bars not seen before, then either check exits against the latest
    /// price (long) or act on the newest bar's verdict (flat).
    pub async fn poll(&mut self, symbol: &str) -> Result<Action, BotError> {
        let idx = self.index_of(symbol)?;
        let market = self.adapter.market.clone();
        let timeframe = self.engines[idx].config.timeframe;

        let series = market
            .fetch_candles(symbol, timeframe, FetchWindow::Limit(self.history_limit))
            .await?;

        let engine = &mut self.engines[idx];
        let (fresh, signal) = engine.ingest_new(&series);
        debug!("{}: {} new bars", symbol, fresh);

        let Some(latest) = series.last() else {
            return Err(insufficient(engine));
        };

        let action = if engine.position.is_long() {
            let price = market.latest_price(symbol).await?;
            engine
                .position
                .decide(None, price, latest.timestamp, engine.strategy())
        } else {
            if !engine.is_warm() {
                return Err(insufficient(engine));
            }
            engine.position.decide(
                signal.as_ref(),
                latest.close,
                latest.timestamp,
                engine.strategy(),
            )
        };

        self.execute(idx, action).await?;
        Ok(action)
    }

    /// Poll every instrument in configured order. A failure is logged and
    /// only affects its own instrument.
    pub async fn poll_all(&mut self) -> Vec<(String, Result<Action, BotError>)> {
        let symbols: Vec<String> = self.engines.iter().map(|e| e.symbol().to_string()).collect();
        let mut results = Vec::with_capacity(symbols.len());

        for symbol in symbols {
            info!("Checking {}...", symbol);
            let result = self.poll(&symbol).await;
            match &result {
                Ok(Action::Hold) => debug!("{}: no action", symbol),
                Ok(_) => {}
                Err(e @ BotError::InsufficientHistory { .. }) => warn!("Skipping {}: {}", symbol, e),
                Err(e @ BotError::OrderSubmission { .. }) => {
                    debug!("{}: order already reported: {}", symbol, e)
                }
                Err(e) if e.is_fatal() => error!("{}: {}", symbol, e),
                Err(e) => warn!("Skipping {} this cycle: {}", symbol, e),
            }
            results.push((symbol, result));
        }
        results
    }

    /// One live cycle over every instrument. Runtime failures stay with
    /// their instrument; the first configuration error is returned after
    /// the cycle completes.
    pub async fn run_cycle(&mut self) -> Result<(), BotError> {
        let mut fatal = None;
        for (_, result) in self.poll_all().await {
            if let Err(e) = result {
                if e.is_fatal() && fatal.is_none() {
                    fatal = Some(e);
                }
            }
        }
        fatal.map_or(Ok(()), Err)
    }

    /// Submit the order an action calls for and commit the transition only
    /// once the order is confirmed. Returns the closed trade, if any.
    pub async fn execute(&mut self, idx: usize, action: Action) -> Result<Option<TradeRecord>, BotError> {
        match action {
            Action::Hold => Ok(None),
            Action::Enter {
                price,
                timestamp,
                signal,
            } => {
                self.enter(idx, price, timestamp, &signal).await?;
                Ok(None)
            }
            Action::Exit {
                price,
                timestamp,
                reason,
            } => self.exit(idx, price, timestamp, reason).await.map(Some),
        }
    }

    async fn enter(
        &mut self,
        idx: usize,
        price: f64,
        timestamp: DateTime<Utc>,
        signal: &EntrySignal,
    ) -> Result<(), BotError> {
        let symbol = self.engines[idx].symbol().to_string();
        let decimals = self.engines[idx].config.quantity_decimals;

        let alert = format!(
            "🔥 STRONG SIGNAL on {}!\nADX: {:.1} | Price: ${:.6}",
            symbol, signal.trend_strength, signal.close
        );
        info!("{}", alert.replace('\n', " "));
        self.adapter.notifier.send(&alert).await;

        let quantity = order_quantity(self.order_size_usd, price);
        if quantity <= 0.0 {
            let err = BotError::order(
                &symbol,
                Side::Buy,
                format!("${} buys nothing at ${:.6}", self.order_size_usd, price),
            );
            return Err(self.report_failure(err).await);
        }

        let order = MarketOrder {
            symbol: symbol.clone(),
            side: Side::Buy,
            quantity,
            reference_price: price,
            quantity_decimals: decimals,
        };
        let conf = match self.adapter.orders.submit_market_order(&order).await {
            Ok(c) => c,
            Err(e) => return Err(self.report_failure(e).await),
        };

        self.engines[idx]
            .position
            .open(conf.fill_price, timestamp, conf.quantity);

        let msg = format!(
            "{}: BUY {} {} at ${:.6}",
            self.adapter.mode(),
            conf.quantity,
            symbol,
            conf.fill_price
        );
        info!("{}", msg);
        self.adapter.notifier.send(&msg).await;
        Ok(())
    }

    async fn exit(
        &mut self,
        idx: usize,
        price: f64,
        timestamp: DateTime<Utc>,
        reason: ExitReason,
    ) -> Result<TradeRecord, BotError> {
        let symbol = self.engines[idx].symbol().to_string();
        let fee = self.engines[idx].strategy().round_trip_fee_pct;
        let quantity = self.engines[idx].position.quantity().unwrap_or_default();
        let decimals = self.engines[idx].config.quantity_decimals;

        let alert = match reason {
            ExitReason::TakeProfit => format!("🎉 TAKE-PROFIT HIT 🎉\n{} → ${:.6}", symbol, price),
            ExitReason::StopLoss => format!("🚨 STOP-LOSS TRIGGERED 🚨\n{} → ${:.6}", symbol, price),
        };
        match reason {
            ExitReason::TakeProfit => info!("{}", alert.replace('\n', " ")),
            ExitReason::StopLoss => warn!("{}", alert.replace('\n', " ")),
        }
        self.adapter.notifier.send(&alert).await;

        let order = MarketOrder {
            symbol: symbol.clone(),
            side: Side::Sell,
            quantity,
            reference_price: price,
            quantity_decimals: decimals,
        };
        let conf = match self.adapter.orders.submit_market_order(&order).await {
            Ok(c) => c,
            Err(e) => return Err(self.report_failure(e).await),
        };

        let record = self.engines[idx]
            .position
            .close(conf.fill_price, timestamp, reason, fee)
            .ok_or_else(|| BotError::order(&symbol, Side::Sell, "no open position"))?;

        let msg = format!(
            "{}: SELL {} {} at ${:.6} ({}) {:+.2}%",
            self.adapter.mode(),
            conf.quantity,
            symbol,
            conf.fill_price,
            reason.short_label(),
            record.profit_pct
        );
        info!("{}", msg);
        self.adapter.notifier.send(&msg).await;

        self.ledger.record(record.clone());
        Ok(record)
    }

    async fn report_failure(&self, err: BotError) -> BotError {
        error!("Order failed: {}", err);
        self.adapter
            .notifier
            .send(&format!("❌ Order failed: {}", err))
            .await;
        err
    }
}

fn insufficient(engine: &InstrumentEngine) -> BotError {
    BotError::InsufficientHistory {
        instrument: engine.symbol().to_string(),
        bars: engine.bars_seen(),
        required: engine.warmup(),
    }
}

/// Units `usd` buys at `price`. Lot rounding is the venue's concern.
pub fn order_quantity(usd: f64, price: f64) -> f64 {
    if !(price.is_finite() && price > 0.0) {
        return 0.0;
    }
    usd / price
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{HistoricalExchange, SimulatedExecution};
    use crate::models::Timeframe;
    use crate::notify::NoopNotifier;
    use crate::test_helpers::{instrument, series_from_closes, strategy};
    use std::sync::Arc;

    fn session(instruments: Vec<InstrumentConfig>) -> TradingSession {
        let adapter = ExecutionAdapter::new(
            Arc::new(HistoricalExchange::new()),
            Arc::new(SimulatedExecution::quiet()),
            Arc::new(NoopNotifier),
        );
        TradingSession::new(instruments, 100.0, 500, adapter)
    }

    /// Cross at index 12 (close 14), then a rally through +10%.
    fn rally() -> Vec<f64> {
        let mut closes: Vec<f64> = (0..11).map(|i| 20.0 - i as f64).collect();
        closes.extend((0..6).map(|i| 12.0 + 2.0 * i as f64));
        closes
    }

    #[test]
    fn quantity_is_the_unrounded_budget() {
        assert!((order_quantity(100.0, 43_000.0) - 100.0 / 43_000.0).abs() < 1e-15);
        assert_eq!(order_quantity(100.0, 0.0), 0.0);
        assert_eq!(order_quantity(100.0, f64::NAN), 0.0);
    }

    #[tokio::test]
    async fn replay_ignores_lot_precision() {
        // $5 at $14 is less than one whole unit
        let mut coarse = instrument("BTC/USDT", strategy(2, 4, 3, 25.0));
        coarse.quantity_decimals = 0;
        let mut s = TradingSession::new(
            vec![coarse],
            5.0,
            500,
            ExecutionAdapter::new(
                Arc::new(HistoricalExchange::new()),
                Arc::new(SimulatedExecution::quiet()),
                Arc::new(NoopNotifier),
            ),
        );
        s.replay("BTC/USDT", &series_from_closes(&rally())).await.unwrap();
        assert_eq!(s.ledger().len(), 1);
    }

    #[tokio::test]
    async fn replay_enters_on_cross_and_takes_profit() {
        let mut s = session(vec![instrument("BTC/USDT", strategy(2, 4, 3, 25.0))]);
        let series = series_from_closes(&rally());
        s.replay("BTC/USDT", &series).await.unwrap();

        let trades = s.ledger().records();
        assert_eq!(trades.len(), 1);
        let t = &trades[0];
        assert_eq!(t.entry_price, 14.0);
        assert_eq!(t.entry_time, series[12].timestamp);
        // First close at or above 14 * 1.1 = 15.4 is 16
        assert_eq!(t.exit_price, 16.0);
        assert_eq!(t.exit_reason, ExitReason::TakeProfit);
        assert!(!s.engine("BTC/USDT").unwrap().position.is_long());
    }

    #[tokio::test]
    async fn replay_is_idempotent_for_seen_bars() {
        let mut s = session(vec![instrument("BTC/USDT", strategy(2, 4, 3, 25.0))]);
        let series = series_from_closes(&rally());
        s.replay("BTC/USDT", &series).await.unwrap();
        s.replay("BTC/USDT", &series).await.unwrap();
        assert_eq!(s.ledger().len(), 1);
    }

    #[tokio::test]
    async fn unknown_instrument_is_rejected() {
        let mut s = session(vec![instrument("BTC/USDT", strategy(2, 4, 3, 25.0))]);
        let err = s.replay("ETH/USDT", &CandleSeries::default()).await.unwrap_err();
        assert!(matches!(err, BotError::Configuration { .. }));
    }

    #[tokio::test]
    async fn poll_without_history_is_a_fetch_error() {
        let mut s = session(vec![instrument("BTC/USDT", strategy(2, 4, 3, 25.0))]);
        let err = s.poll("BTC/USDT").await.unwrap_err();
        assert!(matches!(err, BotError::DataFetch { .. }));
    }

    #[tokio::test]
    async fn poll_before_warmup_reports_insufficient_history() {
        let mut ex = HistoricalExchange::new();
        ex.load("BTC/USDT", Timeframe::M1, series_from_closes(&[10.0, 11.0, 12.0]));
        let adapter = ExecutionAdapter::new(
            Arc::new(ex),
            Arc::new(SimulatedExecution::quiet()),
            Arc::new(NoopNotifier),
        );
        let mut s = TradingSession::new(
            vec![instrument("BTC/USDT", strategy(2, 4, 3, 25.0))],
            100.0,
            500,
            adapter,
        );
        match s.poll("BTC/USDT").await {
            Err(BotError::InsufficientHistory { bars, required, .. }) => {
                assert_eq!(bars, 3);
                assert_eq!(required, 5);
            }
            other => panic!("expected insufficient history, got {:?}", other),
        }
    }
}
