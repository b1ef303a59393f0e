#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use golden_cross_bot::config::{Config, ExecutionMode, InstrumentConfig, StrategyConfig};
use golden_cross_bot::error::BotError;
use golden_cross_bot::exchange::{FetchWindow, MarketData, MarketOrder, OrderConfirmation, OrderExecution};
use golden_cross_bot::models::{Candle, CandleSeries, Timeframe};
use golden_cross_bot::notify::Notifier;

pub fn base_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-15T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// One-minute bars, one per close, with high/low one unit either side.
/// Lows stay positive for closes below 2.
pub fn series_from_closes(closes: &[f64]) -> CandleSeries {
    let base = base_time();
    let candles: Vec<Candle> = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Candle {
            timestamp: base + Duration::minutes(i as i64),
            open: c,
            high: c + 1.0,
            low: (c - 1.0).max(c * 0.5),
            close: c,
            volume: 100.0,
        })
        .collect();
    CandleSeries::try_new(candles).unwrap()
}

/// Falls from 20 to 10, then climbs by 2 per bar. With SMA 2/4 and ADX(3)
/// the golden cross lands on index 12 (close 14).
pub fn reversal(rising_bars: usize) -> Vec<f64> {
    let mut closes: Vec<f64> = (0..11).map(|i| 20.0 - i as f64).collect();
    closes.extend((0..rising_bars).map(|i| 12.0 + 2.0 * i as f64));
    closes
}

/// Several up and down swings around 100 with a slight drift.
pub fn waves(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let x = i as f64;
            100.0 + 20.0 * (x / 9.0).sin() + 0.05 * x
        })
        .collect()
}

pub fn strategy(short: usize, long: usize, adx_period: usize, threshold: f64) -> StrategyConfig {
    StrategyConfig {
        sma_short_period: short,
        sma_long_period: long,
        adx_period,
        adx_threshold: threshold,
        stop_loss_pct: 5.0,
        take_profit_pct: 10.0,
        round_trip_fee_pct: 0.04,
    }
}

pub fn instrument(symbol: &str, strategy: StrategyConfig) -> InstrumentConfig {
    InstrumentConfig {
        symbol: symbol.to_string(),
        timeframe: Timeframe::M1,
        quantity_decimals: 4,
        strategy,
    }
}

pub fn config(instruments: Vec<InstrumentConfig>) -> Config {
    Config {
        instruments,
        mode: ExecutionMode::Simulated,
        order_size_usd: 100.0,
        poll_interval_secs: 60,
        history_limit: 500,
        binance_base_url: String::new(),
        binance_data_url: String::new(),
        binance_api_key: String::new(),
        binance_api_secret: String::new(),
        telegram_bot_token: None,
        telegram_chat_id: None,
        backtest_days: 1,
        data_dir: String::new(),
        log_level: "info".to_string(),
    }
}

/// Serves fixed series per symbol; symbols in `failing` always error.
#[derive(Default)]
pub struct MockMarket {
    pub data: HashMap<String, CandleSeries>,
    pub failing: HashSet<String>,
    pub unknown_to_venue: HashSet<String>,
}

impl MockMarket {
    pub fn with(mut self, symbol: &str, series: CandleSeries) -> Self {
        self.data.insert(symbol.to_string(), series);
        self
    }

    pub fn failing(mut self, symbol: &str) -> Self {
        self.failing.insert(symbol.to_string());
        self
    }

    /// The venue does not list this symbol at all.
    pub fn unknown_to_venue(mut self, symbol: &str) -> Self {
        self.unknown_to_venue.insert(symbol.to_string());
        self
    }
}

#[async_trait]
impl MarketData for MockMarket {
    async fn fetch_candles(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
        window: FetchWindow,
    ) -> Result<CandleSeries, BotError> {
        if self.failing.contains(symbol) {
            return Err(BotError::data_fetch(symbol, "connection reset"));
        }
        if self.unknown_to_venue.contains(symbol) {
            return Err(BotError::config("SYMBOLS", format!("{} is not listed", symbol)));
        }
        let series = self
            .data
            .get(symbol)
            .ok_or_else(|| BotError::data_fetch(symbol, "unknown symbol"))?;
        Ok(match window {
            FetchWindow::Limit(n) => series.tail(n),
            FetchWindow::Since(_) => series.clone(),
        })
    }

    async fn latest_price(&self, symbol: &str) -> Result<f64, BotError> {
        self.data
            .get(symbol)
            .and_then(|s| s.last())
            .map(|c| c.close)
            .ok_or_else(|| BotError::data_fetch(symbol, "no ticker"))
    }
}

/// Rejects every order, like an exchange with no balance.
pub struct RejectingOrders;

#[async_trait]
impl OrderExecution for RejectingOrders {
    async fn submit_market_order(&self, order: &MarketOrder) -> Result<OrderConfirmation, BotError> {
        Err(BotError::order(&order.symbol, order.side, "insufficient balance"))
    }

    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Live
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn any_contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) {
        self.messages.lock().unwrap().push(text.to_string());
    }
}
