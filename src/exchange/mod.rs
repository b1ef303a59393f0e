pub mod binance;
pub mod historical;
pub mod simulated;

pub use binance::BinanceClient;
pub use historical::HistoricalExchange;
pub use simulated::SimulatedExecution;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::{Config, ExecutionMode};
use crate::error::BotError;
use crate::models::{CandleSeries, Side, Timeframe};
use crate::notify::{Notifier, TelegramNotifier};

/// How much history to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchWindow {
    /// Every closed bar opening at or after the timestamp.
    Since(DateTime<Utc>),
    /// The most recent `n` closed bars.
    Limit(usize),
}

#[async_trait]
pub trait MarketData: Send + Sync {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        window: FetchWindow,
    ) -> Result<CandleSeries, BotError>;

    async fn latest_price(&self, symbol: &str) -> Result<f64, BotError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketOrder {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    /// Price the decision was made at. Simulated fills use it as the fill.
    pub reference_price: f64,
    /// Lot precision of the venue. Live orders are truncated to it.
    pub quantity_decimals: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderConfirmation {
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub fill_price: f64,
}

#[async_trait]
pub trait OrderExecution: Send + Sync {
    async fn submit_market_order(&self, order: &MarketOrder) -> Result<OrderConfirmation, BotError>;

    fn mode(&self) -> ExecutionMode;
}

/// The collaborators one trading session talks to. Backtests, dry runs and
/// live trading differ only in which implementations are plugged in.
#[derive(Clone)]
pub struct ExecutionAdapter {
    pub market: Arc<dyn MarketData>,
    pub orders: Arc<dyn OrderExecution>,
    pub notifier: Arc<dyn Notifier>,
}

impl ExecutionAdapter {
    pub fn new(
        market: Arc<dyn MarketData>,
        orders: Arc<dyn OrderExecution>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            market,
            orders,
            notifier,
        }
    }

    /// Binance market data with either synthetic fills or signed orders,
    /// depending on the configured mode.
    pub fn from_config(cfg: &Config) -> Result<Self, BotError> {
        let client = Arc::new(BinanceClient::new(cfg)?);
        let orders: Arc<dyn OrderExecution> = match cfg.mode {
            ExecutionMode::Simulated => Arc::new(SimulatedExecution::new()),
            ExecutionMode::Live => client.clone(),
        };
        let notifier = Arc::new(TelegramNotifier::new(
            cfg.telegram_bot_token.clone(),
            cfg.telegram_chat_id.clone(),
        ));
        Ok(Self::new(client, orders, notifier))
    }

    pub fn mode(&self) -> ExecutionMode {
        self.orders.mode()
    }
}
