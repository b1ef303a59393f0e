use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::{exchange_symbol, Config, ExecutionMode};
use crate::error::BotError;
use crate::exchange::{FetchWindow, MarketData, MarketOrder, OrderConfirmation, OrderExecution};
use crate::models::{Candle, CandleSeries, Timeframe};

type HmacSha256 = Hmac<Sha256>;

const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(100);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const RECV_WINDOW_MS: u64 = 5000;
/// Largest page `/api/v3/klines` will return.
const KLINES_PAGE: usize = 1000;

#[derive(Debug, Deserialize)]
struct TickerResponse {
    price: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: u64,
    #[serde(default)]
    executed_qty: Option<String>,
    #[serde(default)]
    cummulative_quote_qty: Option<String>,
}

/// Binance spot REST client. Public endpoints need no credentials; orders
/// are signed with HMAC-SHA256 over the query string.
pub struct BinanceClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    last_request: Mutex<Option<Instant>>,
}

impl BinanceClient {
    /// Trading client against the configured (testnet by default) endpoint.
    pub fn new(cfg: &Config) -> Result<Self, BotError> {
        Self::build(
            &cfg.binance_base_url,
            &cfg.binance_api_key,
            &cfg.binance_api_secret,
        )
    }

    /// Unauthenticated client for historical downloads.
    pub fn public(base_url: &str) -> Result<Self, BotError> {
        Self::build(base_url, "", "")
    }

    fn build(base_url: &str, api_key: &str, api_secret: &str) -> Result<Self, BotError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BotError::config("BINANCE_BASE_URL", e))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            last_request: Mutex::new(None),
        })
    }

    async fn rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < MIN_REQUEST_INTERVAL {
                tokio::time::sleep(MIN_REQUEST_INTERVAL - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    fn sign(&self, query: &str) -> Result<String> {
        if self.api_secret.is_empty() {
            anyhow::bail!("API secret required for signed requests");
        }
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("failed to init signer: {e}"))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// One page of klines. Bars still forming at `now` are dropped.
    async fn klines_page(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        self.rate_limit().await;

        let mut query = vec![
            ("symbol", exchange_symbol(symbol)),
            ("interval", timeframe.as_str().to_string()),
            ("limit", limit.min(KLINES_PAGE).to_string()),
        ];
        if let Some(start) = start {
            query.push(("startTime", start.timestamp_millis().to_string()));
        }

        let resp = self
            .client
            .get(format!("{}/api/v3/klines", self.base_url))
            .query(&query)
            .send()
            .await
            .context("Failed to fetch klines")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error {}: {}", status, body);
        }

        let raw: Vec<serde_json::Value> = resp.json().await.context("Failed to parse klines")?;
        Ok(parse_klines(&raw, Utc::now()))
    }

    /// Every closed bar since `since`, paging forward until the exchange runs out.
    pub async fn fetch_klines_since(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let mut all: Vec<Candle> = Vec::new();
        let mut cursor = since;

        loop {
            let page = self.klines_page(symbol, timeframe, Some(cursor), KLINES_PAGE).await?;
            let count = page.len();
            let Some(last) = page.last().map(|c| c.timestamp) else {
                break;
            };
            all.extend(page);
            debug!("{} {}: fetched {} bars up to {}", symbol, timeframe, all.len(), last);

            // A short page means we reached the present
            if count < KLINES_PAGE {
                break;
            }
            cursor = last + chrono::Duration::milliseconds(1);
        }

        Ok(all)
    }

    async fn ticker_price(&self, symbol: &str) -> Result<f64> {
        self.rate_limit().await;

        let resp = self
            .client
            .get(format!("{}/api/v3/ticker/price", self.base_url))
            .query(&[("symbol", exchange_symbol(symbol))])
            .send()
            .await
            .context("Failed to fetch ticker")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error {}: {}", status, body);
        }

        let ticker: TickerResponse = resp.json().await.context("Failed to parse ticker")?;
        ticker
            .price
            .parse::<f64>()
            .context("Ticker price is not a number")
    }

    async fn place_market_order(&self, order: &MarketOrder) -> Result<OrderConfirmation> {
        let quantity = lot_quantity(order.quantity, order.quantity_decimals);
        if quantity <= 0.0 {
            anyhow::bail!(
                "{} is below the {}-decimal lot size",
                order.quantity,
                order.quantity_decimals
            );
        }

        self.rate_limit().await;

        let query = format!(
            "symbol={}&side={}&type=MARKET&quantity={}&recvWindow={}&timestamp={}",
            exchange_symbol(&order.symbol),
            order.side.as_binance(),
            format_quantity(quantity),
            RECV_WINDOW_MS,
            Utc::now().timestamp_millis(),
        );
        let signature = self.sign(&query)?;

        let resp = self
            .client
            .post(format!(
                "{}/api/v3/order?{}&signature={}",
                self.base_url, query, signature
            ))
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .context("Failed to submit order")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error {}: {}", status, body);
        }

        let body: OrderResponse = resp.json().await.context("Failed to parse order response")?;
        let executed = parse_opt(&body.executed_qty).filter(|q| *q > 0.0);
        let quote = parse_opt(&body.cummulative_quote_qty);

        let (quantity, fill_price) = match (executed, quote) {
            (Some(q), Some(quote)) if quote > 0.0 => (q, quote / q),
            (Some(q), _) => (q, order.reference_price),
            _ => (quantity, order.reference_price),
        };

        Ok(OrderConfirmation {
            order_id: body.order_id.to_string(),
            symbol: order.symbol.clone(),
            side: order.side,
            quantity,
            fill_price,
        })
    }
}

#[async_trait]
impl MarketData for BinanceClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        window: FetchWindow,
    ) -> Result<CandleSeries, BotError> {
        let candles = match window {
            FetchWindow::Since(since) => self.fetch_klines_since(symbol, timeframe, since).await,
            // One extra so the dropped forming bar does not shrink the window
            FetchWindow::Limit(n) => self.klines_page(symbol, timeframe, None, n + 1).await.map(
                |mut c| {
                    let excess = c.len().saturating_sub(n);
                    c.drain(..excess);
                    c
                },
            ),
        }
        .map_err(|e| BotError::data_fetch(symbol, format!("{:#}", e)))?;

        CandleSeries::from_unsorted(candles).map_err(|e| BotError::data_fetch(symbol, e))
    }

    async fn latest_price(&self, symbol: &str) -> Result<f64, BotError> {
        self.ticker_price(symbol)
            .await
            .map_err(|e| BotError::data_fetch(symbol, format!("{:#}", e)))
    }
}

#[async_trait]
impl OrderExecution for BinanceClient {
    async fn submit_market_order(&self, order: &MarketOrder) -> Result<OrderConfirmation, BotError> {
        self.place_market_order(order)
            .await
            .map_err(|e| BotError::order(&order.symbol, order.side, format!("{:#}", e)))
    }

    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Live
    }
}

/// Kline rows are `[openTime, open, high, low, close, volume, closeTime, ...]`
/// with prices as strings. Malformed rows and bars closing after `now` are
/// skipped.
fn parse_klines(raw: &[serde_json::Value], now: DateTime<Utc>) -> Vec<Candle> {
    raw.iter()
        .filter_map(|row| {
            let arr = row.as_array()?;
            if arr.len() < 7 {
                return None;
            }
            let close_time = DateTime::from_timestamp_millis(arr[6].as_i64()?)?;
            if close_time > now {
                return None;
            }
            Some(Candle {
                timestamp: DateTime::from_timestamp_millis(arr[0].as_i64()?)?,
                open: arr[1].as_str()?.parse().ok()?,
                high: arr[2].as_str()?.parse().ok()?,
                low: arr[3].as_str()?.parse().ok()?,
                close: arr[4].as_str()?.parse().ok()?,
                volume: arr[5].as_str()?.parse().ok()?,
            })
        })
        .collect()
}

fn parse_opt(value: &Option<String>) -> Option<f64> {
    value.as_deref().and_then(|v| v.parse::<f64>().ok())
}

/// Truncate to the lot precision so the order never spends more than asked.
fn lot_quantity(quantity: f64, decimals: u32) -> f64 {
    if !quantity.is_finite() || quantity <= 0.0 {
        return 0.0;
    }
    let scale = 10f64.powi(decimals as i32);
    (quantity * scale).floor() / scale
}

/// Plain decimal without float noise or trailing zeros.
fn format_quantity(quantity: f64) -> String {
    let s = format!("{:.8}", quantity);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}
