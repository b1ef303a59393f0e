use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::BotError;
use crate::exchange::{FetchWindow, MarketData};
use crate::models::{Candle, CandleSeries, Timeframe};

/// A `MarketData` implementation that replays pre-loaded historical data.
/// A cursor (`now`) controls which candles are visible: only candles
/// with timestamp <= now are returned, simulating a forward walk.
pub struct HistoricalExchange {
    data: HashMap<(String, Timeframe), CandleSeries>,
    now_ms: AtomicI64,
}

impl Default for HistoricalExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoricalExchange {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            now_ms: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    /// Load the full history of one instrument at one timeframe.
    pub fn load(&mut self, symbol: &str, tf: Timeframe, series: CandleSeries) {
        self.data.insert((symbol.to_string(), tf), series);
    }

    pub fn series(&self, symbol: &str, tf: Timeframe) -> Option<&CandleSeries> {
        self.data.get(&(symbol.to_string(), tf))
    }

    /// Advance the simulation clock.
    pub fn set_time(&self, t: DateTime<Utc>) {
        self.now_ms.store(t.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn current_time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_ms.load(Ordering::SeqCst)).unwrap_or_default()
    }

    /// Earliest timestamp across everything loaded.
    pub fn earliest_time(&self) -> Option<DateTime<Utc>> {
        self.data
            .values()
            .filter_map(|s| s.first().map(|c| c.timestamp))
            .min()
    }

    /// Latest timestamp across everything loaded.
    pub fn latest_time(&self) -> Option<DateTime<Utc>> {
        self.data
            .values()
            .filter_map(|s| s.last().map(|c| c.timestamp))
            .max()
    }

    fn visible<'a>(&self, series: &'a CandleSeries) -> &'a [Candle] {
        let now = self.now_ms.load(Ordering::SeqCst);
        let all = series.as_slice();
        // Binary search for the rightmost candle <= now
        let end = all.partition_point(|c| c.timestamp.timestamp_millis() <= now);
        &all[..end]
    }

    /// Candles up to the cursor, restricted by `window`.
    pub fn visible_candles(&self, symbol: &str, tf: Timeframe, window: FetchWindow) -> CandleSeries {
        let Some(series) = self.series(symbol, tf) else {
            return CandleSeries::default();
        };
        let visible = self.visible(series);
        let start = match window {
            FetchWindow::Limit(n) => visible.len().saturating_sub(n),
            FetchWindow::Since(since) => visible.partition_point(|c| c.timestamp < since),
        };
        // Slicing an already validated series keeps it valid
        CandleSeries::try_new(visible[start..].to_vec()).unwrap_or_default()
    }
}

#[async_trait]
impl MarketData for HistoricalExchange {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        window: FetchWindow,
    ) -> Result<CandleSeries, BotError> {
        if self.series(symbol, timeframe).is_none() {
            return Err(BotError::data_fetch(
                symbol,
                format!("no {} history loaded", timeframe),
            ));
        }
        Ok(self.visible_candles(symbol, timeframe, window))
    }

    /// Close of the most recent visible bar of any loaded timeframe.
    async fn latest_price(&self, symbol: &str) -> Result<f64, BotError> {
        self.data
            .iter()
            .filter(|((s, _), _)| s == symbol)
            .filter_map(|(_, series)| self.visible(series).last())
            .max_by_key(|c| c.timestamp)
            .map(|c| c.close)
            .ok_or_else(|| BotError::data_fetch(symbol, "no price data at current time"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{base_time, series_from_closes};
    use chrono::Duration;

    fn exchange() -> HistoricalExchange {
        let mut ex = HistoricalExchange::new();
        ex.load("BTC/USDT", Timeframe::M1, series_from_closes(&[10.0, 11.0, 12.0, 13.0, 14.0]));
        ex
    }

    #[tokio::test]
    async fn cursor_limits_visibility() {
        let ex = exchange();
        ex.set_time(base_time() + Duration::minutes(2));
        let s = ex
            .fetch_candles("BTC/USDT", Timeframe::M1, FetchWindow::Limit(100))
            .await
            .unwrap();
        assert_eq!(s.len(), 3);
        assert_eq!(ex.latest_price("BTC/USDT").await.unwrap(), 12.0);
    }

    #[tokio::test]
    async fn limit_and_since_windows() {
        let ex = exchange();
        ex.set_time(base_time() + Duration::minutes(10));
        let last_two = ex.visible_candles("BTC/USDT", Timeframe::M1, FetchWindow::Limit(2));
        assert_eq!(last_two.closes(), vec![13.0, 14.0]);
        let since = ex.visible_candles(
            "BTC/USDT",
            Timeframe::M1,
            FetchWindow::Since(base_time() + Duration::minutes(3)),
        );
        assert_eq!(since.closes(), vec![13.0, 14.0]);
    }

    #[tokio::test]
    async fn nothing_visible_before_first_bar() {
        let ex = exchange();
        ex.set_time(base_time() - Duration::minutes(1));
        assert!(ex.latest_price("BTC/USDT").await.is_err());
        let s = ex
            .fetch_candles("BTC/USDT", Timeframe::M1, FetchWindow::Limit(10))
            .await
            .unwrap();
        assert!(s.is_empty());
    }

    #[tokio::test]
    async fn unknown_instrument_is_a_fetch_error() {
        let ex = exchange();
        let err = ex
            .fetch_candles("ETH/USDT", Timeframe::M1, FetchWindow::Limit(10))
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::DataFetch { .. }));
    }

    #[tokio::test]
    async fn price_comes_from_newest_visible_bar_across_timeframes() {
        let mut ex = exchange();
        ex.load("BTC/USDT", Timeframe::M5, series_from_closes(&[50.0, 60.0]));
        ex.set_time(base_time() + Duration::minutes(3));
        // M1 bar at +3 is newer than the M5 bar at +1
        assert_eq!(ex.latest_price("BTC/USDT").await.unwrap(), 13.0);
    }

    #[test]
    fn time_bounds() {
        let ex = exchange();
        assert_eq!(ex.earliest_time(), Some(base_time()));
        assert_eq!(ex.latest_time(), Some(base_time() + Duration::minutes(4)));
        ex.set_time(base_time());
        assert_eq!(ex.current_time(), base_time());
    }
}
