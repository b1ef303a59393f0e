use chrono::{DateTime, Duration, Utc};

use crate::config::{InstrumentConfig, StrategyConfig};
use crate::models::{Candle, CandleSeries, ExitReason, Timeframe};
use crate::trading::TradeRecord;

pub fn base_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-15T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Create candles from (open, high, low, close) tuples with auto-incrementing 1m timestamps.
pub fn make_candles(data: &[(f64, f64, f64, f64)]) -> CandleSeries {
    let base = base_time();
    let candles: Vec<Candle> = data
        .iter()
        .enumerate()
        .map(|(i, &(o, h, l, c))| Candle {
            timestamp: base + Duration::minutes(i as i64),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: 100.0,
        })
        .collect();

    CandleSeries::try_new(candles).unwrap()
}

/// One bar per close, with high/low one unit either side. Lows stay
/// positive for closes below 2.
pub fn series_from_closes(closes: &[f64]) -> CandleSeries {
    let data: Vec<(f64, f64, f64, f64)> = closes
        .iter()
        .map(|&c| (c, c + 1.0, (c - 1.0).max(c * 0.5), c))
        .collect();
    make_candles(&data)
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

/// A closed trade with the given profit, exit reason inferred from its sign.
pub fn trade(instrument: &str, profit_pct: f64) -> TradeRecord {
    TradeRecord {
        instrument: instrument.to_string(),
        entry_price: 100.0,
        exit_price: 100.0 + profit_pct,
        exit_reason: if profit_pct > 0.0 {
            ExitReason::TakeProfit
        } else {
            ExitReason::StopLoss
        },
        profit_pct,
        entry_time: base_time(),
        exit_time: base_time() + Duration::hours(1),
    }
}

#[test]
fn small_closes_make_a_valid_series() {
    let series = series_from_closes(&[0.5, 1.0, 2.0, 3.0]);
    let lows: Vec<f64> = series.iter().map(|c| c.low).collect();
    assert_eq!(lows, vec![0.25, 0.5, 1.0, 2.0]);
}
