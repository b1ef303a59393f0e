use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::StrategyConfig;
use crate::core::adx::TrendStrength;
use crate::core::sma::RollingSma;
use crate::models::{Candle, CandleSeries};

/// Indicator values for one candle. Every value is `None` until the
/// warm-up has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorFrame {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub sma_short: Option<f64>,
    pub sma_long: Option<f64>,
    pub trend_strength: Option<f64>,
}

impl IndicatorFrame {
    pub fn is_defined(&self) -> bool {
        self.sma_short.is_some() && self.sma_long.is_some() && self.trend_strength.is_some()
    }
}

/// Incremental indicator state for one instrument. Backtests feed it every
/// bar of a series; the live loop feeds it only bars it has not seen yet.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    sma_short: RollingSma,
    sma_long: RollingSma,
    trend: TrendStrength,
    warmup: usize,
    bars_seen: usize,
}

impl IndicatorEngine {
    pub fn new(cfg: &StrategyConfig) -> Self {
        Self {
            sma_short: RollingSma::new(cfg.sma_short_period),
            sma_long: RollingSma::new(cfg.sma_long_period),
            trend: TrendStrength::new(cfg.adx_period),
            warmup: cfg.warmup(),
            bars_seen: 0,
        }
    }

    pub fn update(&mut self, candle: &Candle) -> IndicatorFrame {
        let short = self.sma_short.update(candle.close);
        let long = self.sma_long.update(candle.close);
        let trend = self.trend.update(candle);
        self.bars_seen += 1;

        let warm = self.is_warm();
        IndicatorFrame {
            timestamp: candle.timestamp,
            close: candle.close,
            sma_short: short.filter(|_| warm),
            sma_long: long.filter(|_| warm),
            trend_strength: trend.filter(|_| warm),
        }
    }

    pub fn is_warm(&self) -> bool {
        self.bars_seen >= self.warmup
    }

    pub fn bars_seen(&self) -> usize {
        self.bars_seen
    }

    pub fn warmup(&self) -> usize {
        self.warmup
    }
}

/// Frames for a whole series, aligned one-to-one with its candles.
pub fn compute_frames(series: &CandleSeries, cfg: &StrategyConfig) -> Vec<IndicatorFrame> {
    let mut engine = IndicatorEngine::new(cfg);
    series.iter().map(|c| engine.update(c)).collect()
}
