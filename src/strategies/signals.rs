use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::IndicatorFrame;

/// A trend-confirmed golden cross on the current bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntrySignal {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub sma_short: f64,
    pub sma_long: f64,
    pub trend_strength: f64,
}

/// Stateless crossover detector. Edge detection relies only on the
/// previous/current pair handed in by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalDetector {
    pub adx_threshold: f64,
}

impl SignalDetector {
    pub fn new(adx_threshold: f64) -> Self {
        Self { adx_threshold }
    }

    pub fn detect(&self, previous: &IndicatorFrame, current: &IndicatorFrame) -> Option<EntrySignal> {
        if !previous.is_defined() {
            return None;
        }
        let (prev_short, prev_long) = (previous.sma_short?, previous.sma_long?);
        let (short, long, strength) = (
            current.sma_short?,
            current.sma_long?,
            current.trend_strength?,
        );

        let crossed = prev_short <= prev_long && short > long;
        if !crossed || strength <= self.adx_threshold {
            return None;
        }

        Some(EntrySignal {
            timestamp: current.timestamp,
            close: current.close,
            sma_short: short,
            sma_long: long,
            trend_strength: strength,
        })
    }
}
