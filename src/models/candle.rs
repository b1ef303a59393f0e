use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BotError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    fn has_valid_prices(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite() && *p > 0.0)
    }
}

/// Price history for one instrument, oldest first.
///
/// Timestamps are strictly increasing and every price is positive. The
/// series is never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Build a series from candles that are already ordered.
    pub fn try_new(candles: Vec<Candle>) -> Result<Self, BotError> {
        for (i, c) in candles.iter().enumerate() {
            if !c.has_valid_prices() {
                return Err(BotError::InvalidSeries {
                    reason: format!("non-positive price at {}", c.timestamp),
                });
            }
            if i > 0 && c.timestamp <= candles[i - 1].timestamp {
                return Err(BotError::InvalidSeries {
                    reason: format!(
                        "timestamp {} does not follow {}",
                        c.timestamp,
                        candles[i - 1].timestamp
                    ),
                });
            }
        }
        Ok(Self { candles })
    }

    /// Build a series from raw exchange rows: sort by time and drop duplicate
    /// timestamps before validating.
    pub fn from_unsorted(mut candles: Vec<Candle>) -> Result<Self, BotError> {
        candles.sort_by_key(|c| c.timestamp);
        candles.dedup_by_key(|c| c.timestamp);
        Self::try_new(candles)
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.candles.get(index)
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn first(&self) -> Option<&Candle> {
        self.candles.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candle> {
        self.candles.iter()
    }

    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// The last `n` candles.
    pub fn tail(&self, n: usize) -> CandleSeries {
        let start = self.candles.len().saturating_sub(n);
        CandleSeries {
            candles: self.candles[start..].to_vec(),
        }
    }

    /// Candles strictly newer than `ts`.
    pub fn after(&self, ts: DateTime<Utc>) -> &[Candle] {
        let start = self.candles.partition_point(|c| c.timestamp <= ts);
        &self.candles[start..]
    }
}

impl std::ops::Index<usize> for CandleSeries {
    type Output = Candle;
    fn index(&self, index: usize) -> &Self::Output {
        &self.candles[index]
    }
}

impl IntoIterator for CandleSeries {
    type Item = Candle;
    type IntoIter = std::vec::IntoIter<Candle>;
    fn into_iter(self) -> Self::IntoIter {
        self.candles.into_iter()
    }
}

impl<'a> IntoIterator for &'a CandleSeries {
    type Item = &'a Candle;
    type IntoIter = std::slice::Iter<'a, Candle>;
    fn into_iter(self) -> Self::IntoIter {
        self.candles.iter()
    }
}
