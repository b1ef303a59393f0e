use chrono::{DateTime, Utc};

use crate::config::{InstrumentConfig, StrategyConfig};
use crate::core::{IndicatorEngine, IndicatorFrame};
use crate::models::{Candle, CandleSeries};
use crate::strategies::signals::{EntrySignal, SignalDetector};
use crate::trading::PositionState;

/// Everything the bot knows about one instrument: its parameters, rolling
/// indicator state, the last frame (for edge detection) and its position.
#[derive(Debug, Clone)]
pub struct InstrumentEngine {
    pub config: InstrumentConfig,
    pub position: PositionState,
    indicators: IndicatorEngine,
    detector: SignalDetector,
    previous: Option<IndicatorFrame>,
    last_seen: Option<DateTime<Utc>>,
}

impl InstrumentEngine {
    pub fn new(config: InstrumentConfig) -> Self {
        Self {
            indicators: IndicatorEngine::new(&config.strategy),
            detector: SignalDetector::new(config.strategy.adx_threshold),
            position: PositionState::flat(&config.symbol),
            previous: None,
            last_seen: None,
            config,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    pub fn strategy(&self) -> &StrategyConfig {
        &self.config.strategy
    }

    pub fn is_warm(&self) -> bool {
        self.indicators.is_warm()
    }

    pub fn bars_seen(&self) -> usize {
        self.indicators.bars_seen()
    }

    pub fn warmup(&self) -> usize {
        self.indicators.warmup()
    }

    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_seen
    }

    pub fn last_frame(&self) -> Option<&IndicatorFrame> {
        self.previous.as_ref()
    }

    /// Feed one new bar and return the entry verdict for it.
    pub fn observe(&mut self, candle: &Candle) -> Option<EntrySignal> {
        let frame = self.indicators.update(candle);
        let signal = self
            .previous
            .as_ref()
            .and_then(|prev| self.detector.detect(prev, &frame));
        self.previous = Some(frame);
        self.last_seen = Some(candle.timestamp);
        signal
    }

    /// Feed only the bars newer than the last one observed. Returns how many
    /// were new and the verdict for the newest of them; verdicts for older
    /// bars in the batch are stale and discarded.
    pub fn ingest_new(&mut self, series: &CandleSeries) -> (usize, Option<EntrySignal>) {
        let fresh = match self.last_seen {
            Some(ts) => series.after(ts),
            None => series.as_slice(),
        };
        let mut latest = None;
        for candle in fresh {
            latest = self.observe(candle);
        }
        (fresh.len(), latest)
    }
}
