use crate::models::Side;

/// Errors raised by the trading pipeline and its collaborators.
///
/// Everything except `Configuration` is recoverable: the driver logs it and
/// moves on to the next instrument or tick.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("failed to fetch market data for {instrument}: {reason}")]
    DataFetch { instrument: String, reason: String },

    #[error("insufficient history for {instrument}: have {bars} bars, need {required}")]
    InsufficientHistory {
        instrument: String,
        bars: usize,
        required: usize,
    },

    #[error("{side} order for {instrument} failed: {reason}")]
    OrderSubmission {
        instrument: String,
        side: Side,
        reason: String,
    },

    #[error("invalid configuration {key}: {reason}")]
    Configuration { key: String, reason: String },

    #[error("invalid candle series: {reason}")]
    InvalidSeries { reason: String },
}

impl BotError {
    pub fn data_fetch(instrument: &str, reason: impl std::fmt::Display) -> Self {
        BotError::DataFetch {
            instrument: instrument.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn order(instrument: &str, side: Side, reason: impl std::fmt::Display) -> Self {
        BotError::OrderSubmission {
            instrument: instrument.to_string(),
            side,
            reason: reason.to_string(),
        }
    }

    pub fn config(key: &str, reason: impl std::fmt::Display) -> Self {
        BotError::Configuration {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Only configuration problems are allowed to stop the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BotError::Configuration { .. })
    }
}
