use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::StrategyConfig;
use crate::models::ExitReason;
use crate::strategies::signals::EntrySignal;
use crate::trading::trade_record::{profit_pct, TradeRecord};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum Phase {
    Flat,
    Long {
        entry_price: f64,
        entry_timestamp: DateTime<Utc>,
        quantity: f64,
    },
}

/// What the position machine wants to do on this evaluation. Nothing is
/// applied until the caller commits it with `open` or `close`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Hold,
    Enter {
        price: f64,
        timestamp: DateTime<Utc>,
        signal: EntrySignal,
    },
    Exit {
        price: f64,
        timestamp: DateTime<Utc>,
        reason: ExitReason,
    },
}

/// Checks take-profit before stop-loss, so a price satisfying both
/// thresholds exits as `TakeProfit`.
pub fn exit_reason(entry_price: f64, price: f64, cfg: &StrategyConfig) -> Option<ExitReason> {
    let take_profit = entry_price * (1.0 + cfg.take_profit_pct / 100.0);
    let stop_loss = entry_price * (1.0 - cfg.stop_loss_pct / 100.0);

    if price >= take_profit {
        Some(ExitReason::TakeProfit)
    } else if price <= stop_loss {
        Some(ExitReason::StopLoss)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    pub instrument: String,
    pub phase: Phase,
}

impl PositionState {
    pub fn flat(instrument: &str) -> Self {
        Self {
            instrument: instrument.to_string(),
            phase: Phase::Flat,
        }
    }

    pub fn is_long(&self) -> bool {
        matches!(self.phase, Phase::Long { .. })
    }

    pub fn entry_price(&self) -> Option<f64> {
        match self.phase {
            Phase::Long { entry_price, .. } => Some(entry_price),
            Phase::Flat => None,
        }
    }

    pub fn quantity(&self) -> Option<f64> {
        match self.phase {
            Phase::Long { quantity, .. } => Some(quantity),
            Phase::Flat => None,
        }
    }

    /// Propose a transition. While flat only an entry signal matters; while
    /// long entry signals are ignored and `price` is checked against the exit
    /// thresholds.
    pub fn decide(
        &self,
        signal: Option<&EntrySignal>,
        price: f64,
        timestamp: DateTime<Utc>,
        cfg: &StrategyConfig,
    ) -> Action {
        match self.phase {
            Phase::Flat => match signal {
                Some(sig) => Action::Enter {
                    price: sig.close,
                    timestamp: sig.timestamp,
                    signal: *sig,
                },
                None => Action::Hold,
            },
            Phase::Long { entry_price, .. } => match exit_reason(entry_price, price, cfg) {
                Some(reason) => Action::Exit {
                    price,
                    timestamp,
                    reason,
                },
                None => Action::Hold,
            },
        }
    }

    /// Flat -> Long. Returns false and changes nothing if already long.
    pub fn open(&mut self, entry_price: f64, entry_timestamp: DateTime<Utc>, quantity: f64) -> bool {
        if self.is_long() {
            return false;
        }
        self.phase = Phase::Long {
            entry_price,
            entry_timestamp,
            quantity,
        };
        true
    }

    /// Long -> Flat, producing the closed trade. `None` if already flat.
    pub fn close(
        &mut self,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        reason: ExitReason,
        round_trip_fee_pct: f64,
    ) -> Option<TradeRecord> {
        let (entry_price, entry_time) = match self.phase {
            Phase::Long {
                entry_price,
                entry_timestamp,
                ..
            } => (entry_price, entry_timestamp),
            Phase::Flat => return None,
        };
        self.phase = Phase::Flat;

        Some(TradeRecord {
            instrument: self.instrument.clone(),
            entry_price,
            exit_price,
            exit_reason: reason,
            profit_pct: profit_pct(entry_price, exit_price, round_trip_fee_pct),
            entry_time,
            exit_time,
        })
    }
}
