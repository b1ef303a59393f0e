use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ExitReason;

/// A closed round trip. Never modified after it is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub instrument: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    /// Net of the round-trip fee, in percent.
    pub profit_pct: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
}

impl TradeRecord {
    pub fn is_win(&self) -> bool {
        self.profit_pct > 0.0
    }
}

/// `(exit / entry - 1) * 100 - fee`
pub fn profit_pct(entry_price: f64, exit_price: f64, round_trip_fee_pct: f64) -> f64 {
    (exit_price / entry_price - 1.0) * 100.0 - round_trip_fee_pct
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profit_includes_round_trip_fee() {
        assert!((profit_pct(100.0, 110.0, 0.04) - 9.96).abs() < 1e-9);
    }

    #[test]
    fn flat_exit_loses_the_fee() {
        let p = profit_pct(250.0, 250.0, 0.04);
        assert!((p + 0.04).abs() < 1e-12);
    }

    #[test]
    fn losing_trade() {
        assert!((profit_pct(100.0, 95.0, 0.0) + 5.0).abs() < 1e-9);
    }
}
