use serde::{Deserialize, Serialize};

use crate::models::ExitReason;
use crate::trading::trade_record::TradeRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentStats {
    pub instrument: String,
    pub trades: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub mean_profit_pct: f64,
    pub total_profit_pct: f64,
}

/// Append-only list of closed trades with statistics computed on demand.
#[derive(Debug, Clone, Default)]
pub struct TradeLedger {
    records: Vec<TradeRecord>,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, trade: TradeRecord) {
        self.records.push(trade);
    }

    pub fn records(&self) -> &[TradeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn wins(&self) -> usize {
        self.records.iter().filter(|r| r.is_win()).count()
    }

    /// Percentage of trades with positive profit, 0 when empty.
    pub fn win_rate(&self) -> f64 {
        win_rate(self.wins(), self.len())
    }

    /// Sum of per-trade profit percentages.
    pub fn net_return(&self) -> f64 {
        self.records.iter().map(|r| r.profit_pct).sum()
    }

    pub fn mean_profit(&self) -> f64 {
        mean(self.net_return(), self.len())
    }

    pub fn count_by_reason(&self, reason: ExitReason) -> usize {
        self.records.iter().filter(|r| r.exit_reason == reason).count()
    }

    pub fn best(&self) -> Option<f64> {
        self.records.iter().map(|r| r.profit_pct).reduce(f64::max)
    }

    pub fn worst(&self) -> Option<f64> {
        self.records.iter().map(|r| r.profit_pct).reduce(f64::min)
    }

    pub fn avg_win(&self) -> f64 {
        let wins: Vec<f64> = self.profits().filter(|p| *p > 0.0).collect();
        mean(wins.iter().sum(), wins.len())
    }

    pub fn avg_loss(&self) -> f64 {
        let losses: Vec<f64> = self.profits().filter(|p| *p <= 0.0).collect();
        mean(losses.iter().sum(), losses.len())
    }

    /// Gross wins over gross losses. Infinite with wins and no losses.
    pub fn profit_factor(&self) -> f64 {
        let gross_win: f64 = self.profits().filter(|p| *p > 0.0).sum();
        let gross_loss: f64 = self.profits().filter(|p| *p <= 0.0).sum::<f64>().abs();
        if gross_loss > 0.0 {
            gross_win / gross_loss
        } else if gross_win > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    }

    /// Per-instrument statistics, in the order instruments first traded.
    pub fn breakdown(&self) -> Vec<InstrumentStats> {
        let mut out: Vec<InstrumentStats> = Vec::new();

        for r in &self.records {
            let idx = match out.iter().position(|s| s.instrument == r.instrument) {
                Some(i) => i,
                None => {
                    out.push(InstrumentStats {
                        instrument: r.instrument.clone(),
                        trades: 0,
                        wins: 0,
                        win_rate: 0.0,
                        mean_profit_pct: 0.0,
                        total_profit_pct: 0.0,
                    });
                    out.len() - 1
                }
            };
            let s = &mut out[idx];
            s.trades += 1;
            s.total_profit_pct += r.profit_pct;
            if r.is_win() {
                s.wins += 1;
            }
        }

        for s in &mut out {
            s.win_rate = win_rate(s.wins, s.trades);
            s.mean_profit_pct = mean(s.total_profit_pct, s.trades);
        }
        out
    }

    fn profits(&self) -> impl Iterator<Item = f64> + '_ {
        self.records.iter().map(|r| r.profit_pct)
    }
}

fn win_rate(wins: usize, total: usize) -> f64 {
    if total > 0 {
        wins as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

fn mean(sum: f64, count: usize) -> f64 {
    if count > 0 {
        sum / count as f64
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::trade;

    fn ledger(trades: &[(&str, f64)]) -> TradeLedger {
        let mut l = TradeLedger::new();
        for (inst, p) in trades {
            l.record(trade(inst, *p));
        }
        l
    }

    #[test]
    fn empty_ledger_stats_are_zero() {
        let l = TradeLedger::new();
        assert!(l.is_empty());
        assert_eq!(l.win_rate(), 0.0);
        assert_eq!(l.net_return(), 0.0);
        assert_eq!(l.best(), None);
        assert_eq!(l.profit_factor(), 0.0);
        assert!(l.breakdown().is_empty());
    }

    #[test]
    fn win_rate_and_net_return() {
        let l = ledger(&[("BTC/USDT", 5.0), ("BTC/USDT", -3.0), ("BTC/USDT", 2.0), ("BTC/USDT", -1.0)]);
        assert!((l.win_rate() - 50.0).abs() < 1e-9);
        assert!((l.net_return() - 3.0).abs() < 1e-9);
        assert!((l.mean_profit() - 0.75).abs() < 1e-9);
        assert_eq!(l.best(), Some(5.0));
        assert_eq!(l.worst(), Some(-3.0));
        assert!((l.avg_win() - 3.5).abs() < 1e-9);
        assert!((l.avg_loss() + 2.0).abs() < 1e-9);
        assert!((l.profit_factor() - 7.0 / 4.0).abs() < 1e-9);
    }

    #[test]
    fn zero_profit_is_not_a_win() {
        let l = ledger(&[("BTC/USDT", 0.0), ("BTC/USDT", 1.0)]);
        assert_eq!(l.wins(), 1);
        assert!((l.win_rate() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn breakdown_keeps_first_seen_order() {
        let l = ledger(&[
            ("DOGE/USDT", 12.0),
            ("BTC/USDT", -5.0),
            ("DOGE/USDT", -7.0),
            ("BTC/USDT", 10.0),
            ("DOGE/USDT", 4.0),
        ]);
        let b = l.breakdown();
        assert_eq!(b.len(), 2);
        assert_eq!(b[0].instrument, "DOGE/USDT");
        assert_eq!(b[0].trades, 3);
        assert!((b[0].mean_profit_pct - 3.0).abs() < 1e-9);
        assert!((b[0].win_rate - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(b[1].instrument, "BTC/USDT");
        assert_eq!(b[1].trades, 2);
        assert!((b[1].win_rate - 50.0).abs() < 1e-9);
        assert!((b[1].total_profit_pct - 5.0).abs() < 1e-9);
    }

    #[test]
    fn only_winners_give_infinite_profit_factor() {
        let l = ledger(&[("BTC/USDT", 2.0)]);
        assert!(l.profit_factor().is_infinite());
    }
}
