use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;

use crate::models::ExitReason;
use crate::trading::{InstrumentStats, TradeLedger, TradeRecord};

#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    // Period
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub days: f64,

    // Trades
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub net_return_pct: f64,
    pub avg_trade: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
    pub profit_factor: f64,
    pub take_profits: usize,
    pub stop_losses: usize,

    /// Instruments still long when the data ran out. Not counted above.
    pub open_positions: Vec<String>,

    // By instrument, in the order they first traded
    pub instruments: Vec<InstrumentStats>,

    pub trades: Vec<TradeRecord>,
}

impl BacktestReport {
    pub fn from_ledger(
        ledger: &TradeLedger,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        open_positions: Vec<String>,
    ) -> Self {
        let total_trades = ledger.len();
        let winning = ledger.wins();

        BacktestReport {
            start,
            end,
            days: (end - start).num_hours() as f64 / 24.0,
            total_trades,
            winning_trades: winning,
            losing_trades: total_trades - winning,
            win_rate: ledger.win_rate(),
            net_return_pct: ledger.net_return(),
            avg_trade: ledger.mean_profit(),
            avg_win: ledger.avg_win(),
            avg_loss: ledger.avg_loss(),
            best_trade: ledger.best().unwrap_or(0.0),
            worst_trade: ledger.worst().unwrap_or(0.0),
            profit_factor: ledger.profit_factor(),
            take_profits: ledger.count_by_reason(ExitReason::TakeProfit),
            stop_losses: ledger.count_by_reason(ExitReason::StopLoss),
            open_positions,
            instruments: ledger.breakdown(),
            trades: ledger.records().to_vec(),
        }
    }

    /// The one-line verdict.
    pub fn headline(&self) -> String {
        if self.total_trades == 0 {
            return "No trades generated.".to_string();
        }
        format!(
            "FINAL: {} trades | Win Rate: {:.1}% | Net Return: {:.2}%",
            self.total_trades, self.win_rate, self.net_return_pct
        )
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(70);
        let thin = "  ───────────────────────────────────";

        let _ = writeln!(out, "\n{}", rule);
        let _ = writeln!(out, "  BACKTEST REPORT");
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(
            out,
            "  Period:      {} to {} ({:.0} days)",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d"),
            self.days
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "  {}", self.headline());

        if self.total_trades > 0 {
            let _ = writeln!(out);
            let _ = writeln!(out, "  TRADES");
            let _ = writeln!(out, "{}", thin);
            let _ = writeln!(out, "  Total:       {}", self.total_trades);
            let _ = writeln!(
                out,
                "  Win/Loss:    {} / {}",
                self.winning_trades, self.losing_trades
            );
            let _ = writeln!(out, "  TP/SL:       {} / {}", self.take_profits, self.stop_losses);
            let _ = writeln!(out, "  Avg Win:     {:+.2}%", self.avg_win);
            let _ = writeln!(out, "  Avg Loss:    {:+.2}%", self.avg_loss);
            let _ = writeln!(out, "  Best:        {:+.2}%", self.best_trade);
            let _ = writeln!(out, "  Worst:       {:+.2}%", self.worst_trade);
            let _ = writeln!(out, "  Avg Trade:   {:+.2}%", self.avg_trade);
            let _ = writeln!(out, "  Profit Factor: {:.2}", self.profit_factor);

            let _ = writeln!(out);
            let _ = writeln!(out, "  BY INSTRUMENT");
            let _ = writeln!(out, "{}", thin);
            let _ = writeln!(
                out,
                "  {:<12} {:>6} {:>10} {:>8}",
                "symbol", "count", "mean %", "win %"
            );
            for s in &self.instruments {
                let _ = writeln!(
                    out,
                    "  {:<12} {:>6} {:>10.2} {:>8.1}",
                    s.instrument, s.trades, s.mean_profit_pct, s.win_rate
                );
            }
        }

        if !self.open_positions.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "  Still open at end (not counted): {}",
                self.open_positions.join(", ")
            );
        }

        let _ = writeln!(out, "{}", rule);
        out
    }

    pub fn print_summary(&self) {
        println!("{}", self.render());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{base_time, trade};
    use chrono::Duration;

    fn report(profits: &[(&str, f64)]) -> BacktestReport {
        let mut ledger = TradeLedger::new();
        for (inst, p) in profits {
            ledger.record(trade(inst, *p));
        }
        BacktestReport::from_ledger(
            &ledger,
            base_time(),
            base_time() + Duration::days(365),
            vec![],
        )
    }

    #[test]
    fn headline_matches_ledger() {
        let r = report(&[("BTC/USDT", 5.0), ("BTC/USDT", -3.0), ("DOGE/USDT", 2.0), ("DOGE/USDT", -1.0)]);
        assert_eq!(r.headline(), "FINAL: 4 trades | Win Rate: 50.0% | Net Return: 3.00%");
        assert_eq!(r.take_profits, 2);
        assert_eq!(r.stop_losses, 2);
        assert_eq!(r.instruments.len(), 2);
        assert!((r.days - 365.0).abs() < 1e-9);
    }

    #[test]
    fn empty_backtest_says_so() {
        let r = report(&[]);
        assert_eq!(r.headline(), "No trades generated.");
        assert!(!r.render().contains("BY INSTRUMENT"));
    }

    #[test]
    fn render_lists_instruments_and_open_positions() {
        let mut r = report(&[("DOGE/USDT", 12.0), ("BTC/USDT", -5.0)]);
        r.open_positions = vec!["BTC/USDT".to_string()];
        let text = r.render();
        let doge = text.find("DOGE/USDT").unwrap();
        let btc = text.find("BTC/USDT").unwrap();
        assert!(doge < btc);
        assert!(text.contains("Still open at end (not counted): BTC/USDT"));
    }
}
