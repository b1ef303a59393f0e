use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use golden_cross_bot::backtesting::{data_fetcher, BacktestReport, BacktestRunner};
use golden_cross_bot::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env().context("Invalid configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    // backtest [days]
    let days: i64 = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse()
            .ok()
            .filter(|d| *d > 0)
            .with_context(|| format!("days must be a positive integer, got {:?}", arg))?,
        None => cfg.backtest_days,
    };

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║          GOLDEN CROSS BOT - BACKTESTER                   ║");
    println!("╚══════════════════════════════════════════════════════════╝");
    println!("  Period:  {} days", days);
    for inst in &cfg.instruments {
        let s = &inst.strategy;
        println!(
            "  {:<10} {:>3} | SMA {}/{} | ADX > {} | SL {}% | TP {}%",
            inst.symbol,
            inst.timeframe,
            s.sma_short_period,
            s.sma_long_period,
            s.adx_threshold,
            s.stop_loss_pct,
            s.take_profit_pct
        );
    }
    println!();

    let exchange = data_fetcher::fetch_and_cache(&cfg, days).await?;

    let mut runner = BacktestRunner::new(exchange, &cfg);
    let report = runner.run().await?;

    report.print_summary();

    let report_file = std::path::Path::new(&cfg.data_dir).join(format!(
        "backtest_{}_{}.txt",
        report.start.format("%Y%m%d"),
        report.end.format("%Y%m%d"),
    ));
    save_report_to_file(&report, &report_file)?;
    println!("\nReport saved to: {}", report_file.display());

    Ok(())
}

fn save_report_to_file(report: &BacktestReport, path: &std::path::Path) -> Result<()> {
    use std::io::Write;

    let mut f = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write!(f, "{}", report.render())?;

    writeln!(f)?;
    writeln!(f, "Trades:")?;
    for t in &report.trades {
        writeln!(
            f,
            "  {} {} -> {} | {:.6} -> {:.6} | {} | {:+.2}%",
            t.instrument,
            t.entry_time.format("%Y-%m-%d %H:%M"),
            t.exit_time.format("%Y-%m-%d %H:%M"),
            t.entry_price,
            t.exit_price,
            t.exit_reason.short_label(),
            t.profit_pct
        )?;
    }

    Ok(())
}
