use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

use crate::config::{exchange_symbol, Config, InstrumentConfig};
use crate::exchange::{BinanceClient, HistoricalExchange};
use crate::models::{Candle, CandleSeries};

const PAUSE_BETWEEN_INSTRUMENTS: Duration = Duration::from_secs(1);

/// Download `days` of history for every configured instrument from the
/// public Binance endpoint, caching each download as JSON under
/// `cfg.data_dir`. An instrument whose download fails is logged and left
/// out.
pub async fn fetch_and_cache(cfg: &Config, days: i64) -> Result<HistoricalExchange> {
    std::fs::create_dir_all(&cfg.data_dir)
        .with_context(|| format!("Failed to create data dir {}", cfg.data_dir))?;

    let client = BinanceClient::public(&cfg.binance_data_url)?;
    let end = Utc::now();
    let start = end - ChronoDuration::days(days);

    let mut exchange = HistoricalExchange::new();
    for (i, inst) in cfg.instruments.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(PAUSE_BETWEEN_INSTRUMENTS).await;
        }
        match load_instrument(&client, inst, &cfg.data_dir, start, end).await {
            Ok(series) => exchange.load(&inst.symbol, inst.timeframe, series),
            Err(e) => error!("Error fetching {}: {:#}", inst.symbol, e),
        }
    }
    exchange.set_time(end);
    Ok(exchange)
}

async fn load_instrument(
    client: &BinanceClient,
    inst: &InstrumentConfig,
    data_dir: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<CandleSeries> {
    let path = cache_path(data_dir, inst, start, end);

    // Try loading from cache first
    if path.exists() {
        info!("Loading cached {} data from {}", inst.symbol, path.display());
        let candles = read_cache(&path)?;
        info!("  Loaded {} candles", candles.len());
        return Ok(CandleSeries::from_unsorted(candles)?);
    }

    info!(
        "Fetching {} {} data from Binance ({} to {})...",
        inst.symbol,
        inst.timeframe,
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d")
    );
    let candles = client
        .fetch_klines_since(&inst.symbol, inst.timeframe, start)
        .await?;
    info!("  Fetched {} candles", candles.len());

    let series = CandleSeries::from_unsorted(candles)?;
    write_cache(&path, series.as_slice())?;
    info!("  Cached to {}", path.display());
    Ok(series)
}

/// Day-granular so repeated runs on the same day reuse the download.
fn cache_path(
    data_dir: &str,
    inst: &InstrumentConfig,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> PathBuf {
    Path::new(data_dir).join(format!(
        "{}_{}_{}_to_{}.json",
        exchange_symbol(&inst.symbol),
        inst.timeframe,
        start.format("%Y%m%d"),
        end.format("%Y%m%d")
    ))
}

fn read_cache(path: &Path) -> Result<Vec<Candle>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Corrupt cache file {}", path.display()))
}

fn write_cache(path: &Path, candles: &[Candle]) -> Result<()> {
    let json = serde_json::to_string(candles)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{base_time, instrument, series_from_closes, strategy};

    #[test]
    fn cache_path_is_day_granular() {
        let inst = instrument("DOGE/USDT", strategy(10, 21, 14, 18.0));
        let p = cache_path("data", &inst, base_time(), base_time() + ChronoDuration::days(365));
        assert_eq!(p, Path::new("data").join("DOGEUSDT_1m_20240115_to_20250114.json"));
    }

    #[test]
    fn cache_round_trips_through_disk() {
        let dir = std::env::temp_dir().join(format!("gcb-cache-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("candles.json");

        let series = series_from_closes(&[10.0, 11.5, 12.25]);
        write_cache(&path, series.as_slice()).unwrap();
        let back = read_cache(&path).unwrap();
        assert_eq!(back, series.as_slice());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn corrupt_cache_is_an_error() {
        let dir = std::env::temp_dir().join(format!("gcb-corrupt-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(read_cache(&path).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
