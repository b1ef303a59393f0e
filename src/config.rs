use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::BotError;
use crate::models::Timeframe;

const DEFAULT_SYMBOLS: &str = "BTC/USDT,DOGE/USDT";
const DEFAULT_ADX_PERIOD: usize = 14;
// 0.02% per side, charged twice
const DEFAULT_ROUND_TRIP_FEE_PCT: f64 = 0.04;
/// Finest lot step Binance lists for spot pairs.
const MAX_QUANTITY_DECIMALS: u32 = 8;

/// Strategy parameters for a single instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub sma_short_period: usize,
    pub sma_long_period: usize,
    pub adx_period: usize,
    pub adx_threshold: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub round_trip_fee_pct: f64,
}

impl StrategyConfig {
    /// Bars needed before every indicator value is defined.
    pub fn warmup(&self) -> usize {
        self.sma_long_period.max(self.adx_period) + 1
    }

    pub fn validate(&self, symbol: &str) -> Result<(), BotError> {
        let key = |field: &str| format!("{}.{}", symbol, field);

        if self.sma_short_period == 0 {
            return Err(BotError::config(&key("sma_short_period"), "must be at least 1"));
        }
        if self.adx_period == 0 {
            return Err(BotError::config(&key("adx_period"), "must be at least 1"));
        }
        if self.sma_short_period >= self.sma_long_period {
            return Err(BotError::config(
                &key("sma_short_period"),
                format!(
                    "short period {} must be below long period {}",
                    self.sma_short_period, self.sma_long_period
                ),
            ));
        }

        let pcts = [
            ("adx_threshold", self.adx_threshold),
            ("stop_loss_pct", self.stop_loss_pct),
            ("take_profit_pct", self.take_profit_pct),
            ("round_trip_fee_pct", self.round_trip_fee_pct),
        ];
        for (field, value) in pcts {
            if !value.is_finite() || value < 0.0 {
                return Err(BotError::config(
                    &key(field),
                    format!("{} must be a non-negative number", value),
                ));
            }
        }
        if self.stop_loss_pct >= 100.0 {
            return Err(BotError::config(&key("stop_loss_pct"), "must be below 100"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Display symbol, e.g. `BTC/USDT`.
    pub symbol: String,
    pub timeframe: Timeframe,
    /// Decimal places accepted by the venue for order quantities.
    pub quantity_decimals: u32,
    pub strategy: StrategyConfig,
}

impl InstrumentConfig {
    /// Venue symbol and env-var prefix, e.g. `BTCUSDT`.
    pub fn exchange_symbol(&self) -> String {
        exchange_symbol(&self.symbol)
    }

    fn preset(symbol: &str) -> Option<InstrumentConfig> {
        match symbol {
            "BTC/USDT" => Some(InstrumentConfig {
                symbol: symbol.to_string(),
                timeframe: Timeframe::H4,
                quantity_decimals: 5,
                strategy: StrategyConfig {
                    sma_short_period: 50,
                    sma_long_period: 200,
                    adx_period: DEFAULT_ADX_PERIOD,
                    adx_threshold: 25.0,
                    stop_loss_pct: 5.0,
                    take_profit_pct: 10.0,
                    round_trip_fee_pct: DEFAULT_ROUND_TRIP_FEE_PCT,
                },
            }),
            "DOGE/USDT" => Some(InstrumentConfig {
                symbol: symbol.to_string(),
                timeframe: Timeframe::H1,
                quantity_decimals: 0,
                strategy: StrategyConfig {
                    sma_short_period: 10,
                    sma_long_period: 21,
                    adx_period: DEFAULT_ADX_PERIOD,
                    adx_threshold: 18.0,
                    stop_loss_pct: 7.0,
                    take_profit_pct: 12.0,
                    round_trip_fee_pct: DEFAULT_ROUND_TRIP_FEE_PCT,
                },
            }),
            _ => None,
        }
    }
}

pub fn exchange_symbol(symbol: &str) -> String {
    symbol.replace(['/', '-'], "").to_uppercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Orders are filled synthetically at the reference price.
    Simulated,
    /// Orders go to the exchange.
    Live,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Simulated => write!(f, "DRY RUN"),
            ExecutionMode::Live => write!(f, "LIVE"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Instruments, evaluated in this order every tick
    pub instruments: Vec<InstrumentConfig>,

    // Execution
    pub mode: ExecutionMode,
    pub order_size_usd: f64,
    pub poll_interval_secs: u64,
    pub history_limit: usize,

    // Exchange
    pub binance_base_url: String,
    pub binance_data_url: String,
    pub binance_api_key: String,
    pub binance_api_secret: String,

    // Alerts
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    // Backtest
    pub backtest_days: i64,
    pub data_dir: String,

    // Logging
    pub log_level: String,
}

impl Config {
    /// Load `.env`, then read the process environment.
    pub fn from_env() -> Result<Self, BotError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Missing keys fall back to the
    /// defaults; present but unparseable keys are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BotError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let optional = |key: &str| -> Option<String> {
            lookup(key).filter(|v| !v.trim().is_empty())
        };

        let symbols = env("SYMBOLS", DEFAULT_SYMBOLS);
        let mut instruments = Vec::new();
        for symbol in symbols.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            instruments.push(load_instrument(symbol, &lookup)?);
        }

        let dry_run = parse_bool("DRY_RUN", &env("DRY_RUN", "true"))?;

        let cfg = Config {
            instruments,
            mode: if dry_run {
                ExecutionMode::Simulated
            } else {
                ExecutionMode::Live
            },
            order_size_usd: parse("ORDER_SIZE_USD", &env("ORDER_SIZE_USD", "100"))?,
            poll_interval_secs: parse("POLL_INTERVAL_SECS", &env("POLL_INTERVAL_SECS", "3600"))?,
            history_limit: parse("HISTORY_LIMIT", &env("HISTORY_LIMIT", "500"))?,
            binance_base_url: env("BINANCE_BASE_URL", "https://testnet.binance.vision"),
            binance_data_url: env("BINANCE_DATA_URL", "https://api.binance.com"),
            binance_api_key: env("BINANCE_API_KEY", ""),
            binance_api_secret: env("BINANCE_API_SECRET", ""),
            telegram_bot_token: optional("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: optional("TELEGRAM_CHAT_ID"),
            backtest_days: parse("BACKTEST_DAYS", &env("BACKTEST_DAYS", "365"))?,
            data_dir: env("DATA_DIR", "data"),
            log_level: env("LOG_LEVEL", "info"),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), BotError> {
        if self.instruments.is_empty() {
            return Err(BotError::config("SYMBOLS", "no instruments configured"));
        }
        let mut seen = HashSet::new();
        for inst in &self.instruments {
            if !seen.insert(inst.symbol.as_str()) {
                return Err(BotError::config("SYMBOLS", format!("{} listed twice", inst.symbol)));
            }
            inst.strategy.validate(&inst.symbol)?;
            if inst.quantity_decimals > MAX_QUANTITY_DECIMALS {
                return Err(BotError::config(
                    &format!("{}_QTY_DECIMALS", exchange_symbol(&inst.symbol)),
                    format!("{} exceeds {}", inst.quantity_decimals, MAX_QUANTITY_DECIMALS),
                ));
            }
            if self.history_limit < inst.strategy.warmup() + 1 {
                return Err(BotError::config(
                    "HISTORY_LIMIT",
                    format!(
                        "{} bars cannot warm up {} (needs {})",
                        self.history_limit,
                        inst.symbol,
                        inst.strategy.warmup() + 1
                    ),
                ));
            }
        }
        if !self.order_size_usd.is_finite() || self.order_size_usd <= 0.0 {
            return Err(BotError::config("ORDER_SIZE_USD", "must be positive"));
        }
        if self.poll_interval_secs == 0 {
            return Err(BotError::config("POLL_INTERVAL_SECS", "must be positive"));
        }
        if self.backtest_days <= 0 {
            return Err(BotError::config("BACKTEST_DAYS", "must be positive"));
        }
        if self.mode == ExecutionMode::Live
            && (self.binance_api_key.is_empty() || self.binance_api_secret.is_empty())
        {
            return Err(BotError::config(
                "BINANCE_API_KEY",
                "live trading requires BINANCE_API_KEY and BINANCE_API_SECRET",
            ));
        }
        Ok(())
    }

    pub fn instrument(&self, symbol: &str) -> Option<&InstrumentConfig> {
        self.instruments.iter().find(|i| i.symbol == symbol)
    }
}

fn load_instrument<F>(symbol: &str, lookup: &F) -> Result<InstrumentConfig, BotError>
where
    F: Fn(&str) -> Option<String>,
{
    let preset = InstrumentConfig::preset(symbol);
    let prefix = exchange_symbol(symbol);

    // Env override first, then the preset value, otherwise the key is required.
    let field = |name: &str, preset_value: Option<String>| -> Result<String, BotError> {
        let key = format!("{}_{}", prefix, name);
        lookup(&key)
            .filter(|v| !v.trim().is_empty())
            .or(preset_value)
            .ok_or_else(|| BotError::config(&key, "required for instruments without defaults"))
    };

    let p = preset.as_ref();
    let s = p.map(|p| p.strategy);

    let tf_raw = field("TIMEFRAME", p.map(|p| p.timeframe.as_str().to_string()))?;
    let timeframe = Timeframe::from_str_loose(&tf_raw).ok_or_else(|| {
        BotError::config(&format!("{}_TIMEFRAME", prefix), format!("unknown timeframe {}", tf_raw))
    })?;

    let key = |name: &str| format!("{}_{}", prefix, name);
    let strategy = StrategyConfig {
        sma_short_period: parse(
            &key("SMA_SHORT"),
            &field("SMA_SHORT", s.map(|s| s.sma_short_period.to_string()))?,
        )?,
        sma_long_period: parse(
            &key("SMA_LONG"),
            &field("SMA_LONG", s.map(|s| s.sma_long_period.to_string()))?,
        )?,
        adx_period: parse(
            &key("ADX_PERIOD"),
            &field("ADX_PERIOD", Some(s.map_or(DEFAULT_ADX_PERIOD, |s| s.adx_period).to_string()))?,
        )?,
        adx_threshold: parse(
            &key("ADX_THRESHOLD"),
            &field("ADX_THRESHOLD", s.map(|s| s.adx_threshold.to_string()))?,
        )?,
        stop_loss_pct: parse(
            &key("STOP_LOSS_PCT"),
            &field("STOP_LOSS_PCT", s.map(|s| s.stop_loss_pct.to_string()))?,
        )?,
        take_profit_pct: parse(
            &key("TAKE_PROFIT_PCT"),
            &field("TAKE_PROFIT_PCT", s.map(|s| s.take_profit_pct.to_string()))?,
        )?,
        round_trip_fee_pct: parse(
            &key("FEE_PCT"),
            &field(
                "FEE_PCT",
                Some(s.map_or(DEFAULT_ROUND_TRIP_FEE_PCT, |s| s.round_trip_fee_pct).to_string()),
            )?,
        )?,
    };

    let quantity_decimals = parse(
        &key("QTY_DECIMALS"),
        &field(
            "QTY_DECIMALS",
            Some(p.map_or(6, |p| p.quantity_decimals).to_string()),
        )?,
    )?;

    Ok(InstrumentConfig {
        symbol: symbol.to_string(),
        timeframe,
        quantity_decimals,
        strategy,
    })
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T, BotError>
where
    T::Err: fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| BotError::config(key, format!("{:?}: {}", raw, e)))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, BotError> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(BotError::config(key, format!("{:?} is not a boolean", other))),
    }
}
