use crate::error::ConfigError;
use core_types::Instrument;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::PathBuf;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub trading: TradingConfig,
    #[serde(default)]
    pub strategy: MACrossoverParams,
    #[serde(default)]
    pub risk_management: RiskManagement,
    #[serde(default)]
    pub valuation: ValuationConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How the free quote balance is divided among instruments entering in the same cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum AllocationMode {
    /// Equal weight across the instruments that signal entry this cycle.
    #[default]
    EqualSignal,
    /// A fixed slot of `balance / configured instruments` per entering instrument.
    FixedSlots,
}

/// Parameters of the polling loop and of order placement.
#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Concatenated symbols, e.g. `["BTCUSDT", "SOLUSDT"]`.
    pub instruments: Vec<String>,
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,
    /// Candle interval used for the crossover signal (e.g. "1h").
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default = "default_candle_limit")]
    pub candle_limit: u16,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Upper bound for any single collaborator call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_lot_cache_ttl_secs")]
    pub lot_cache_ttl_secs: u64,
    /// When false, orders go to the paper executor and the testnet keys are used.
    #[serde(default)]
    pub live_trading_enabled: bool,
    #[serde(default)]
    pub allocation_mode: AllocationMode,
    /// Entries are skipped unless the free quote balance exceeds this amount.
    #[serde(default = "default_min_entry_balance")]
    pub min_entry_balance: Decimal,
}

impl TradingConfig {
    /// Resolves the configured symbols into instruments.
    pub fn instruments(&self) -> Result<Vec<Instrument>, ConfigError> {
        self.instruments
            .iter()
            .map(|symbol| {
                Instrument::from_symbol(symbol, &self.quote_asset)
                    .map_err(|e| ConfigError::ValidationError(e.to_string()))
            })
            .collect()
    }
}

/// Parameters for the moving average crossover signal.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MACrossoverParams {
    pub short_window: usize,
    pub long_window: usize,
}

impl Default for MACrossoverParams {
    fn default() -> Self {
        Self {
            short_window: 7,
            long_window: 40,
        }
    }
}

/// Contains parameters for trade-level risk management.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RiskManagement {
    /// Distance below the entry price of the stop-loss (e.g., 0.03 for 3%).
    pub stop_loss_pct: Decimal,
    /// Distance above the trailing high of the take-profit (e.g., 0.04 for 4%).
    pub take_profit_pct: Decimal,
    /// Lookback, in days, of the trailing high used for the take-profit.
    pub trailing_high_days: u32,
}

impl Default for RiskManagement {
    fn default() -> Self {
        Self {
            stop_loss_pct: dec!(0.03),
            take_profit_pct: dec!(0.04),
            trailing_high_days: 7,
        }
    }
}

/// Extra assets to include in the account valuation besides the traded base assets.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValuationConfig {
    #[serde(default)]
    pub extra_assets: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("crossguard_state.json"),
        }
    }
}

/// A single API key pair.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiKeys {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub secret: String,
}

/// API credentials for production and testnet.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub production: ApiKeys,
    #[serde(default)]
    pub testnet: ApiKeys,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub chat_id: String,
    /// Also forward the performance summary published after every cycle.
    #[serde(default)]
    pub notify_performance: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

fn default_quote_asset() -> String {
    "USDT".to_string()
}

fn default_interval() -> String {
    "1h".to_string()
}

fn default_candle_limit() -> u16 {
    100
}

fn default_poll_interval_secs() -> u64 {
    60 * 60
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_lot_cache_ttl_secs() -> u64 {
    60 * 60
}

fn default_min_entry_balance() -> Decimal {
    dec!(10)
}

impl Config {
    /// Canonicalizes asset and symbol names to the exchange's upper case.
    pub fn normalize(&mut self) {
        let trading = &mut self.trading;
        trading.quote_asset = trading.quote_asset.trim().to_uppercase();
        for symbol in &mut trading.instruments {
            *symbol = symbol.trim().to_uppercase();
        }
        for asset in &mut self.valuation.extra_assets {
            *asset = asset.trim().to_uppercase();
        }
    }

    /// Checks the cross-field rules that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trading.instruments.is_empty() {
            return Err(ConfigError::ValidationError(
                "trading.instruments must list at least one symbol".to_string(),
            ));
        }
        self.trading.instruments()?;

        let strategy = &self.strategy;
        if strategy.short_window == 0 || strategy.short_window >= strategy.long_window {
            return Err(ConfigError::ValidationError(format!(
                "strategy windows must satisfy 0 < short ({}) < long ({})",
                strategy.short_window, strategy.long_window
            )));
        }
        if usize::from(self.trading.candle_limit) <= strategy.long_window {
            return Err(ConfigError::ValidationError(format!(
                "trading.candle_limit ({}) must exceed strategy.long_window ({})",
                self.trading.candle_limit, strategy.long_window
            )));
        }

        let risk = &self.risk_management;
        for (name, pct) in [
            ("stop_loss_pct", risk.stop_loss_pct),
            ("take_profit_pct", risk.take_profit_pct),
        ] {
            if pct <= Decimal::ZERO || pct >= Decimal::ONE {
                return Err(ConfigError::ValidationError(format!(
                    "risk_management.{} must be between 0 and 1, got {}",
                    name, pct
                )));
            }
        }
        if risk.trailing_high_days == 0 {
            return Err(ConfigError::ValidationError(
                "risk_management.trailing_high_days must be at least 1".to_string(),
            ));
        }

        if self.trading.poll_interval_secs == 0 || self.trading.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "poll and request timeouts must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}
