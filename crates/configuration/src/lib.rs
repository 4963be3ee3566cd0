use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use error::ConfigError;
pub use logging::init_tracing;
pub use settings::{
    AllocationMode, Config, ApiConfig, ApiKeys, LoggingConfig, MACrossoverParams, PersistenceConfig,
    RiskManagement, TelegramConfig, TradingConfig, ValuationConfig,
};

/// Loads the application configuration from a TOML file, layered with environment variables.
///
/// Variables prefixed with `CROSSGUARD` override file values, using `__` to
/// separate nesting levels (e.g. `CROSSGUARD_API__PRODUCTION__SECRET`).
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path.as_ref()))
        .add_source(
            config::Environment::with_prefix("CROSSGUARD")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let mut config = builder.try_deserialize::<Config>()?;
    config.normalize();
    config.validate()?;

    Ok(config)
}

/// Parses a configuration from an in-memory TOML document. Used by tests and tooling.
pub fn parse_config(toml: &str) -> Result<Config, ConfigError> {
    let mut config = config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml))
        .build()?
        .try_deserialize::<Config>()?;
    config.normalize();
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const MINIMAL: &str = r#"
        [trading]
        instruments = ["BTCUSDT", "SOLUSDT"]
    "#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.trading.quote_asset, "USDT");
        assert_eq!(config.trading.interval, "1h");
        assert_eq!(config.trading.candle_limit, 100);
        assert_eq!(config.trading.poll_interval_secs, 3600);
        assert_eq!(config.trading.allocation_mode, AllocationMode::EqualSignal);
        assert_eq!(config.strategy.short_window, 7);
        assert_eq!(config.strategy.long_window, 40);
        assert_eq!(config.risk_management.stop_loss_pct, dec!(0.03));
        assert_eq!(config.risk_management.take_profit_pct, dec!(0.04));
        assert!(!config.trading.live_trading_enabled);

        let instruments = config.trading.instruments().unwrap();
        assert_eq!(instruments[1].base_asset, "SOL");
    }

    #[test]
    fn asset_names_are_upper_cased() {
        let config = parse_config(
            r#"
            [trading]
            instruments = [" btcusdt", "SolUsdt"]
            quote_asset = "usdt"
            [valuation]
            extra_assets = ["eth"]
            "#,
        )
        .unwrap();
        assert_eq!(config.trading.quote_asset, "USDT");
        assert_eq!(config.trading.instruments, vec!["BTCUSDT", "SOLUSDT"]);
        assert_eq!(config.valuation.extra_assets, vec!["ETH"]);
    }

    #[test]
    fn allocation_mode_is_snake_case() {
        let config = parse_config(
            r#"
            [trading]
            instruments = ["BTCUSDT"]
            allocation_mode = "fixed_slots"
            "#,
        )
        .unwrap();
        assert_eq!(config.trading.allocation_mode, AllocationMode::FixedSlots);
    }

    #[test]
    fn rejects_inverted_windows() {
        let err = parse_config(
            r#"
            [trading]
            instruments = ["BTCUSDT"]
            [strategy]
            short_window = 40
            long_window = 7
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn rejects_out_of_range_percentages() {
        let err = parse_config(
            r#"
            [trading]
            instruments = ["BTCUSDT"]
            [risk_management]
            stop_loss_pct = 1.5
            take_profit_pct = 0.04
            trailing_high_days = 7
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn rejects_symbol_in_other_quote() {
        let err = parse_config(
            r#"
            [trading]
            instruments = ["BTCEUR"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }
}
