use crate::enums::OrderSide;
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A tradeable symbol on the venue, e.g. `BTCUSDT` (base `BTC`, quote `USDT`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
}

impl Instrument {
    /// Builds an instrument from a concatenated symbol by stripping the quote asset suffix.
    pub fn from_symbol(symbol: &str, quote_asset: &str) -> Result<Self, CoreError> {
        let symbol = symbol.trim().to_uppercase();
        let quote_asset = quote_asset.trim().to_uppercase();

        let base_asset = symbol
            .strip_suffix(quote_asset.as_str())
            .filter(|base| !base.is_empty())
            .ok_or_else(|| {
                CoreError::InvalidInput(
                    "symbol".to_string(),
                    format!("'{}' is not quoted in '{}'", symbol, quote_asset),
                )
            })?
            .to_string();

        Ok(Self {
            symbol,
            base_asset,
            quote_asset,
        })
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)
    }
}

/// A single time-stamped closing price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub close: Decimal,
}

/// An ordered sequence of closing prices for one instrument.
///
/// Construction guarantees the points are strictly chronological (which also
/// rules out duplicate timestamps) and that every close is positive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, points: Vec<PricePoint>) -> Result<Self, CoreError> {
        let symbol = symbol.into();

        if let Some(bad) = points.iter().find(|p| p.close <= Decimal::ZERO) {
            return Err(CoreError::InvalidInput(
                "close".to_string(),
                format!("{} has a non-positive close {} at {}", symbol, bad.close, bad.timestamp),
            ));
        }
        if let Some(pair) = points.windows(2).find(|w| w[0].timestamp >= w[1].timestamp) {
            return Err(CoreError::InvalidInput(
                "timestamp".to_string(),
                format!(
                    "{} is not strictly chronological ({} followed by {})",
                    symbol, pair[0].timestamp, pair[1].timestamp
                ),
            ));
        }

        Ok(Self { symbol, points })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn closes(&self) -> impl Iterator<Item = Decimal> + '_ {
        self.points.iter().map(|p| p.close)
    }

    /// The highest close in the series, if any.
    pub fn max_close(&self) -> Option<Decimal> {
        self.closes().max()
    }
}

/// The engine's view of one instrument's position.
///
/// When `is_open` is false the price fields are unused and kept at their
/// defaults. `take_profit_price == None` means take-profit is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionState {
    pub is_open: bool,
    pub entry_price: Decimal,
    pub stop_loss_price: Decimal,
    pub take_profit_price: Option<Decimal>,
}

impl PositionState {
    pub fn flat() -> Self {
        Self::default()
    }

    pub fn opened(entry_price: Decimal, stop_loss_price: Decimal, take_profit_price: Option<Decimal>) -> Self {
        Self {
            is_open: true,
            entry_price,
            stop_loss_price,
            take_profit_price,
        }
    }
}

/// Exchange-imposed quantity granularity for one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotConstraint {
    pub minimum_quantity: Decimal,
    pub step_size: Decimal,
    pub minimum_notional: Decimal,
}

/// A timestamped total account valuation in the quote currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquitySample {
    pub timestamp: DateTime<Utc>,
    pub total_valuation: Decimal,
}

/// A market order intent, handed to an executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_order_id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
}

impl OrderRequest {
    pub fn market(symbol: &str, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            client_order_id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            quantity,
        }
    }
}
