use analytics::PerformanceSummary;
use chrono::{DateTime, Utc};
use core_types::{CrossSignal, ExitReason, OrderSide, PricePoint};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Enum representing the severity of a log message for structured logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// A structured log message for reporting collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// The latest price series of one instrument plus the averages computed over it.
///
/// `short_sma` and `long_sma` are aligned with `points`; warm-up entries are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesReport {
    pub symbol: String,
    pub points: Vec<PricePoint>,
    pub short_sma: Vec<Option<Decimal>>,
    pub long_sma: Vec<Option<Decimal>>,
    pub signal: Option<CrossSignal>,
}

/// A confirmed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeNotice {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
    /// `None` for entries.
    pub exit_reason: Option<ExitReason>,
}

/// The top-level event enum.
///
/// Serialized as `{ "type": "...", "payload": { ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EngineEvent {
    /// A structured log message.
    Log(LogMessage),
    /// The per-instrument series and averages of the current cycle.
    SeriesUpdate(SeriesReport),
    /// A notification that a single order has been confirmed.
    TradeExecuted(TradeNotice),
    /// The account performance after the cycle's equity sample was recorded.
    Performance(PerformanceSummary),
}

impl EngineEvent {
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        EngineEvent::Log(LogMessage {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn serializes_with_type_tag() {
        let event = EngineEvent::TradeExecuted(TradeNotice {
            timestamp: Utc::now(),
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Sell,
            quantity: dec!(0.0003),
            price: dec!(50000),
            exit_reason: Some(ExitReason::StopLoss),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "TradeExecuted");
        assert_eq!(json["payload"]["symbol"], "BTCUSDT");
        assert_eq!(json["payload"]["exit_reason"], "StopLoss");
    }
}
