use crate::error::ApiError;
use chrono::{TimeZone, Utc};
use core_types::{LotConstraint, OrderSide, PricePoint, PriceSeries};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

// Using `#[serde(rename_all = "camelCase")]` to automatically map from JSON camelCase to Rust snake_case.

/// The response from a successful `POST /api/v3/order` request (`newOrderRespType=FULL`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub symbol: String,
    pub order_id: i64,
    pub client_order_id: String,
    pub orig_qty: Decimal,
    pub executed_qty: Decimal,
    pub cummulative_quote_qty: Decimal,
    pub status: String,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: String,
}

impl OrderResponse {
    /// The volume-weighted fill price, when anything has been executed.
    pub fn average_price(&self) -> Option<Decimal> {
        if self.executed_qty.is_zero() {
            None
        } else {
            Some(self.cummulative_quote_qty / self.executed_qty)
        }
    }
}

/// `GET /api/v3/account`. Only the balance list is of interest.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    pub balances: Vec<BalanceResponse>,
}

/// A single asset's balance within the account response.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
}

/// `GET /api/v3/ticker/price`.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerPriceResponse {
    pub symbol: String,
    pub price: Decimal,
}

/// `GET /api/v3/exchangeInfo`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfoResponse {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    pub filters: Vec<SymbolFilter>,
}

/// The subset of exchange filters that constrain order quantities.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "filterType")]
pub enum SymbolFilter {
    #[serde(rename = "LOT_SIZE", rename_all = "camelCase")]
    LotSize { min_qty: Decimal, step_size: Decimal },
    #[serde(rename = "NOTIONAL", rename_all = "camelCase")]
    Notional { min_notional: Decimal },
    #[serde(rename = "MIN_NOTIONAL", rename_all = "camelCase")]
    MinNotional { min_notional: Decimal },
    #[serde(other)]
    Other,
}

impl SymbolInfo {
    /// Extracts the lot constraint. A symbol without a notional filter has no notional floor.
    pub fn lot_constraint(&self) -> Result<LotConstraint, ApiError> {
        let (minimum_quantity, step_size) = self
            .filters
            .iter()
            .find_map(|filter| match filter {
                SymbolFilter::LotSize { min_qty, step_size } => Some((*min_qty, *step_size)),
                _ => None,
            })
            .ok_or_else(|| ApiError::InvalidData(format!("{} has no LOT_SIZE filter", self.symbol)))?;

        let minimum_notional = self
            .filters
            .iter()
            .find_map(|filter| match filter {
                SymbolFilter::Notional { min_notional } | SymbolFilter::MinNotional { min_notional } => {
                    Some(*min_notional)
                }
                _ => None,
            })
            .unwrap_or(Decimal::ZERO);

        Ok(LotConstraint {
            minimum_quantity,
            step_size,
            minimum_notional,
        })
    }
}

/// Represents an error response from the Binance API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub code: i64,
    pub msg: String,
}

// Intermediate struct for deserializing klines from Binance API
#[derive(Debug, Deserialize)]
pub struct RawKline(
    pub i64,
    pub String,
    pub String,
    pub String,
    pub String,
    pub String,
    pub i64,
    pub String,
    pub i64,
    pub String,
    pub String,
    pub String,
);

/// Converts raw klines into a series of closes stamped with each candle's open time.
pub fn klines_to_series(symbol: &str, raw: Vec<RawKline>) -> Result<PriceSeries, ApiError> {
    let points = raw
        .into_iter()
        .map(|kline| {
            Ok(PricePoint {
                timestamp: Utc
                    .timestamp_millis_opt(kline.0)
                    .single()
                    .ok_or_else(|| ApiError::InvalidData(format!("Invalid open_time: {}", kline.0)))?,
                close: Decimal::from_str(&kline.4).map_err(|e| ApiError::Deserialization(e.to_string()))?,
            })
        })
        .collect::<Result<Vec<PricePoint>, ApiError>>()?;

    PriceSeries::new(symbol, points).map_err(|e| ApiError::InvalidData(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const EXCHANGE_INFO: &str = r#"{
        "timezone": "UTC",
        "symbols": [{
            "symbol": "BTCUSDT",
            "status": "TRADING",
            "filters": [
                { "filterType": "PRICE_FILTER", "minPrice": "0.01000000", "maxPrice": "1000000.00000000", "tickSize": "0.01000000" },
                { "filterType": "LOT_SIZE", "minQty": "0.00001000", "maxQty": "9000.00000000", "stepSize": "0.00001000" },
                { "filterType": "NOTIONAL", "minNotional": "5.00000000", "applyMinToMarket": true, "maxNotional": "9000000.00000000", "applyMaxToMarket": false, "avgPriceMins": 5 }
            ]
        }]
    }"#;

    #[test]
    fn extracts_lot_constraint_from_exchange_info() {
        let info: ExchangeInfoResponse = serde_json::from_str(EXCHANGE_INFO).unwrap();
        let lot = info.symbols[0].lot_constraint().unwrap();
        assert_eq!(lot.minimum_quantity, dec!(0.00001));
        assert_eq!(lot.step_size, dec!(0.00001));
        assert_eq!(lot.minimum_notional, dec!(5));
    }

    #[test]
    fn missing_lot_size_is_invalid() {
        let info = SymbolInfo {
            symbol: "FOOUSDT".to_string(),
            filters: vec![SymbolFilter::Other],
        };
        assert!(matches!(info.lot_constraint(), Err(ApiError::InvalidData(_))));
    }

    #[test]
    fn parses_klines_into_series() {
        let body = r#"[
            [1714521600000, "60000.0", "60500.0", "59800.0", "60200.5", "12.5", 1714525199999, "752506.25", 100, "6.0", "361203.0", "0"],
            [1714525200000, "60200.5", "60900.0", "60100.0", "60850.0", "8.1", 1714528799999, "492885.0", 80, "4.0", "243400.0", "0"]
        ]"#;
        let raw: Vec<RawKline> = serde_json::from_str(body).unwrap();
        let series = klines_to_series("BTCUSDT", raw).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.last().unwrap().close, dec!(60850.0));
        assert_eq!(series.max_close(), Some(dec!(60850.0)));
    }

    #[test]
    fn order_average_price() {
        let body = r#"{
            "symbol": "BTCUSDT", "orderId": 28, "clientOrderId": "6gCrw2kRUAF9CvJDGP16IP",
            "transactTime": 1507725176595, "price": "0.00000000", "origQty": "0.00030000",
            "executedQty": "0.00030000", "cummulativeQuoteQty": "15.00000000",
            "status": "FILLED", "timeInForce": "GTC", "type": "MARKET", "side": "BUY", "fills": []
        }"#;
        let order: OrderResponse = serde_json::from_str(body).unwrap();
        assert_eq!(order.side, OrderSide::Buy);
        assert_eq!(order.average_price(), Some(dec!(50000)));
    }
}
