use crate::error::ExecutorError;
use api_client::ApiClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{OrderRequest, OrderSide};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

/// Confirmation that an order was accepted and (at least partially) filled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderAck {
    pub client_order_id: Uuid,
    pub exchange_order_id: i64,
    pub symbol: String,
    pub side: OrderSide,
    pub executed_quantity: Decimal,
    /// The fill price reported by the venue, when it reports one.
    pub average_price: Option<Decimal>,
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub simulated: bool,
}

/// A generic trait for an execution engine.
///
/// This trait allows the live engine to be agnostic about whether it is
/// talking to a paper account or a real one.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Submits a market order. `reference_price` is the price the order was sized at.
    async fn submit_market_order(
        &self,
        order: &OrderRequest,
        reference_price: Decimal,
    ) -> Result<OrderAck, ExecutorError>;

    /// True when orders reach the venue.
    fn is_live(&self) -> bool;
}

fn validate(order: &OrderRequest) -> Result<(), ExecutorError> {
    if order.quantity <= Decimal::ZERO {
        return Err(ExecutorError::InvalidQuantity(order.quantity));
    }
    Ok(())
}

/// The paper executor used when live trading is disabled.
///
/// Every valid order fills in full at its reference price.
#[derive(Debug, Default)]
pub struct PaperExecutor {
    next_order_id: AtomicI64,
}

impl PaperExecutor {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Executor for PaperExecutor {
    async fn submit_market_order(
        &self,
        order: &OrderRequest,
        reference_price: Decimal,
    ) -> Result<OrderAck, ExecutorError> {
        validate(order)?;

        let ack = OrderAck {
            client_order_id: order.client_order_id,
            exchange_order_id: self.next_order_id.fetch_add(1, Ordering::Relaxed) + 1,
            symbol: order.symbol.clone(),
            side: order.side,
            executed_quantity: order.quantity,
            average_price: Some(reference_price),
            status: "FILLED".to_string(),
            timestamp: Utc::now(),
            simulated: true,
        };

        tracing::info!(
            symbol = %ack.symbol,
            side = %ack.side,
            quantity = %ack.executed_quantity,
            price = %reference_price,
            "PaperExecutor: simulated fill"
        );
        Ok(ack)
    }

    fn is_live(&self) -> bool {
        false
    }
}

/// The "live" executor that sends real orders to the exchange via the ApiClient.
pub struct LiveExecutor {
    api_client: Arc<dyn ApiClient>,
}

impl LiveExecutor {
    pub fn new(api_client: Arc<dyn ApiClient>) -> Self {
        Self { api_client }
    }
}

#[async_trait]
impl Executor for LiveExecutor {
    /// Executes a real order by passing it to the API client.
    /// It then transforms the exchange's response into our internal `OrderAck`.
    async fn submit_market_order(
        &self,
        order: &OrderRequest,
        _reference_price: Decimal,
    ) -> Result<OrderAck, ExecutorError> {
        validate(order)?;

        let response = self.api_client.place_market_order(order).await?;
        tracing::debug!("LiveExecutor: Received order response: {:?}", response);

        if response.executed_qty.is_zero() {
            return Err(ExecutorError::NotFilled {
                client_order_id: response.client_order_id,
                status: response.status,
            });
        }

        Ok(OrderAck {
            client_order_id: order.client_order_id,
            exchange_order_id: response.order_id,
            average_price: response.average_price(),
            symbol: response.symbol,
            side: response.side,
            executed_quantity: response.executed_qty,
            status: response.status,
            timestamp: Utc::now(),
            simulated: false,
        })
    }

    fn is_live(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_client::OrderResponse;
    use api_client::error::ApiError;
    use core_types::{LotConstraint, PriceSeries};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    /// Answers every order with a canned response.
    struct ScriptedApi {
        executed_qty: Decimal,
        status: &'static str,
        reject: bool,
    }

    #[async_trait]
    impl ApiClient for ScriptedApi {
        async fn fetch_price_series(&self, _: &str, _: &str, _: u16) -> Result<PriceSeries, ApiError> {
            unimplemented!()
        }
        async fn get_current_price(&self, _: &str) -> Result<Decimal, ApiError> {
            unimplemented!()
        }
        async fn get_trailing_high(&self, _: &str, _: u32) -> Result<Decimal, ApiError> {
            unimplemented!()
        }
        async fn get_balances(&self) -> Result<HashMap<String, Decimal>, ApiError> {
            unimplemented!()
        }
        async fn get_lot_constraint(&self, _: &str) -> Result<LotConstraint, ApiError> {
            unimplemented!()
        }
        async fn place_market_order(&self, order: &OrderRequest) -> Result<OrderResponse, ApiError> {
            if self.reject {
                return Err(ApiError::BinanceError {
                    code: -1013,
                    msg: "Filter failure: LOT_SIZE".to_string(),
                });
            }
            Ok(OrderResponse {
                symbol: order.symbol.clone(),
                order_id: 42,
                client_order_id: order.client_order_id.simple().to_string(),
                orig_qty: order.quantity,
                executed_qty: self.executed_qty,
                cummulative_quote_qty: self.executed_qty * dec!(50000),
                status: self.status.to_string(),
                side: order.side,
                order_type: "MARKET".to_string(),
            })
        }
    }

    fn live(executed_qty: Decimal, status: &'static str, reject: bool) -> LiveExecutor {
        LiveExecutor::new(Arc::new(ScriptedApi {
            executed_qty,
            status,
            reject,
        }))
    }

    #[tokio::test]
    async fn paper_fill_uses_reference_price() {
        let executor = PaperExecutor::new();
        let order = OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(0.0003));

        let ack = executor.submit_market_order(&order, dec!(50000)).await.unwrap();
        assert!(ack.simulated);
        assert_eq!(ack.executed_quantity, dec!(0.0003));
        assert_eq!(ack.average_price, Some(dec!(50000)));
        assert_eq!(ack.client_order_id, order.client_order_id);

        let second = executor.submit_market_order(&order, dec!(50000)).await.unwrap();
        assert_eq!(second.exchange_order_id, ack.exchange_order_id + 1);
    }

    #[tokio::test]
    async fn zero_quantity_is_refused_before_submission() {
        let order = OrderRequest::market("BTCUSDT", OrderSide::Sell, dec!(0));
        let result = live(dec!(1), "FILLED", false).submit_market_order(&order, dec!(1)).await;
        assert_eq!(result, Err(ExecutorError::InvalidQuantity(dec!(0))));
        assert!(!result.unwrap_err().is_rejection());
    }

    #[tokio::test]
    async fn live_fill_reports_average_price() {
        let order = OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(0.0003));
        let ack = live(dec!(0.0003), "FILLED", false)
            .submit_market_order(&order, dec!(49000))
            .await
            .unwrap();
        assert!(!ack.simulated);
        assert_eq!(ack.exchange_order_id, 42);
        assert_eq!(ack.average_price, Some(dec!(50000)));
    }

    #[tokio::test]
    async fn venue_rejection_is_typed() {
        let order = OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(0.0003));
        let error = live(dec!(0), "", true)
            .submit_market_order(&order, dec!(50000))
            .await
            .unwrap_err();
        assert!(matches!(error, ExecutorError::Rejected { code: -1013, .. }));
        assert!(error.is_rejection());
    }

    #[tokio::test]
    async fn expired_order_is_not_filled() {
        let order = OrderRequest::market("BTCUSDT", OrderSide::Sell, dec!(1));
        let error = live(dec!(0), "EXPIRED", false)
            .submit_market_order(&order, dec!(50000))
            .await
            .unwrap_err();
        assert!(matches!(error, ExecutorError::NotFilled { .. }));
    }
}
