use crate::auth::sign_request;
use crate::error::ApiError;
use async_trait::async_trait;
use configuration::settings::ApiConfig;
use core_types::{LotConstraint, OrderRequest, PriceSeries};
use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

mod auth;
pub mod error;
pub mod responses;
// --- Public API ---
pub use responses::{
    AccountResponse, ApiErrorResponse, BalanceResponse, ExchangeInfoResponse, OrderResponse,
    SymbolFilter, SymbolInfo, TickerPriceResponse,
};
use responses::{RawKline, klines_to_series};

/// The generic, abstract interface for a trading exchange API client.
/// This trait is the contract that the live engine will use, allowing the
/// underlying implementation (live or mock) to be swapped out.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Fetches the latest `limit` candles and returns their closes, oldest first.
    async fn fetch_price_series(
        &self,
        symbol: &str,
        interval: &str,
        limit: u16,
    ) -> Result<PriceSeries, ApiError>;

    /// Fetches the latest traded price.
    async fn get_current_price(&self, symbol: &str) -> Result<Decimal, ApiError>;

    /// The maximum daily close over the last `days` days.
    async fn get_trailing_high(&self, symbol: &str, days: u32) -> Result<Decimal, ApiError>;

    /// Fetches the free balance of every asset. (Authenticated)
    async fn get_balances(&self) -> Result<HashMap<String, Decimal>, ApiError>;

    /// Fetches the quantity rules of a symbol from exchange metadata.
    async fn get_lot_constraint(&self, symbol: &str) -> Result<LotConstraint, ApiError>;

    /// Places a market order. (Authenticated)
    async fn place_market_order(&self, order: &OrderRequest) -> Result<OrderResponse, ApiError>;
}

/// A concrete implementation of the `ApiClient` for the Binance spot exchange.
#[derive(Clone)]
pub struct BinanceClient {
    client: reqwest::Client,
    base_url: String,

    api_secret: String,
}

const PRODUCTION_URL: &str = "https://api.binance.com";
const TESTNET_URL: &str = "https://testnet.binance.vision";
const RECV_WINDOW_MS: &str = "5000";

impl BinanceClient {
    pub fn new(production: bool, api_config: &ApiConfig, timeout: Duration) -> Result<Self, ApiError> {
        let (base_url, keys) = if production {
            (PRODUCTION_URL, &api_config.production)
        } else {
            (TESTNET_URL, &api_config.testnet)
        };

        let mut headers = HeaderMap::new();
        if !keys.key.is_empty() {
            let value = HeaderValue::from_str(&keys.key)
                .map_err(|e| ApiError::Configuration(format!("invalid API key: {}", e)))?;
            headers.insert("X-MBX-APIKEY", value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        tracing::info!(base_url, "Configured Binance spot client");

        Ok(Self {
            client,
            base_url: base_url.to_string(),

            api_secret: keys.secret.clone(),
        })
    }

    async fn get_public<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).query(params).send().await?;
        Self::decode(response).await
    }

    fn signed_url(&self, path: &str, params: &mut BTreeMap<&str, String>) -> Result<String, ApiError> {
        params.insert("recvWindow", RECV_WINDOW_MS.to_string());
        params.insert("timestamp", chrono::Utc::now().timestamp_millis().to_string());

        let query_string =
            serde_qs::to_string(params).map_err(|e| ApiError::Signing(e.to_string()))?;
        let signature = sign_request(&self.api_secret, &query_string)?;

        Ok(format!(
            "{}{}?{}&signature={}",
            self.base_url, path, query_string, signature
        ))
    }

    async fn get_signed<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &mut BTreeMap<&str, String>,
    ) -> Result<T, ApiError> {
        let url = self.signed_url(path, params)?;
        let response = self.client.get(&url).send().await?;
        Self::decode(response).await
    }

    async fn post_signed<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &mut BTreeMap<&str, String>,
    ) -> Result<T, ApiError> {
        let url = self.signed_url(path, params)?;
        let response = self.client.post(&url).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str::<T>(&text).map_err(|e| ApiError::Deserialization(e.to_string()))
        } else {
            let api_error: ApiErrorResponse = serde_json::from_str(&text).map_err(|e| {
                ApiError::Deserialization(format!(
                    "Failed to deserialize error response ({}): {}. Original text: {}",
                    status, e, text
                ))
            })?;
            Err(ApiError::BinanceError {
                code: api_error.code,
                msg: api_error.msg,
            })
        }
    }
}

#[async_trait]
impl ApiClient for BinanceClient {
    async fn fetch_price_series(
        &self,
        symbol: &str,
        interval: &str,
        limit: u16,
    ) -> Result<PriceSeries, ApiError> {
        let limit = limit.to_string();
        let raw: Vec<RawKline> = self
            .get_public(
                "/api/v3/klines",
                &[("symbol", symbol), ("interval", interval), ("limit", &limit)],
            )
            .await?;

        klines_to_series(symbol, raw)
    }

    async fn get_current_price(&self, symbol: &str) -> Result<Decimal, ApiError> {
        let ticker: TickerPriceResponse = self
            .get_public("/api/v3/ticker/price", &[("symbol", symbol)])
            .await?;
        Ok(ticker.price)
    }

    async fn get_trailing_high(&self, symbol: &str, days: u32) -> Result<Decimal, ApiError> {
        let limit = days.to_string();
        let raw: Vec<RawKline> = self
            .get_public(
                "/api/v3/klines",
                &[("symbol", symbol), ("interval", "1d"), ("limit", &limit)],
            )
            .await?;

        klines_to_series(symbol, raw)?
            .max_close()
            .ok_or_else(|| ApiError::InvalidData(format!("no daily candles for {}", symbol)))
    }

    async fn get_balances(&self) -> Result<HashMap<String, Decimal>, ApiError> {
        let mut params = BTreeMap::new();
        let account: AccountResponse = self.get_signed("/api/v3/account", &mut params).await?;

        Ok(account
            .balances
            .into_iter()
            .map(|balance| (balance.asset, balance.free))
            .collect())
    }

    async fn get_lot_constraint(&self, symbol: &str) -> Result<LotConstraint, ApiError> {
        let info: ExchangeInfoResponse = self
            .get_public("/api/v3/exchangeInfo", &[("symbol", symbol)])
            .await?;

        info.symbols
            .iter()
            .find(|s| s.symbol == symbol)
            .ok_or_else(|| ApiError::InvalidData(format!("{} not listed in exchangeInfo", symbol)))?
            .lot_constraint()
    }

    async fn place_market_order(&self, order: &OrderRequest) -> Result<OrderResponse, ApiError> {
        let mut params = BTreeMap::new();
        params.insert("symbol", order.symbol.clone());
        params.insert("side", order.side.as_str().to_string());
        params.insert("type", "MARKET".to_string());
        params.insert("quantity", order.quantity.normalize().to_string());
        params.insert("newClientOrderId", order.client_order_id.simple().to_string());
        params.insert("newOrderRespType", "FULL".to_string());

        tracing::info!(
            symbol = %order.symbol,
            side = %order.side,
            quantity = %order.quantity,
            "Submitting market order"
        );
        self.post_signed("/api/v3/order", &mut params).await
    }
}
