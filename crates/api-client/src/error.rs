use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Binance returned error {code}: {msg}")]
    BinanceError { code: i64, msg: String },

    #[error("Failed to deserialize the API response: {0}")]
    Deserialization(String),

    #[error("Invalid data format from API: {0}")]
    InvalidData(String),

    #[error("Failed to sign request: {0}")]
    Signing(String),

    #[error("Invalid client configuration: {0}")]
    Configuration(String),
}

impl ApiError {
    /// True when the venue refused the request itself (as opposed to a transport failure).
    pub fn is_rejection(&self) -> bool {
        matches!(self, ApiError::BinanceError { .. })
    }
}
