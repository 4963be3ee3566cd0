use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutorError {
    #[error("Order quantity must be positive, got {0}")]
    InvalidQuantity(Decimal),

    #[error("Order rejected by the venue ({code}): {msg}")]
    Rejected { code: i64, msg: String },

    #[error("Order {client_order_id} was not filled (status {status})")]
    NotFilled { client_order_id: String, status: String },

    #[error("Order could not be delivered: {0}")]
    Transport(String),
}

impl ExecutorError {
    /// True when the venue saw and refused the order, so its cached metadata may be stale.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ExecutorError::Rejected { .. } | ExecutorError::NotFilled { .. })
    }
}

impl From<api_client::error::ApiError> for ExecutorError {
    fn from(error: api_client::error::ApiError) -> Self {
        match error {
            api_client::error::ApiError::BinanceError { code, msg } => ExecutorError::Rejected { code, msg },
            other => ExecutorError::Transport(other.to_string()),
        }
    }
}
