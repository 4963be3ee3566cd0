use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    #[error("Risk parameters from configuration are invalid: {0}")]
    InvalidParameters(String),

    #[error("The provided entry price ({0}) is zero or negative.")]
    InvalidEntryPrice(Decimal),
}

/// Why an allocation or balance cannot be turned into an exchange-legal order.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SizingError {
    #[error("Instrument is not tradeable: minimum quantity {minimum_quantity}, step size {step_size}")]
    Untradeable {
        minimum_quantity: Decimal,
        step_size: Decimal,
    },

    #[error("Quantity {quantity} is below the minimum quantity {minimum_quantity}")]
    BelowMinimumQuantity {
        quantity: Decimal,
        minimum_quantity: Decimal,
    },

    #[error("Notional {notional} is below the minimum notional {minimum_notional}")]
    BelowMinimumNotional {
        notional: Decimal,
        minimum_notional: Decimal,
    },

    #[error("Sizing requires a positive price and non-negative funds, got price {price} and funds {funds}")]
    InvalidInput { price: Decimal, funds: Decimal },
}
