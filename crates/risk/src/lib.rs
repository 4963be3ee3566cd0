//! # Crossguard Risk Crate
//!
//! Position-level risk controls and exchange-legal order sizing.
//!
//! - `RiskController` turns an entry price and a trailing high into fixed
//!   stop-loss and take-profit trigger prices.
//! - `OrderSizer` turns a quote allocation (or a base balance) into a quantity
//!   on the exchange's lot grid, or explains why it cannot.

pub mod error;
pub mod sizer;
pub mod thresholds;

pub use error::{RiskError, SizingError};
pub use sizer::OrderSizer;
pub use thresholds::{RiskController, RiskThresholds};
