//! # Crossguard Analytics
//!
//! The portfolio ledger: a bounded equity curve built from account balances
//! and prices, and the percentage performance figures derived from it.
//!
//! ## Public API
//!
//! - `PortfolioLedger`: owns the equity history (168 samples by default).
//! - `Valuation`: the result of marking an account to market.
//! - `PerformanceSummary`: the report published after each cycle.
//! - `AnalyticsError`: the error types that can be returned from this crate.

pub mod error;
pub mod ledger;
pub mod report;

pub use error::AnalyticsError;
pub use ledger::{EQUITY_HISTORY_CAPACITY, PortfolioLedger, Valuation};
pub use report::PerformanceSummary;
