//! # Crossguard Strategy Library
//!
//! This crate contains the trend signal logic. It defines the `SignalDetector`
//! trait and its moving average crossover implementation.
//!
//! ## Architectural Principles
//!
//! - **Pure Logic:** No knowledge of APIs, persistence or execution. It depends
//!   only on `core-types` and `configuration`.
//! - **Stateless Evaluation:** A detector classifies a whole `PriceSeries` on
//!   every call, so restarts and skipped cycles never desynchronise it.

pub mod error;
pub mod ma_crossover;

pub use error::StrategyError;
pub use ma_crossover::{MACrossover, MovingAverages};

use core_types::{CrossSignal, PriceSeries};

/// The trait the engine uses to turn a price series into a crossover signal.
pub trait SignalDetector: Send + Sync {
    /// Classifies the latest two points of the series.
    ///
    /// Returns `Err(StrategyError::InsufficientData)` when the series is too
    /// short for both averages to be defined at the previous point.
    fn detect(&self, series: &PriceSeries) -> Result<CrossSignal, StrategyError>;

    /// The minimum number of points `detect` needs.
    fn required_points(&self) -> usize;
}
