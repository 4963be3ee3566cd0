//! # Crossguard Core Types
//!
//! The shared vocabulary of the workspace: instruments, price series, position
//! state, lot constraints and equity samples. Every other crate depends on
//! this one; it depends on nothing in the workspace.

pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{CrossSignal, ExitReason, OrderSide};
pub use error::CoreError;
pub use structs::{
    EquitySample, Instrument, LotConstraint, OrderRequest, PositionState, PricePoint, PriceSeries,
};
