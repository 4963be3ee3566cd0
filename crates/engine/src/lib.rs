//! # Crossguard Engine
//!
//! The cycle driver and the per-instrument position state machine.
//!
//! - `PositionEngine`: FLAT/OPEN transitions, exit precedence and the entry
//!   allocation split. Pure; no I/O.
//! - `LiveEngine`: owns every collaborator and all mutable state, runs one
//!   cycle per poll interval and persists a consistent snapshot after each.
//! - `CycleReport`: what happened to every instrument, with typed failures.

pub mod error;
pub mod live;
pub mod lot_cache;
pub mod position_engine;
pub mod report;

pub use error::EngineError;
pub use live::LiveEngine;
pub use lot_cache::LotCache;
pub use position_engine::{Decision, PositionEngine};
pub use report::{CycleReport, FailureKind, InstrumentOutcome};
