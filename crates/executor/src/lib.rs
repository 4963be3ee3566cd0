//! # Crossguard Executor Crate
//!
//! The execution gateway: turns a sized `OrderRequest` into a confirmed
//! `OrderAck` or an explicit `ExecutorError`. The engine only changes a
//! position after an acknowledgement, so every failure here leaves the
//! position state untouched.
//!
//! ## Public API
//!
//! - `Executor`: The core trait for all execution engines.
//! - `LiveExecutor`: Sends market orders through the `ApiClient`.
//! - `PaperExecutor`: Fills every order at the reference price without touching the venue.
//! - `ExecutorError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod error;
pub mod exchange;

// Re-export the key components to provide a clean, public-facing API.
pub use error::ExecutorError;
pub use exchange::{Executor, LiveExecutor, OrderAck, PaperExecutor};
