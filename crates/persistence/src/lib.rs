//! # Crossguard Persistence Crate
//!
//! Durable storage for the engine's recoverable state: the position map and
//! the equity history. Everything else (prices, balances, lot constraints) is
//! re-fetched from the venue after a restart.
//!
//! ## Public API
//!
//! - `Snapshot`: The persisted document.
//! - `PersistenceStore`: The async trait the engine saves and loads through.
//! - `JsonFileStore`: A single-file JSON implementation with atomic replacement.
//! - `PersistenceError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod error;
pub mod snapshot;
pub mod store;

// Re-export the key components to create a clean, public-facing API.
pub use error::PersistenceError;
pub use snapshot::Snapshot;
pub use store::{JsonFileStore, PersistenceStore};
