//! # Crossguard Events
//!
//! The observational feed the engine publishes for reporting collaborators
//! (alerting, charting, dashboards). Nothing consumed from this feed flows
//! back into trading decisions.

// Declare the modules that make up this crate.
pub mod messages;

// Re-export the core types to provide a clean public API.
pub use messages::{EngineEvent, LogLevel, LogMessage, SeriesReport, TradeNotice};
