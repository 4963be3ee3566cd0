use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("Equity sample at {sample} is older than the latest sample at {latest}")]
    OutOfOrder {
        sample: DateTime<Utc>,
        latest: DateTime<Utc>,
    },

    #[error("Ledger capacity must be at least 1")]
    ZeroCapacity,
}
