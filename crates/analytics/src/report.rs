use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The account performance snapshot derived from the equity history.
///
/// Percentages are `None` when the history does not reach back far enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub timestamp: DateTime<Utc>,
    pub latest_valuation: Option<Decimal>,
    pub change_24h_pct: Option<Decimal>,
    pub change_7d_pct: Option<Decimal>,
    /// Largest peak-to-trough decline over the retained history, in percent.
    pub max_drawdown_pct: Option<Decimal>,
    pub samples: usize,
}

impl PerformanceSummary {
    /// A one-line human readable rendering, used by logs and alerts.
    pub fn headline(&self) -> String {
        fn pct(value: Option<Decimal>) -> String {
            value
                .map(|v| format!("{:+.2}%", v.round_dp(2)))
                .unwrap_or_else(|| "N/A".to_string())
        }

        let valuation = self
            .latest_valuation
            .map(|v| format!("{:.2}", v.round_dp(2)))
            .unwrap_or_else(|| "N/A".to_string());

        format!(
            "Total: {} | 24h: {} | 7d: {}",
            valuation,
            pct(self.change_24h_pct),
            pct(self.change_7d_pct)
        )
    }
}
