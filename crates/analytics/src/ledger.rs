use crate::error::AnalyticsError;
use crate::report::PerformanceSummary;
use chrono::{DateTime, Duration, Utc};
use core_types::EquitySample;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};

/// One week of hourly samples.
pub const EQUITY_HISTORY_CAPACITY: usize = 168;

/// The result of marking an account to market.
#[derive(Debug, Clone, PartialEq)]
pub struct Valuation {
    pub total: Decimal,
    /// Assets with a non-zero balance but no price; they contributed nothing.
    pub missing_prices: Vec<String>,
}

/// Tracks account valuation over time in a fixed-capacity FIFO.
#[derive(Debug, Clone)]
pub struct PortfolioLedger {
    history: VecDeque<EquitySample>,
    capacity: usize,
}

impl Default for PortfolioLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl PortfolioLedger {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(EQUITY_HISTORY_CAPACITY),
            capacity: EQUITY_HISTORY_CAPACITY,
        }
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, AnalyticsError> {
        if capacity == 0 {
            return Err(AnalyticsError::ZeroCapacity);
        }
        Ok(Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Rebuilds a ledger from persisted samples (oldest first).
    ///
    /// Histories longer than the capacity keep only their newest samples.
    pub fn from_history(samples: Vec<EquitySample>) -> Result<Self, AnalyticsError> {
        let mut ledger = Self::new();
        for sample in samples {
            ledger.record(sample)?;
        }
        Ok(ledger)
    }

    /// Total valuation = quote balance + Σ(balance × price) over `assets`.
    pub fn value_account(
        balances: &HashMap<String, Decimal>,
        prices: &HashMap<String, Decimal>,
        quote_asset: &str,
        assets: &[String],
    ) -> Valuation {
        let mut total = balances.get(quote_asset).copied().unwrap_or(Decimal::ZERO);
        let mut missing_prices = Vec::new();

        for asset in assets.iter().filter(|a| a.as_str() != quote_asset) {
            let balance = balances.get(asset).copied().unwrap_or(Decimal::ZERO);
            if balance.is_zero() {
                continue;
            }
            match prices.get(asset) {
                Some(price) => total += balance * *price,
                None => missing_prices.push(asset.clone()),
            }
        }

        Valuation {
            total,
            missing_prices,
        }
    }

    /// Appends a sample, evicting the oldest once the capacity is reached.
    pub fn record(&mut self, sample: EquitySample) -> Result<(), AnalyticsError> {
        if let Some(latest) = self.history.back() {
            if sample.timestamp < latest.timestamp {
                return Err(AnalyticsError::OutOfOrder {
                    sample: sample.timestamp,
                    latest: latest.timestamp,
                });
            }
        }

        while self.history.len() >= self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(sample);
        Ok(())
    }

    pub fn latest(&self) -> Option<&EquitySample> {
        self.history.back()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn samples(&self) -> impl Iterator<Item = &EquitySample> {
        self.history.iter()
    }

    /// The history as an owned vector, oldest first.
    pub fn to_vec(&self) -> Vec<EquitySample> {
        self.history.iter().copied().collect()
    }

    /// Percentage change of the latest sample against the most recent sample
    /// taken at or before `now − hours`.
    ///
    /// `None` when no sample is that old or its valuation is zero.
    pub fn change_pct(&self, now: DateTime<Utc>, hours: i64) -> Option<Decimal> {
        let latest = self.history.back()?;
        let cutoff = now - Duration::hours(hours);

        let reference = self
            .history
            .iter()
            .rev()
            .find(|sample| sample.timestamp <= cutoff)?;

        if reference.total_valuation.is_zero() {
            return None;
        }

        Some((latest.total_valuation - reference.total_valuation) / reference.total_valuation * Decimal::ONE_HUNDRED)
    }

    /// Largest peak-to-trough decline over the history, in percent.
    pub fn max_drawdown_pct(&self) -> Option<Decimal> {
        let first = self.history.front()?;
        let mut peak = first.total_valuation;
        let mut worst = Decimal::ZERO;

        for sample in &self.history {
            if sample.total_valuation > peak {
                peak = sample.total_valuation;
            }
            if peak > Decimal::ZERO {
                let drawdown = (peak - sample.total_valuation) / peak * Decimal::ONE_HUNDRED;
                if drawdown > worst {
                    worst = drawdown;
                }
            }
        }

        Some(worst)
    }

    pub fn summary(&self, now: DateTime<Utc>) -> PerformanceSummary {
        PerformanceSummary {
            timestamp: now,
            latest_valuation: self.latest().map(|s| s.total_valuation),
            change_24h_pct: self.change_pct(now, 24),
            change_7d_pct: self.change_pct(now, 24 * 7),
            max_drawdown_pct: self.max_drawdown_pct(),
            samples: self.len(),
        }
    }
}
