use crate::error::RiskError;
use configuration::RiskManagement;
use rust_decimal::Decimal;
use serde::Serialize;

/// The trigger prices attached to a position at entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskThresholds {
    pub stop_loss_price: Decimal,
    /// `None` when no trailing high was available; such a take-profit never triggers.
    pub take_profit_price: Option<Decimal>,
}

impl RiskThresholds {
    /// True when the take-profit sits at or below the entry price and would fire on the next check.
    pub fn is_degenerate(&self, entry_price: Decimal) -> bool {
        self.take_profit_price
            .is_some_and(|take_profit| take_profit <= entry_price)
    }
}

/// Computes stop-loss and take-profit prices from fixed percentages.
///
/// Thresholds are computed once per entry and then held by the position;
/// nothing here re-evaluates them on later cycles.
#[derive(Debug, Clone)]
pub struct RiskController {
    stop_loss_pct: Decimal,
    take_profit_pct: Decimal,
}

impl RiskController {
    /// Creates a new `RiskController` with the given configuration parameters.
    pub fn new(params: &RiskManagement) -> Result<Self, RiskError> {
        for (name, pct) in [
            ("stop_loss_pct", params.stop_loss_pct),
            ("take_profit_pct", params.take_profit_pct),
        ] {
            if pct <= Decimal::ZERO || pct >= Decimal::ONE {
                return Err(RiskError::InvalidParameters(format!(
                    "{} must be between 0 and 1, got {}",
                    name, pct
                )));
            }
        }

        Ok(Self {
            stop_loss_pct: params.stop_loss_pct,
            take_profit_pct: params.take_profit_pct,
        })
    }

    /// `stop = entry × (1 − p_sl)`, `take_profit = trailing_high × (1 + p_tp)`.
    ///
    /// A missing or non-positive trailing high disables the take-profit.
    pub fn thresholds(
        &self,
        entry_price: Decimal,
        trailing_high: Option<Decimal>,
    ) -> Result<RiskThresholds, RiskError> {
        if entry_price <= Decimal::ZERO {
            return Err(RiskError::InvalidEntryPrice(entry_price));
        }

        let stop_loss_price = entry_price * (Decimal::ONE - self.stop_loss_pct);
        let take_profit_price = trailing_high
            .filter(|high| *high > Decimal::ZERO)
            .map(|high| high * (Decimal::ONE + self.take_profit_pct));

        Ok(RiskThresholds {
            stop_loss_price,
            take_profit_price,
        })
    }
}
