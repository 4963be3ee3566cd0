use crate::SignalDetector;
use crate::error::StrategyError;
use configuration::MACrossoverParams;
use core_types::{CrossSignal, PriceSeries};
use rust_decimal::prelude::*;
use std::cmp::Ordering;
use ta::Next;
use ta::indicators::SimpleMovingAverage as Sma;

/// Short and long simple moving averages aligned with the points of a series.
///
/// Entries are `None` until enough closes exist for that window.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingAverages {
    pub short: Vec<Option<Decimal>>,
    pub long: Vec<Option<Decimal>>,
}

/// The dual simple moving average crossover detector.
#[derive(Debug, Clone)]
pub struct MACrossover {
    short_window: usize,
    long_window: usize,
}

impl MACrossover {
    /// Creates a new `MACrossover` instance with the given parameters.
    ///
    /// It performs validation to ensure the parameters are logical.
    pub fn new(params: &MACrossoverParams) -> Result<Self, StrategyError> {
        if params.short_window == 0 {
            return Err(StrategyError::InvalidParameters(
                "Short MA window must be greater than zero".to_string(),
            ));
        }
        if params.short_window >= params.long_window {
            return Err(StrategyError::InvalidParameters(
                "Short MA window must be less than long MA window".to_string(),
            ));
        }

        Ok(Self {
            short_window: params.short_window,
            long_window: params.long_window,
        })
    }

    pub fn short_window(&self) -> usize {
        self.short_window
    }

    pub fn long_window(&self) -> usize {
        self.long_window
    }

    /// The sum of the `window` closes ending at `index`.
    fn window_sum(closes: &[Decimal], index: usize, window: usize) -> Decimal {
        closes[index + 1 - window..=index].iter().copied().sum()
    }

    /// Orders the short average against the long one at `index`.
    ///
    /// Compares `short_sum × long_window` with `long_sum × short_window`, so
    /// equal averages compare equal without any division rounding.
    fn compare_at(&self, closes: &[Decimal], index: usize) -> Result<Ordering, StrategyError> {
        let short_sum = Self::window_sum(closes, index, self.short_window);
        let long_sum = Self::window_sum(closes, index, self.long_window);

        let short_scaled = short_sum.checked_mul(Decimal::from(self.long_window));
        let long_scaled = long_sum.checked_mul(Decimal::from(self.short_window));
        match (short_scaled, long_scaled) {
            (Some(short), Some(long)) => Ok(short.cmp(&long)),
            _ => Err(StrategyError::IndicatorError(format!(
                "moving averages overflow at point {}",
                index
            ))),
        }
    }

    /// Computes both averages at every point of the series for reporting.
    pub fn averages(&self, series: &PriceSeries) -> Result<MovingAverages, StrategyError> {
        let closes = series
            .closes()
            .map(|close| {
                close.to_f64().ok_or_else(|| {
                    StrategyError::IndicatorError(format!("close {} is not representable as f64", close))
                })
            })
            .collect::<Result<Vec<f64>, StrategyError>>()?;

        Ok(MovingAverages {
            short: rolling_sma(&closes, self.short_window)?,
            long: rolling_sma(&closes, self.long_window)?,
        })
    }
}

/// Runs a `ta` SMA over the closes, masking the warm-up values.
///
/// The `ta` indicator averages over however many inputs it has seen so far,
/// so outputs before the window is full are not a true `period` average.
fn rolling_sma(closes: &[f64], period: usize) -> Result<Vec<Option<Decimal>>, StrategyError> {
    let mut sma = Sma::new(period).map_err(|e| StrategyError::IndicatorError(e.to_string()))?;

    closes
        .iter()
        .enumerate()
        .map(|(index, close)| {
            let value = sma.next(*close);
            if index + 1 < period {
                return Ok(None);
            }
            Decimal::from_f64(value)
                .map(Some)
                .ok_or_else(|| StrategyError::IndicatorError(format!("SMA({}) produced {}", period, value)))
        })
        .collect()
}

impl SignalDetector for MACrossover {
    /// A bullish cross is the short MA moving from at-or-below to strictly above
    /// the long MA between the last two points; a bearish cross is the mirror.
    fn detect(&self, series: &PriceSeries) -> Result<CrossSignal, StrategyError> {
        let required = self.required_points();
        if series.len() < required {
            return Err(StrategyError::InsufficientData {
                required,
                available: series.len(),
            });
        }

        let closes: Vec<Decimal> = series.closes().collect();
        let last = closes.len() - 1;
        let previous = self.compare_at(&closes, last - 1)?;
        let current = self.compare_at(&closes, last)?;

        tracing::debug!(
            symbol = %series.symbol(),
            short = %(Self::window_sum(&closes, last, self.short_window) / Decimal::from(self.short_window)),
            long = %(Self::window_sum(&closes, last, self.long_window) / Decimal::from(self.long_window)),
            ?previous,
            ?current,
            "MACrossover: evaluated averages"
        );

        let signal = match (previous, current) {
            (Ordering::Less | Ordering::Equal, Ordering::Greater) => CrossSignal::BullishCross,
            (Ordering::Greater | Ordering::Equal, Ordering::Less) => CrossSignal::BearishCross,
            _ => CrossSignal::NoCross,
        };

        Ok(signal)
    }

    fn required_points(&self) -> usize {
        self.long_window + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use core_types::PricePoint;
    use rust_decimal_macros::dec;

    fn series(closes: &[Decimal]) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, close)| PricePoint {
                timestamp: start + Duration::hours(i as i64),
                close: *close,
            })
            .collect();
        PriceSeries::new("BTCUSDT", points).unwrap()
    }

    fn detector(short: usize, long: usize) -> MACrossover {
        MACrossover::new(&MACrossoverParams {
            short_window: short,
            long_window: long,
        })
        .unwrap()
    }

    #[test]
    fn rejects_inverted_windows() {
        let params = MACrossoverParams {
            short_window: 5,
            long_window: 5,
        };
        assert!(matches!(
            MACrossover::new(&params),
            Err(StrategyError::InvalidParameters(_))
        ));
    }

    #[test]
    fn short_series_is_insufficient_data() {
        let detector = detector(2, 4);
        for len in 0..5 {
            let closes = vec![dec!(10); len];
            assert_eq!(
                detector.detect(&series(&closes)),
                Err(StrategyError::InsufficientData {
                    required: 5,
                    available: len
                })
            );
        }
    }

    #[test]
    fn detects_bullish_cross_at_last_point() {
        // Flat at 10: both averages equal at t-1. The jump to 20 lifts SMA2 to 15, SMA4 to 12.5.
        let closes = [dec!(10), dec!(10), dec!(10), dec!(10), dec!(10), dec!(20)];
        assert_eq!(detector(2, 4).detect(&series(&closes)), Ok(CrossSignal::BullishCross));
    }

    #[test]
    fn detects_bearish_cross_at_last_point() {
        let closes = [dec!(10), dec!(10), dec!(10), dec!(10), dec!(10), dec!(5)];
        assert_eq!(detector(2, 4).detect(&series(&closes)), Ok(CrossSignal::BearishCross));
    }

    #[test]
    fn steady_trend_is_no_cross() {
        let closes = [dec!(1), dec!(2), dec!(3), dec!(4), dec!(5), dec!(6)];
        assert_eq!(detector(2, 4).detect(&series(&closes)), Ok(CrossSignal::NoCross));
    }

    #[test]
    fn cross_before_last_point_is_not_reported() {
        // The short average crossed above at t-1 and stays above at t.
        let closes = [dec!(10), dec!(10), dec!(10), dec!(10), dec!(20), dec!(20)];
        assert_eq!(detector(2, 4).detect(&series(&closes)), Ok(CrossSignal::NoCross));
    }

    #[test]
    fn equal_averages_before_the_jump_still_cross() {
        // 142.37 has no exact binary form; the prior averages must still tie.
        let detector = MACrossover::new(&MACrossoverParams::default()).unwrap();
        for base in [dec!(142.37), dec!(0.1), dec!(64250.17), dec!(0.00001234)] {
            let mut closes = vec![base; 41];
            closes[40] = base * dec!(1.5);
            assert_eq!(
                detector.detect(&series(&closes)),
                Ok(CrossSignal::BullishCross),
                "bullish from {base}"
            );

            closes[40] = base * dec!(0.5);
            assert_eq!(
                detector.detect(&series(&closes)),
                Ok(CrossSignal::BearishCross),
                "bearish from {base}"
            );
        }
    }

    #[test]
    fn averages_mask_warm_up() {
        let closes = [dec!(2), dec!(4), dec!(6), dec!(8)];
        let averages = detector(2, 3).averages(&series(&closes)).unwrap();
        assert_eq!(averages.short, vec![None, Some(dec!(3)), Some(dec!(5)), Some(dec!(7))]);
        assert_eq!(averages.long, vec![None, None, Some(dec!(4)), Some(dec!(6))]);
    }

    #[test]
    fn works_with_default_windows() {
        let detector = MACrossover::new(&MACrossoverParams::default()).unwrap();
        assert_eq!(detector.required_points(), 41);

        let mut closes = vec![dec!(100); 41];
        closes[40] = dec!(140);
        assert_eq!(detector.detect(&series(&closes)), Ok(CrossSignal::BullishCross));
    }
}
