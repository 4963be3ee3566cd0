use crate::error::SizingError;
use core_types::LotConstraint;
use rust_decimal::Decimal;

/// Translates funds into exchange-legal order quantities.
///
/// The lot grid follows the exchange rule `(quantity − minimum_quantity) % step_size == 0`,
/// so quantities are always `minimum_quantity + k × step_size` for some `k ≥ 0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderSizer;

impl OrderSizer {
    pub fn new() -> Self {
        Self
    }

    /// Sizes a buy from a quote-currency allocation at the given price.
    ///
    /// The result never costs more than `allocation` and is never below the
    /// instrument's minimum notional.
    pub fn size_allocation(
        &self,
        lot: &LotConstraint,
        allocation: Decimal,
        price: Decimal,
    ) -> Result<Decimal, SizingError> {
        if price <= Decimal::ZERO || allocation < Decimal::ZERO {
            return Err(SizingError::InvalidInput {
                price,
                funds: allocation,
            });
        }
        self.size_quantity(lot, allocation / price, price)
    }

    /// Sizes an order from an available base-asset quantity (e.g. the free balance to sell).
    pub fn size_quantity(
        &self,
        lot: &LotConstraint,
        available: Decimal,
        price: Decimal,
    ) -> Result<Decimal, SizingError> {
        if price <= Decimal::ZERO || available < Decimal::ZERO {
            return Err(SizingError::InvalidInput {
                price,
                funds: available,
            });
        }

        let quantity = self.quantize(lot, available)?;

        let notional = quantity * price;
        if notional < lot.minimum_notional {
            return Err(SizingError::BelowMinimumNotional {
                notional,
                minimum_notional: lot.minimum_notional,
            });
        }

        tracing::debug!(%available, %quantity, %notional, "Sized order onto lot grid");
        Ok(quantity)
    }

    /// Rounds a quantity down onto the lot grid.
    ///
    /// Quantizing an already-quantized value returns it unchanged.
    pub fn quantize(&self, lot: &LotConstraint, quantity: Decimal) -> Result<Decimal, SizingError> {
        if lot.minimum_quantity <= Decimal::ZERO || lot.step_size <= Decimal::ZERO {
            return Err(SizingError::Untradeable {
                minimum_quantity: lot.minimum_quantity,
                step_size: lot.step_size,
            });
        }
        if quantity < lot.minimum_quantity {
            return Err(SizingError::BelowMinimumQuantity {
                quantity,
                minimum_quantity: lot.minimum_quantity,
            });
        }

        let steps = ((quantity - lot.minimum_quantity) / lot.step_size).floor();
        let quantized = lot.minimum_quantity + steps * lot.step_size;

        Ok(quantized.round_dp(lot_precision(lot)).normalize())
    }
}

/// The number of decimal places the lot grid can express.
fn lot_precision(lot: &LotConstraint) -> u32 {
    lot.step_size
        .normalize()
        .scale()
        .max(lot.minimum_quantity.normalize().scale())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn btc_lot() -> LotConstraint {
        LotConstraint {
            minimum_quantity: dec!(0.0001),
            step_size: dec!(0.0001),
            minimum_notional: dec!(10),
        }
    }

    #[test]
    fn sizes_reference_allocation() {
        let quantity = OrderSizer::new()
            .size_allocation(&btc_lot(), dec!(15), dec!(50000))
            .unwrap();
        assert_eq!(quantity, dec!(0.0003));
        assert_eq!(quantity.to_string(), "0.0003");
    }

    #[test]
    fn trailing_zeros_are_dropped() {
        let lot = LotConstraint {
            minimum_quantity: dec!(0.00010000),
            step_size: dec!(0.00010000),
            minimum_notional: dec!(5),
        };
        let quantity = OrderSizer::new().size_allocation(&lot, dec!(15), dec!(50000)).unwrap();
        assert_eq!(quantity.to_string(), "0.0003");
    }

    #[test]
    fn rounds_down_to_step() {
        let quantity = OrderSizer::new()
            .size_allocation(&btc_lot(), dec!(19.99), dec!(50000))
            .unwrap();
        assert_eq!(quantity, dec!(0.0003));
    }

    #[test]
    fn grid_is_anchored_at_minimum_quantity() {
        let lot = LotConstraint {
            minimum_quantity: dec!(0.15),
            step_size: dec!(0.1),
            minimum_notional: dec!(0),
        };
        let sizer = OrderSizer::new();
        assert_eq!(sizer.quantize(&lot, dec!(0.5)).unwrap(), dec!(0.45));
        assert_eq!(sizer.quantize(&lot, dec!(0.15)).unwrap(), dec!(0.15));
    }

    #[test]
    fn quantization_is_idempotent() {
        let sizer = OrderSizer::new();
        let lots = [
            btc_lot(),
            LotConstraint {
                minimum_quantity: dec!(0.001),
                step_size: dec!(0.001),
                minimum_notional: dec!(5),
            },
            LotConstraint {
                minimum_quantity: dec!(1),
                step_size: dec!(0.5),
                minimum_notional: dec!(1),
            },
        ];
        for lot in &lots {
            for raw in [dec!(0.0123456), dec!(1.99999), dec!(3.25), dec!(1234.56789)] {
                if let Ok(once) = sizer.quantize(lot, raw) {
                    assert_eq!(sizer.quantize(lot, once).unwrap(), once);
                    assert!(once <= raw);
                }
            }
        }
    }

    #[test]
    fn never_exceeds_allocation_or_undercuts_notional() {
        let sizer = OrderSizer::new();
        let lot = btc_lot();
        for allocation in [dec!(9.99), dec!(10), dec!(15), dec!(33.33), dec!(1000)] {
            for price in [dec!(25000), dec!(50000), dec!(97123.45)] {
                match sizer.size_allocation(&lot, allocation, price) {
                    Ok(quantity) => {
                        assert!(quantity > Decimal::ZERO);
                        assert!(quantity * price <= allocation);
                        assert!(quantity * price >= lot.minimum_notional);
                    }
                    Err(SizingError::BelowMinimumNotional { .. })
                    | Err(SizingError::BelowMinimumQuantity { .. }) => {}
                    Err(other) => panic!("unexpected error {other:?}"),
                }
            }
        }
    }

    #[test]
    fn small_allocation_is_rejected() {
        let result = OrderSizer::new().size_allocation(&btc_lot(), dec!(9), dec!(50000));
        assert!(matches!(result, Err(SizingError::BelowMinimumNotional { .. })));
    }

    #[test]
    fn allocation_below_minimum_quantity_is_not_bumped_up() {
        let result = OrderSizer::new().size_allocation(&btc_lot(), dec!(2), dec!(50000));
        assert!(matches!(result, Err(SizingError::BelowMinimumQuantity { .. })));
    }

    #[test]
    fn zero_minimum_quantity_is_untradeable() {
        let lot = LotConstraint {
            minimum_quantity: dec!(0),
            step_size: dec!(0.0001),
            minimum_notional: dec!(10),
        };
        let result = OrderSizer::new().size_allocation(&lot, dec!(1000), dec!(50000));
        assert!(matches!(result, Err(SizingError::Untradeable { .. })));
    }

    #[test]
    fn sells_full_balance_on_grid() {
        let lot = LotConstraint {
            minimum_quantity: dec!(0.01),
            step_size: dec!(0.01),
            minimum_notional: dec!(5),
        };
        let quantity = OrderSizer::new()
            .size_quantity(&lot, dec!(1.23789), dec!(150))
            .unwrap();
        assert_eq!(quantity, dec!(1.23));
    }

    #[test]
    fn rejects_non_positive_price() {
        let result = OrderSizer::new().size_allocation(&btc_lot(), dec!(15), dec!(0));
        assert!(matches!(result, Err(SizingError::InvalidInput { .. })));
    }
}
