use configuration::AllocationMode;
use core_types::{CrossSignal, ExitReason, LotConstraint, PositionState};
use risk::{OrderSizer, RiskController, RiskError, RiskThresholds, SizingError};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// What the engine intends to do with one instrument this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// FLAT and bullish: try to buy.
    Enter,
    /// OPEN and one of the exit conditions holds.
    Exit(ExitReason),
    /// OPEN and nothing triggered.
    Hold,
    /// FLAT and no entry signal.
    Wait,
}

/// The per-instrument FLAT/OPEN state machine.
///
/// Decisions are pure; state only changes through `confirm_entry` and
/// `confirm_exit`, which the cycle driver calls after the execution gateway
/// has acknowledged an order.
#[derive(Debug, Clone)]
pub struct PositionEngine {
    positions: BTreeMap<String, PositionState>,
    risk: RiskController,
    sizer: OrderSizer,
}

impl PositionEngine {
    pub fn new(risk: RiskController) -> Self {
        Self {
            positions: BTreeMap::new(),
            risk,
            sizer: OrderSizer::new(),
        }
    }

    /// Replaces the in-memory state with persisted records.
    pub fn restore(&mut self, positions: BTreeMap<String, PositionState>) {
        self.positions = positions;
    }

    /// The current record, FLAT for instruments never seen.
    pub fn position(&self, symbol: &str) -> PositionState {
        self.positions.get(symbol).copied().unwrap_or_default()
    }

    pub fn positions(&self) -> &BTreeMap<String, PositionState> {
        &self.positions
    }

    /// Exit checks run in a fixed order: stop-loss, take-profit, bearish cross.
    pub fn decide(&self, symbol: &str, signal: CrossSignal, price: Decimal) -> Decision {
        let state = self.position(symbol);

        if !state.is_open {
            return match signal {
                CrossSignal::BullishCross => Decision::Enter,
                _ => Decision::Wait,
            };
        }

        if price <= state.stop_loss_price {
            Decision::Exit(ExitReason::StopLoss)
        } else if state.take_profit_price.is_some_and(|take_profit| price >= take_profit) {
            Decision::Exit(ExitReason::TakeProfit)
        } else if signal == CrossSignal::BearishCross {
            Decision::Exit(ExitReason::BearishCross)
        } else {
            Decision::Hold
        }
    }

    /// Divides the free quote balance among the instruments entering this cycle.
    ///
    /// The split is computed once, before any order is submitted, and depends
    /// only on the set of entering symbols, never on their order. An empty
    /// map means the balance does not exceed `min_entry_balance`.
    pub fn allocations(
        &self,
        free_quote: Decimal,
        entering: &[&str],
        mode: AllocationMode,
        configured: usize,
        min_entry_balance: Decimal,
    ) -> BTreeMap<String, Decimal> {
        if entering.is_empty() || free_quote <= min_entry_balance {
            return BTreeMap::new();
        }

        let slots = match mode {
            AllocationMode::EqualSignal => entering.len(),
            AllocationMode::FixedSlots => configured.max(entering.len()),
        };
        let share = free_quote / Decimal::from(slots);

        entering
            .iter()
            .map(|symbol| (symbol.to_string(), share))
            .collect()
    }

    pub fn size_entry(
        &self,
        lot: &LotConstraint,
        allocation: Decimal,
        price: Decimal,
    ) -> Result<Decimal, SizingError> {
        self.sizer.size_allocation(lot, allocation, price)
    }

    /// The whole free base balance, quantized onto the lot grid.
    pub fn size_exit(
        &self,
        lot: &LotConstraint,
        free_base: Decimal,
        price: Decimal,
    ) -> Result<Decimal, SizingError> {
        self.sizer.size_quantity(lot, free_base, price)
    }

    /// FLAT → OPEN after a confirmed buy. Thresholds are fixed from here on.
    pub fn confirm_entry(
        &mut self,
        symbol: &str,
        entry_price: Decimal,
        trailing_high: Option<Decimal>,
    ) -> Result<RiskThresholds, RiskError> {
        let thresholds = self.risk.thresholds(entry_price, trailing_high)?;
        if thresholds.is_degenerate(entry_price) {
            tracing::warn!(
                symbol,
                %entry_price,
                take_profit = ?thresholds.take_profit_price,
                "Take-profit is at or below entry"
            );
        }

        self.positions.insert(
            symbol.to_string(),
            PositionState::opened(
                entry_price,
                thresholds.stop_loss_price,
                thresholds.take_profit_price,
            ),
        );
        Ok(thresholds)
    }

    /// OPEN → FLAT after a confirmed sell.
    pub fn confirm_exit(&mut self, symbol: &str) {
        self.positions.insert(symbol.to_string(), PositionState::flat());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use configuration::RiskManagement;
    use rust_decimal_macros::dec;

    fn engine() -> PositionEngine {
        PositionEngine::new(RiskController::new(&RiskManagement::default()).unwrap())
    }

    fn open_engine(take_profit: Option<Decimal>) -> PositionEngine {
        let mut engine = engine();
        engine.restore(BTreeMap::from([(
            "BTCUSDT".to_string(),
            PositionState::opened(dec!(100), dec!(97), take_profit),
        )]));
        engine
    }

    #[test]
    fn flat_enters_only_on_bullish_cross() {
        let engine = engine();
        assert_eq!(engine.decide("BTCUSDT", CrossSignal::BullishCross, dec!(100)), Decision::Enter);
        assert_eq!(engine.decide("BTCUSDT", CrossSignal::BearishCross, dec!(100)), Decision::Wait);
        assert_eq!(engine.decide("BTCUSDT", CrossSignal::NoCross, dec!(100)), Decision::Wait);
    }

    #[test]
    fn open_exits_only_on_stop_take_profit_or_bearish_cross() {
        let engine = open_engine(Some(dec!(114.40)));
        let cases = [
            (CrossSignal::NoCross, dec!(100), Decision::Hold),
            (CrossSignal::BullishCross, dec!(110), Decision::Hold),
            (CrossSignal::NoCross, dec!(97), Decision::Exit(ExitReason::StopLoss)),
            (CrossSignal::NoCross, dec!(114.40), Decision::Exit(ExitReason::TakeProfit)),
            (CrossSignal::BearishCross, dec!(105), Decision::Exit(ExitReason::BearishCross)),
        ];
        for (signal, price, expected) in cases {
            assert_eq!(engine.decide("BTCUSDT", signal, price), expected, "{signal} @ {price}");
        }
    }

    #[test]
    fn stop_loss_wins_over_bearish_cross() {
        let engine = open_engine(Some(dec!(114.40)));
        assert_eq!(
            engine.decide("BTCUSDT", CrossSignal::BearishCross, dec!(90)),
            Decision::Exit(ExitReason::StopLoss)
        );
    }

    #[test]
    fn disabled_take_profit_never_triggers() {
        let engine = open_engine(None);
        for price in [dec!(98), dec!(1000), dec!(1000000)] {
            assert_eq!(engine.decide("BTCUSDT", CrossSignal::NoCross, price), Decision::Hold);
        }
    }

    #[test]
    fn equal_signal_split_ignores_order() {
        let engine = engine();
        let forward = engine.allocations(
            dec!(100),
            &["BTCUSDT", "SOLUSDT"],
            AllocationMode::EqualSignal,
            3,
            dec!(10),
        );
        let reversed = engine.allocations(
            dec!(100),
            &["SOLUSDT", "BTCUSDT"],
            AllocationMode::EqualSignal,
            3,
            dec!(10),
        );
        assert_eq!(forward, reversed);
        assert_eq!(forward["BTCUSDT"], dec!(50));
        assert_eq!(forward["SOLUSDT"], dec!(50));
    }

    #[test]
    fn fixed_slots_split_across_configured_instruments() {
        let allocations = engine().allocations(
            dec!(100),
            &["BTCUSDT"],
            AllocationMode::FixedSlots,
            2,
            dec!(10),
        );
        assert_eq!(allocations["BTCUSDT"], dec!(50));
    }

    #[test]
    fn balance_at_minimum_allocates_nothing() {
        let allocations = engine().allocations(
            dec!(10),
            &["BTCUSDT"],
            AllocationMode::EqualSignal,
            1,
            dec!(10),
        );
        assert!(allocations.is_empty());
    }

    #[test]
    fn confirmations_drive_transitions() {
        let mut engine = engine();
        let thresholds = engine.confirm_entry("BTCUSDT", dec!(100), Some(dec!(110))).unwrap();
        assert_eq!(thresholds.stop_loss_price, dec!(97.00));

        let state = engine.position("BTCUSDT");
        assert!(state.is_open);
        assert_eq!(state.entry_price, dec!(100));
        assert_eq!(state.take_profit_price, Some(dec!(114.40)));

        engine.confirm_exit("BTCUSDT");
        assert_eq!(engine.position("BTCUSDT"), PositionState::flat());
    }
}
