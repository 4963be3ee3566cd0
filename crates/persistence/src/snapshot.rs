use core_types::{EquitySample, PositionState};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The persisted engine state.
///
/// Keys missing from an older file fall back to their defaults, so a file
/// written before a field existed still loads. A key present with the wrong
/// type is a hard error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    /// Position records keyed by instrument symbol.
    pub positions: BTreeMap<String, PositionState>,
    /// Equity samples, oldest first.
    pub equity_history: Vec<EquitySample>,
    /// Per-asset balance adjustments from simulated fills, applied on top of
    /// the venue balances while paper trading.
    pub paper_holdings: BTreeMap<String, Decimal>,
}

impl Snapshot {
    pub fn open_positions(&self) -> impl Iterator<Item = (&String, &PositionState)> {
        self.positions.iter().filter(|(_, state)| state.is_open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn missing_keys_take_defaults() {
        let snapshot: Snapshot = serde_json::from_str("{}").unwrap();
        assert_eq!(snapshot, Snapshot::default());

        let snapshot: Snapshot = serde_json::from_str(
            r#"{ "positions": { "BTCUSDT": { "is_open": true, "entry_price": "100" } } }"#,
        )
        .unwrap();
        let btc = &snapshot.positions["BTCUSDT"];
        assert!(btc.is_open);
        assert_eq!(btc.entry_price, dec!(100));
        assert_eq!(btc.take_profit_price, None);
        assert!(snapshot.equity_history.is_empty());
        assert!(snapshot.paper_holdings.is_empty());
    }

    #[test]
    fn wrong_types_are_rejected() {
        let result = serde_json::from_str::<Snapshot>(r#"{ "positions": [1, 2, 3] }"#);
        assert!(result.is_err());
    }

    #[test]
    fn lists_only_open_positions() {
        let mut snapshot = Snapshot::default();
        snapshot
            .positions
            .insert("BTCUSDT".to_string(), PositionState::opened(dec!(100), dec!(97), None));
        snapshot.positions.insert("SOLUSDT".to_string(), PositionState::flat());

        let open: Vec<_> = snapshot.open_positions().map(|(symbol, _)| symbol.as_str()).collect();
        assert_eq!(open, vec!["BTCUSDT"]);
    }
}
