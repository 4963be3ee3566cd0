use core_types::LotConstraint;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Lot constraints keyed by symbol, each valid for `ttl` after it was fetched.
#[derive(Debug, Clone)]
pub struct LotCache {
    ttl: Duration,
    entries: HashMap<String, (LotConstraint, Instant)>,
}

impl LotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// The cached constraint, if it was fetched less than `ttl` before `now`.
    pub fn get(&self, symbol: &str, now: Instant) -> Option<LotConstraint> {
        self.entries
            .get(symbol)
            .filter(|(_, fetched_at)| now.saturating_duration_since(*fetched_at) < self.ttl)
            .map(|(lot, _)| *lot)
    }

    pub fn insert(&mut self, symbol: &str, lot: LotConstraint, now: Instant) {
        self.entries.insert(symbol.to_string(), (lot, now));
    }

    /// Drops the entry so the next lookup re-fetches it. Called when the venue rejects an order.
    pub fn invalidate(&mut self, symbol: &str) {
        if self.entries.remove(symbol).is_some() {
            tracing::debug!(symbol, "Invalidated cached lot constraint");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn lot() -> LotConstraint {
        LotConstraint {
            minimum_quantity: dec!(0.0001),
            step_size: dec!(0.0001),
            minimum_notional: dec!(10),
        }
    }

    #[test]
    fn entries_expire_after_ttl() {
        let mut cache = LotCache::new(Duration::from_secs(60));
        let start = Instant::now();
        cache.insert("BTCUSDT", lot(), start);

        assert_eq!(cache.get("BTCUSDT", start + Duration::from_secs(59)), Some(lot()));
        assert_eq!(cache.get("BTCUSDT", start + Duration::from_secs(60)), None);
        assert_eq!(cache.get("SOLUSDT", start), None);
    }

    #[test]
    fn invalidate_forces_refetch() {
        let mut cache = LotCache::new(Duration::from_secs(60));
        let start = Instant::now();
        cache.insert("BTCUSDT", lot(), start);
        cache.invalidate("BTCUSDT");
        assert_eq!(cache.get("BTCUSDT", start), None);
    }
}
