//! Close prices recorded from accepted bars, used to resolve forward checks.

use dashmap::DashMap;

use crate::services::signals::PriceLookup;

/// Per-symbol (timestamp, close) history in arrival order.
#[derive(Debug, Default)]
pub struct PriceTape {
    series: DashMap<String, Vec<(i64, f64)>>,
}

impl PriceTape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a close. Out-of-order timestamps are ignored.
    pub fn record(&self, symbol: &str, timestamp: i64, close: f64) {
        let mut entry = self.series.entry(symbol.to_uppercase()).or_default();
        if entry.last().map(|(ts, _)| timestamp > *ts).unwrap_or(true) {
            entry.push((timestamp, close));
        }
    }

    /// Most recent close for a symbol.
    pub fn latest(&self, symbol: &str) -> Option<(i64, f64)> {
        self.series
            .get(&symbol.to_uppercase())
            .and_then(|s| s.last().copied())
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.series
            .get(&symbol.to_uppercase())
            .map(|s| s.len())
            .unwrap_or(0)
    }

    pub fn clear(&self) {
        self.series.clear();
    }
}

impl PriceLookup for PriceTape {
    /// Close of the first bar at or after `at_ms`; `None` until such a bar
    /// has arrived.
    fn price_at(&self, symbol: &str, at_ms: i64) -> Option<f64> {
        let series = self.series.get(&symbol.to_uppercase())?;
        let idx = series.partition_point(|(ts, _)| *ts < at_ms);
        series.get(idx).map(|(_, close)| *close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_at_uses_first_bar_at_or_after() {
        let tape = PriceTape::new();
        tape.record("btc", 1_000, 100.0);
        tape.record("BTC", 2_000, 101.0);
        tape.record("BTC", 3_000, 102.0);

        assert_eq!(tape.price_at("BTC", 500), Some(100.0));
        assert_eq!(tape.price_at("BTC", 2_000), Some(101.0));
        assert_eq!(tape.price_at("BTC", 2_001), Some(102.0));
        assert_eq!(tape.price_at("BTC", 3_001), None);
        assert_eq!(tape.price_at("ETH", 0), None);
    }

    #[test]
    fn test_record_ignores_stale_timestamps() {
        let tape = PriceTape::new();
        tape.record("BTC", 2_000, 101.0);
        tape.record("BTC", 1_000, 99.0);
        assert_eq!(tape.len("BTC"), 1);
        assert_eq!(tape.latest("btc"), Some((2_000, 101.0)));
    }
}
