//! Liquidity sweep: a stop run through a level followed by a reversal.

use crate::config::PatternConfig;
use crate::services::signals::BoosterDetector;
use crate::types::{Bar, Booster, BoosterKind, Direction};

/// The previous bar pokes through the extreme of the bars before it but
/// closes back inside, and the newest bar reverses away from the level.
pub struct Sweep {
    window: usize,
    factor: f64,
}

impl Sweep {
    pub fn new(config: &PatternConfig) -> Self {
        Self {
            window: config.sweep_window,
            factor: config.factors.sweep,
        }
    }
}

impl BoosterDetector for Sweep {
    fn id(&self) -> &str {
        "sweep"
    }

    fn kind(&self) -> BoosterKind {
        BoosterKind::Sweep
    }

    fn min_periods(&self) -> usize {
        3
    }

    fn detect(&self, bars: &[Bar]) -> Option<Booster> {
        if bars.len() < self.min_periods() || self.window < 1 {
            return None;
        }
        let n = bars.len();
        let last = &bars[n - 1];
        let prev = &bars[n - 2];
        let before = &bars[(n - 2).saturating_sub(self.window)..n - 2];

        let low_level = before.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        let high_level = before.iter().map(|b| b.high).fold(f64::MIN, f64::max);

        let direction = if prev.low < low_level
            && prev.close > low_level
            && last.is_bullish()
            && last.close > prev.close
        {
            Direction::Up
        } else if prev.high > high_level
            && prev.close < high_level
            && last.is_bearish()
            && last.close < prev.close
        {
            Direction::Down
        } else {
            return None;
        };
        Some(Booster::new(self.kind(), direction, self.factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> Vec<Bar> {
        vec![
            Bar::new(0, 100.0, 101.0, 99.0, 100.5, 100.0),
            Bar::new(1, 100.5, 100.8, 99.2, 99.8, 100.0),
            Bar::new(2, 99.8, 100.9, 99.1, 100.2, 100.0),
        ]
    }

    #[test]
    fn test_bullish_sweep() {
        let detector = Sweep::new(&PatternConfig::default());
        let mut bars = range();
        // Wick below 99.0, close back above
        bars.push(Bar::new(3, 100.0, 100.1, 98.5, 99.4, 100.0));
        bars.push(Bar::new(4, 99.4, 100.6, 99.3, 100.4, 100.0));
        assert_eq!(detector.detect(&bars).unwrap().direction, Direction::Up);
    }

    #[test]
    fn test_bearish_sweep() {
        let detector = Sweep::new(&PatternConfig::default());
        let mut bars = range();
        bars.push(Bar::new(3, 100.2, 101.6, 100.0, 100.7, 100.0));
        bars.push(Bar::new(4, 100.7, 100.8, 99.5, 99.6, 100.0));
        assert_eq!(detector.detect(&bars).unwrap().direction, Direction::Down);
    }

    #[test]
    fn test_breakdown_is_not_sweep() {
        let detector = Sweep::new(&PatternConfig::default());
        let mut bars = range();
        // Closes below the level: a real break, not a sweep
        bars.push(Bar::new(3, 99.5, 99.6, 98.2, 98.4, 100.0));
        bars.push(Bar::new(4, 98.4, 98.9, 98.3, 98.8, 100.0));
        assert!(detector.detect(&bars).is_none());
    }
}
