//! Wick rejection on a volume surge.

use crate::config::PatternConfig;
use crate::services::signals::BoosterDetector;
use crate::services::window::trailing_average_volume;
use crate::types::{Bar, Booster, BoosterKind, Direction};

/// Long wick against the bar, confirmed by volume.
///
/// A long upper wick means buyers were rejected (down); a long lower wick
/// means sellers were (up). When both wicks qualify the longer one wins.
pub struct Rejection {
    wick_body_ratio: f64,
    volume_surge_ratio: f64,
    volume_average_bars: usize,
    factor: f64,
}

impl Rejection {
    pub fn new(config: &PatternConfig) -> Self {
        Self {
            wick_body_ratio: config.wick_body_ratio,
            volume_surge_ratio: config.volume_surge_ratio,
            volume_average_bars: config.volume_average_bars,
            factor: config.factors.rejection,
        }
    }
}

impl BoosterDetector for Rejection {
    fn id(&self) -> &str {
        "rejection"
    }

    fn kind(&self) -> BoosterKind {
        BoosterKind::Rejection
    }

    fn min_periods(&self) -> usize {
        self.volume_average_bars + 1
    }

    fn detect(&self, bars: &[Bar]) -> Option<Booster> {
        if bars.len() < self.min_periods() {
            return None;
        }
        let bar = bars.last()?;
        let avg = trailing_average_volume(bars, self.volume_average_bars)?;
        if bar.volume < avg * self.volume_surge_ratio {
            return None;
        }

        let threshold = bar.body() * self.wick_body_ratio;
        let upper = bar.upper_wick();
        let lower = bar.lower_wick();
        let upper_ok = upper > threshold;
        let lower_ok = lower > threshold;

        let direction = match (upper_ok, lower_ok) {
            (true, true) if upper > lower => Direction::Down,
            (true, true) if lower > upper => Direction::Up,
            (true, false) => Direction::Down,
            (false, true) => Direction::Up,
            _ => return None,
        };
        Some(Booster::new(self.kind(), direction, self.factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_bars() -> Vec<Bar> {
        (0..5)
            .map(|i| Bar::new(i * 60_000, 100.0, 100.5, 99.5, 100.2, 100.0))
            .collect()
    }

    #[test]
    fn test_upper_wick_on_surge_is_bearish() {
        let detector = Rejection::new(&PatternConfig::default());
        let mut bars = quiet_bars();
        // body 0.2, upper wick 2.0
        bars.push(Bar::new(300_000, 100.0, 102.2, 99.9, 100.2, 200.0));
        let booster = detector.detect(&bars).unwrap();
        assert_eq!(booster.direction, Direction::Down);
        assert_eq!(booster.kind, BoosterKind::Rejection);
    }

    #[test]
    fn test_lower_wick_on_surge_is_bullish() {
        let detector = Rejection::new(&PatternConfig::default());
        let mut bars = quiet_bars();
        bars.push(Bar::new(300_000, 100.0, 100.3, 98.0, 100.2, 150.0));
        assert_eq!(detector.detect(&bars).unwrap().direction, Direction::Up);
    }

    #[test]
    fn test_no_rejection_without_volume() {
        let detector = Rejection::new(&PatternConfig::default());
        let mut bars = quiet_bars();
        bars.push(Bar::new(300_000, 100.0, 102.2, 99.9, 100.2, 140.0));
        assert!(detector.detect(&bars).is_none());
    }

    #[test]
    fn test_equal_wicks_cancel() {
        let detector = Rejection::new(&PatternConfig::default());
        let mut bars = quiet_bars();
        bars.push(Bar::new(300_000, 100.0, 101.2, 99.0, 100.2, 300.0));
        assert!(detector.detect(&bars).is_none());
    }
}
