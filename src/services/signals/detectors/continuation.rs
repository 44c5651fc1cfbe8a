//! Same-direction bars on rising volume.

use crate::config::PatternConfig;
use crate::services::signals::BoosterDetector;
use crate::types::{Bar, Booster, BoosterKind, Direction};

pub struct Continuation {
    bars: usize,
    factor: f64,
}

impl Continuation {
    pub fn new(config: &PatternConfig) -> Self {
        Self {
            bars: config.continuation_bars,
            factor: config.factors.continuation,
        }
    }
}

impl BoosterDetector for Continuation {
    fn id(&self) -> &str {
        "continuation"
    }

    fn kind(&self) -> BoosterKind {
        BoosterKind::Continuation
    }

    fn min_periods(&self) -> usize {
        self.bars
    }

    fn detect(&self, bars: &[Bar]) -> Option<Booster> {
        if self.bars == 0 || bars.len() < self.min_periods() {
            return None;
        }
        let recent = &bars[bars.len() - self.bars..];

        let rising_volume = recent.windows(2).all(|w| w[1].volume > w[0].volume);
        if !rising_volume {
            return None;
        }

        let direction = if recent.iter().all(Bar::is_bullish) {
            Direction::Up
        } else if recent.iter().all(Bar::is_bearish) {
            Direction::Down
        } else {
            return None;
        };
        Some(Booster::new(self.kind(), direction, self.factor))
    }
}
