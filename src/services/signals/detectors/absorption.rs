//! Repeated tests of a window extreme on fading volume.

use crate::config::PatternConfig;
use crate::services::signals::BoosterDetector;
use crate::types::{Bar, Booster, BoosterKind, Direction};

/// The extreme keeps getting tested but each test brings less volume, so the
/// level is holding. Tests of the high point down, tests of the low point up.
pub struct Absorption {
    window: usize,
    min_tests: usize,
    tolerance: f64,
    factor: f64,
}

impl Absorption {
    pub fn new(config: &PatternConfig) -> Self {
        Self {
            window: config.absorption_window,
            min_tests: config.absorption_min_tests,
            tolerance: config.level_tolerance_pct / 100.0,
            factor: config.factors.absorption,
        }
    }

    fn fading(volumes: &[f64], min_tests: usize) -> bool {
        volumes.len() >= min_tests && volumes.windows(2).all(|w| w[1] < w[0])
    }
}

impl BoosterDetector for Absorption {
    fn id(&self) -> &str {
        "absorption"
    }

    fn kind(&self) -> BoosterKind {
        BoosterKind::Absorption
    }

    fn min_periods(&self) -> usize {
        self.min_tests.max(2)
    }

    fn detect(&self, bars: &[Bar]) -> Option<Booster> {
        if bars.len() < self.min_periods() || self.min_tests == 0 {
            return None;
        }
        let recent = &bars[bars.len().saturating_sub(self.window)..];

        let high = recent.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let low = recent.iter().map(|b| b.low).fold(f64::MAX, f64::min);

        let high_tests: Vec<f64> = recent
            .iter()
            .filter(|b| b.high >= high * (1.0 - self.tolerance))
            .map(|b| b.volume)
            .collect();
        if Self::fading(&high_tests, self.min_tests) {
            return Some(Booster::new(self.kind(), Direction::Down, self.factor));
        }

        let low_tests: Vec<f64> = recent
            .iter()
            .filter(|b| b.low <= low * (1.0 + self.tolerance))
            .map(|b| b.volume)
            .collect();
        if Self::fading(&low_tests, self.min_tests) {
            return Some(Booster::new(self.kind(), Direction::Up, self.factor));
        }

        None
    }
}
