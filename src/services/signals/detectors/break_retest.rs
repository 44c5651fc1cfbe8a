//! Break of a recent extreme, retest, then continuation.

use crate::config::PatternConfig;
use crate::services::signals::BoosterDetector;
use crate::types::{Bar, Booster, BoosterKind, Direction};

pub struct BreakRetest {
    window: usize,
    tolerance: f64,
    factor: f64,
}

impl BreakRetest {
    pub fn new(config: &PatternConfig) -> Self {
        Self {
            window: config.retest_window,
            tolerance: config.level_tolerance_pct / 100.0,
            factor: config.factors.break_retest,
        }
    }

    fn bullish(&self, recent: &[Bar]) -> bool {
        let last = &recent[recent.len() - 1];
        if !last.is_bullish() {
            return false;
        }
        // Breakout candidates leave room for a retest and the newest bar
        for k in 1..recent.len() - 2 {
            let level = recent[..k].iter().map(|b| b.high).fold(f64::MIN, f64::max);
            if recent[k].close <= level {
                continue;
            }
            let retested = recent[k + 1..recent.len() - 1].iter().any(|r| {
                r.low <= level * (1.0 + self.tolerance)
                    && r.close > level
                    && last.close > r.close
            });
            if retested {
                return true;
            }
        }
        false
    }

    fn bearish(&self, recent: &[Bar]) -> bool {
        let last = &recent[recent.len() - 1];
        if !last.is_bearish() {
            return false;
        }
        for k in 1..recent.len() - 2 {
            let level = recent[..k].iter().map(|b| b.low).fold(f64::MAX, f64::min);
            if recent[k].close >= level {
                continue;
            }
            let retested = recent[k + 1..recent.len() - 1].iter().any(|r| {
                r.high >= level * (1.0 - self.tolerance)
                    && r.close < level
                    && last.close < r.close
            });
            if retested {
                return true;
            }
        }
        false
    }
}

impl BoosterDetector for BreakRetest {
    fn id(&self) -> &str {
        "break_retest"
    }

    fn kind(&self) -> BoosterKind {
        BoosterKind::BreakRetest
    }

    fn min_periods(&self) -> usize {
        4
    }

    fn detect(&self, bars: &[Bar]) -> Option<Booster> {
        if bars.len() < self.min_periods() || self.window < self.min_periods() {
            return None;
        }
        let recent = &bars[bars.len().saturating_sub(self.window)..];

        let direction = if self.bullish(recent) {
            Direction::Up
        } else if self.bearish(recent) {
            Direction::Down
        } else {
            return None;
        };
        Some(Booster::new(self.kind(), direction, self.factor))
    }
}
