//! Swing points and Break of Structure / Change of Character detection.

use tracing::debug;

use crate::config::{StructureConfig, WindowConfig};
use crate::error::{Result, SignalError};
use crate::services::window::average_true_range;
use crate::types::{Bar, Direction, StructureEvent, StructureKind, SwingKind, SwingPoint};

/// What the detector saw on one bar.
#[derive(Debug, Clone, Default)]
pub struct StructureReading {
    /// Confirmed swings in the window, oldest first.
    pub swings: Vec<SwingPoint>,
    /// Lookback used for this bar.
    pub lookback: usize,
    pub event: Option<StructureEvent>,
    /// Trend after this bar.
    pub trend: Direction,
}

/// Pick the swing lookback from the window's volatility.
///
/// ATR is measured as a percentage of the average close. Quiet windows use a
/// short lookback and volatile ones a long lookback.
pub fn adaptive_lookback(bars: &[Bar], config: &StructureConfig) -> usize {
    let bounds = config.swing_lookback;
    let atr = match average_true_range(bars) {
        Some(atr) => atr,
        None => return bounds.base,
    };
    let avg_close = bars.iter().map(|b| b.close).sum::<f64>() / bars.len() as f64;
    if avg_close <= 0.0 {
        return bounds.base;
    }

    let atr_pct = atr / avg_close * 100.0;
    if atr_pct >= config.high_volatility_atr_pct {
        bounds.max
    } else if atr_pct <= config.low_volatility_atr_pct {
        bounds.min
    } else {
        bounds.base
    }
}

/// Confirmed swing highs and lows, oldest first.
///
/// A swing high needs a high strictly above every high within `lookback`
/// bars on both sides. Bars too close to either edge of the window are never
/// swings.
pub fn find_swings(bars: &[Bar], lookback: usize) -> Vec<SwingPoint> {
    let mut swings = Vec::new();
    if lookback == 0 || bars.len() < lookback * 2 + 1 {
        return swings;
    }

    for i in lookback..bars.len() - lookback {
        let neighbours = bars[i - lookback..=i + lookback]
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != lookback)
            .map(|(_, b)| b);

        let bar = &bars[i];
        let (mut is_high, mut is_low) = (true, true);
        for other in neighbours {
            if other.high >= bar.high {
                is_high = false;
            }
            if other.low <= bar.low {
                is_low = false;
            }
        }

        if is_high {
            swings.push(SwingPoint {
                price: bar.high,
                index: bar.sequence,
                kind: SwingKind::High,
            });
        }
        if is_low {
            swings.push(SwingPoint {
                price: bar.low,
                index: bar.sequence,
                kind: SwingKind::Low,
            });
        }
    }

    swings
}

/// Most recent swing of `kind`.
pub fn latest_swing(swings: &[SwingPoint], kind: SwingKind) -> Option<&SwingPoint> {
    swings.iter().rev().find(|s| s.kind == kind)
}

/// Stateful structure tracker for one symbol.
#[derive(Debug, Clone, Default)]
pub struct StructureDetector {
    trend: Direction,
    /// Highest sequence index of a broken swing high. Swings at or before it
    /// never fire again, even if a wider lookback brings them back.
    broken_high: Option<u64>,
    broken_low: Option<u64>,
}

impl StructureDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Established trend, `Neutral` until the first event.
    pub fn trend(&self) -> Direction {
        self.trend
    }

    /// Evaluate the newest bar of `bars`.
    pub fn detect(
        &mut self,
        bars: &[Bar],
        window: &WindowConfig,
        config: &StructureConfig,
    ) -> Result<StructureReading> {
        if bars.len() < window.min_lookback {
            return Err(SignalError::InsufficientData {
                have: bars.len(),
                need: window.min_lookback,
            });
        }
        let last = match bars.last() {
            Some(bar) => *bar,
            None => {
                return Err(SignalError::InsufficientData {
                    have: 0,
                    need: window.min_lookback,
                })
            }
        };

        let lookback = adaptive_lookback(bars, config);
        let swings = find_swings(bars, lookback);

        let event = self
            .check_high(&swings, &last)
            .or_else(|| self.check_low(&swings, &last));

        if let Some(event) = &event {
            debug!(
                "{} {} at {} (close {} vs swing {})",
                event.kind.label(),
                event.direction.label(),
                event.index,
                last.close,
                event.price
            );
            self.trend = event.direction;
        }

        Ok(StructureReading {
            swings,
            lookback,
            event,
            trend: self.trend,
        })
    }

    fn check_high(&mut self, swings: &[SwingPoint], last: &Bar) -> Option<StructureEvent> {
        let swing = latest_swing(swings, SwingKind::High)?;
        if already_broken(self.broken_high, swing) || last.close <= swing.price {
            return None;
        }
        self.broken_high = Some(swing.index);
        let kind = if self.trend == Direction::Down {
            StructureKind::ChangeOfCharacter
        } else {
            StructureKind::BreakOfStructure
        };
        Some(StructureEvent {
            kind,
            direction: Direction::Up,
            price: swing.price,
            index: last.sequence,
            timestamp: last.timestamp,
        })
    }

    fn check_low(&mut self, swings: &[SwingPoint], last: &Bar) -> Option<StructureEvent> {
        let swing = latest_swing(swings, SwingKind::Low)?;
        if already_broken(self.broken_low, swing) || last.close >= swing.price {
            return None;
        }
        self.broken_low = Some(swing.index);
        let kind = if self.trend == Direction::Up {
            StructureKind::ChangeOfCharacter
        } else {
            StructureKind::BreakOfStructure
        };
        Some(StructureEvent {
            kind,
            direction: Direction::Down,
            price: swing.price,
            index: last.sequence,
            timestamp: last.timestamp,
        })
    }
}

fn already_broken(broken: Option<u64>, swing: &SwingPoint) -> bool {
    broken.map_or(false, |index| swing.index <= index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars_from(highs_lows_closes: &[(f64, f64, f64)]) -> Vec<Bar> {
        highs_lows_closes
            .iter()
            .enumerate()
            .map(|(i, &(h, l, c))| {
                let mut bar = Bar::new(i as i64 * 60_000, c, h, l, c, 100.0);
                bar.sequence = i as u64;
                bar
            })
            .collect()
    }

    #[test]
    fn test_find_swings_requires_strict_extremes() {
        let bars = bars_from(&[
            (101.0, 99.0, 100.0),
            (102.0, 100.0, 101.0),
            (105.0, 101.0, 104.0),
            (103.0, 100.5, 101.0),
            (102.5, 98.0, 99.0),
            (103.0, 99.5, 102.0),
            (104.0, 100.0, 103.0),
        ]);
        let swings = find_swings(&bars, 2);
        assert_eq!(swings.len(), 2);
        assert_eq!(swings[0].kind, SwingKind::High);
        assert_eq!(swings[0].index, 2);
        assert_eq!(swings[1].kind, SwingKind::Low);
        assert_eq!(swings[1].index, 4);

        // A tie with a neighbour is not a swing
        let flat = bars_from(&[(101.0, 99.0, 100.0); 7]);
        assert!(find_swings(&flat, 2).is_empty());
    }

    #[test]
    fn test_adaptive_lookback_tracks_volatility() {
        let config = StructureConfig::default();
        let quiet = bars_from(&[(100.01, 99.99, 100.0); 10]);
        assert_eq!(adaptive_lookback(&quiet, &config), config.swing_lookback.min);

        let normal = bars_from(&[(101.0, 99.0, 100.0); 10]);
        assert_eq!(adaptive_lookback(&normal, &config), config.swing_lookback.base);

        let wild = bars_from(&[(110.0, 90.0, 100.0); 10]);
        assert_eq!(adaptive_lookback(&wild, &config), config.swing_lookback.max);
    }

    #[test]
    fn test_insufficient_data() {
        let mut detector = StructureDetector::new();
        let bars = bars_from(&[(101.0, 99.0, 100.0); 3]);
        let err = detector
            .detect(&bars, &WindowConfig::default(), &StructureConfig::default())
            .unwrap_err();
        assert!(err.is_no_signal());
    }

    #[test]
    fn test_bos_then_choch() {
        let window = WindowConfig::default();
        let config = StructureConfig::default();
        let mut detector = StructureDetector::new();

        let mut rows = vec![
            (101.0, 99.0, 100.0),
            (102.0, 100.0, 101.0),
            (105.0, 101.0, 104.0),
            (103.0, 100.5, 101.0),
            (102.5, 98.0, 99.0),
            (103.0, 99.5, 102.0),
            (104.0, 100.0, 103.0),
        ];
        let mut events = Vec::new();
        for n in 5..=rows.len() {
            let reading = detector.detect(&bars_from(&rows[..n]), &window, &config).unwrap();
            events.extend(reading.event);
        }
        assert!(events.is_empty());

        // Close above the 105 swing high with no trend yet: BoS up
        rows.push((106.5, 103.0, 106.0));
        let reading = detector.detect(&bars_from(&rows), &window, &config).unwrap();
        let event = reading.event.unwrap();
        assert_eq!(event.kind, StructureKind::BreakOfStructure);
        assert_eq!(event.direction, Direction::Up);
        assert_eq!(event.price, 105.0);
        assert_eq!(detector.trend(), Direction::Up);

        // The same swing never fires twice
        rows.push((107.0, 104.0, 106.5));
        let reading = detector.detect(&bars_from(&rows), &window, &config).unwrap();
        assert!(reading.event.is_none());

        // Close below the 98 swing low against the up trend: CHoCH down
        rows.push((106.0, 96.0, 97.0));
        let reading = detector.detect(&bars_from(&rows), &window, &config).unwrap();
        let event = reading.event.unwrap();
        assert_eq!(event.kind, StructureKind::ChangeOfCharacter);
        assert_eq!(event.direction, Direction::Down);
        assert_eq!(reading.trend, Direction::Down);
    }

    fn fixed_lookback(lookback: usize) -> StructureConfig {
        let mut config = StructureConfig::default();
        config.swing_lookback.min = lookback;
        config.swing_lookback.base = lookback;
        config.swing_lookback.max = lookback;
        config
    }

    #[test]
    fn test_wider_lookback_does_not_refire_old_swing() {
        let window = WindowConfig::default();
        let narrow = fixed_lookback(2);
        let wide = fixed_lookback(3);
        let mut detector = StructureDetector::new();

        let mut rows = vec![
            (100.0, 98.0, 99.0),
            (100.5, 98.5, 99.5),
            (101.0, 99.0, 100.0),
            (105.0, 100.0, 104.0),
            (103.0, 99.5, 101.0),
            (102.0, 99.0, 100.0),
            (102.5, 99.2, 101.0),
            (104.0, 100.0, 103.5),
            // Breaks the 105 swing high
            (106.5, 103.0, 106.0),
            (108.0, 105.0, 107.0),
            (107.0, 104.0, 105.0),
            (106.5, 103.5, 104.0),
            // Breaks the 108 swing high
            (108.5, 104.5, 108.2),
        ];
        let mut fired = Vec::new();
        for n in 5..=rows.len() {
            let reading = detector.detect(&bars_from(&rows[..n]), &window, &narrow).unwrap();
            fired.extend(reading.event.map(|e| (e.index, e.price)));
        }
        assert_eq!(fired, vec![(8, 105.0), (12, 108.0)]);

        // With lookback 3 the 108 swing is gone and 105 is the latest high again
        rows.push((108.8, 107.5, 108.0));
        let reading = detector.detect(&bars_from(&rows), &window, &wide).unwrap();
        assert_eq!(reading.lookback, 3);
        let latest = latest_swing(&reading.swings, SwingKind::High).unwrap();
        assert_eq!(latest.price, 105.0);
        assert!(reading.event.is_none());
    }
}
