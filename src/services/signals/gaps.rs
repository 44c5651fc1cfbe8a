//! Fair-value gap tracking and gap magnetism.

use tracing::debug;

use crate::config::GapConfig;
use crate::types::{Bar, Booster, BoosterKind, Direction, FairValueGap};

/// Unmitigated gaps on one side of a reference price.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct SideTotals {
    count: usize,
    size: f64,
}

/// Gap history for one symbol.
#[derive(Debug, Clone, Default)]
pub struct GapTracker {
    gaps: Vec<FairValueGap>,
    /// Gap formed by the most recent bar, if any.
    fresh: Option<FairValueGap>,
}

impl GapTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process the newest bar of `bars`: mitigate existing gaps, then record
    /// any gap the last three bars form.
    pub fn update(&mut self, bars: &[Bar], config: &GapConfig) -> Option<FairValueGap> {
        self.fresh = None;
        let last = *bars.last()?;

        for gap in self.gaps.iter_mut().filter(|g| !g.mitigated) {
            let filled = match gap.direction {
                Direction::Up => last.low <= gap.lower,
                Direction::Down => last.high >= gap.upper,
                Direction::Neutral => false,
            };
            if filled {
                gap.mitigated = true;
                debug!("Gap {:.4}-{:.4} mitigated at {}", gap.lower, gap.upper, last.sequence);
            }
        }

        let gap = detect_gap(bars, config)?;
        if self.gaps.iter().any(|g| g.index == gap.index) {
            return None;
        }
        self.gaps.push(gap);
        if self.gaps.len() > config.max_tracked_gaps {
            let excess = self.gaps.len() - config.max_tracked_gaps;
            self.gaps.drain(..excess);
        }
        self.fresh = Some(gap);
        Some(gap)
    }

    pub fn gaps(&self) -> &[FairValueGap] {
        &self.gaps
    }

    pub fn unmitigated(&self) -> impl Iterator<Item = &FairValueGap> {
        self.gaps.iter().filter(|g| !g.mitigated)
    }

    /// Displacement booster for a gap formed on the latest bar.
    pub fn fresh_booster(&self, config: &GapConfig) -> Option<Booster> {
        self.fresh
            .map(|gap| Booster::new(BoosterKind::FreshGap, gap.direction, config.fresh_gap_factor))
    }

    /// Multiplier from the balance of unmitigated gaps around `reference`.
    ///
    /// Gaps below the reference support an up move, gaps above support a
    /// down move. The result always lies within `magnetism_bounds`.
    pub fn magnetism(&self, reference: f64, direction: Direction, config: &GapConfig) -> f64 {
        let (lo, hi) = config.magnetism_bounds;
        let (below, above) = self.split(reference);
        let (supporting, opposing) = match direction {
            Direction::Up => (below, above),
            Direction::Down => (above, below),
            Direction::Neutral => return 1.0_f64.clamp(lo, hi),
        };

        let raw = if dominates(supporting, opposing, config) {
            config.favorable_multiplier
        } else if dominates(opposing, supporting, config) {
            config.unfavorable_multiplier
        } else {
            1.0
        };
        raw.clamp(lo, hi)
    }

    fn split(&self, reference: f64) -> (SideTotals, SideTotals) {
        let mut below = SideTotals::default();
        let mut above = SideTotals::default();
        for gap in self.unmitigated() {
            let side = if gap.midpoint() < reference {
                &mut below
            } else {
                &mut above
            };
            side.count += 1;
            side.size += gap.size();
        }
        (below, above)
    }
}

fn dominates(side: SideTotals, other: SideTotals, config: &GapConfig) -> bool {
    side.count >= config.min_supporting_gaps
        && other.count <= config.max_opposing_gaps
        && side.size > config.size_ratio * other.size
}

/// Gap formed by the last three bars, if any.
///
/// The middle bar must span the whole gap, touching both the first bar and
/// the third. A middle bar that is itself gapped away from either neighbour
/// leaves no fair-value gap.
pub fn detect_gap(bars: &[Bar], config: &GapConfig) -> Option<FairValueGap> {
    if bars.len() < 3 {
        return None;
    }
    let first = &bars[bars.len() - 3];
    let middle = &bars[bars.len() - 2];
    let third = &bars[bars.len() - 1];

    let (lower, upper, direction) = if third.low > first.high {
        (first.high, third.low, Direction::Up)
    } else if third.high < first.low {
        (third.high, first.low, Direction::Down)
    } else {
        return None;
    };

    if middle.low > lower || middle.high < upper {
        return None;
    }

    if third.close <= 0.0 || (upper - lower) / third.close * 100.0 < config.min_gap_pct {
        return None;
    }

    Some(FairValueGap {
        upper,
        lower,
        index: third.sequence,
        direction,
        mitigated: false,
    })
}
