//! Sticky directional filter: suppress flip-flopping between directions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::StickyConfig;
use crate::types::{Direction, FilterDecision, FilterReason, Signal};

/// The last signal that was shown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShownSignal {
    pub signal_id: u64,
    pub direction: Direction,
    pub grade: u8,
    pub stars: u8,
}

#[derive(Debug, Clone, Default)]
pub struct StickyFilter {
    config: StickyConfig,
    last_shown: Option<ShownSignal>,
    counts: HashMap<FilterReason, u64>,
}

impl StickyFilter {
    pub fn new(config: StickyConfig) -> Self {
        Self {
            config,
            last_shown: None,
            counts: HashMap::new(),
        }
    }

    pub fn last_shown(&self) -> Option<&ShownSignal> {
        self.last_shown.as_ref()
    }

    /// Decide on a signal without changing any state.
    pub fn evaluate(&self, signal: &Signal) -> FilterDecision {
        let (shown, reason) = match &self.last_shown {
            None => (true, FilterReason::Baseline),
            Some(_) if !signal.direction.is_directional() => (false, FilterReason::Neutral),
            Some(last) if last.direction == signal.direction => {
                if signal.grade > last.grade || signal.stars > last.stars {
                    (true, FilterReason::Stronger)
                } else {
                    (false, FilterReason::SameDirectionWeaker)
                }
            }
            Some(_) => {
                if signal.grade >= self.config.flip_grade_min
                    || signal.stars >= self.config.flip_stars_min
                {
                    (true, FilterReason::HighConvictionFlip)
                } else {
                    (false, FilterReason::FlipLowConviction)
                }
            }
        };

        FilterDecision {
            signal_id: signal.id,
            shown,
            reason,
        }
    }

    /// Decide on a signal and, if shown, make it the new reference.
    pub fn apply(&mut self, signal: &Signal) -> FilterDecision {
        let decision = self.evaluate(signal);
        if decision.shown {
            self.last_shown = Some(ShownSignal {
                signal_id: signal.id,
                direction: signal.direction,
                grade: signal.grade,
                stars: signal.stars,
            });
        }
        *self.counts.entry(decision.reason).or_insert(0) += 1;
        decision
    }

    /// Decisions made so far for one reason.
    pub fn count(&self, reason: FilterReason) -> u64 {
        self.counts.get(&reason).copied().unwrap_or(0)
    }

    /// (shown, hidden) totals.
    pub fn totals(&self) -> (u64, u64) {
        self.counts
            .iter()
            .fold((0, 0), |(shown, hidden), (reason, n)| match reason {
                FilterReason::Baseline | FilterReason::Stronger | FilterReason::HighConvictionFlip => {
                    (shown + n, hidden)
                }
                _ => (shown, hidden + n),
            })
    }
}
