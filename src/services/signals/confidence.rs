//! Per-symbol confidence from five independent trackers.

use std::collections::VecDeque;

use crate::config::ConfidenceConfig;
use crate::services::window::average_volume;
use crate::types::{
    Bar, ConfidenceComponents, ConfidenceLabel, ConfidenceState, Direction, StructureEvent,
    StructureKind, SwingKind, SwingPoint,
};

/// Inputs for one confidence update.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceInput<'a> {
    pub bars: &'a [Bar],
    pub swings: &'a [SwingPoint],
    /// Structure events so far, oldest first.
    pub events: &'a [StructureEvent],
    pub direction: Direction,
}

pub struct ConfidenceEngine {
    config: ConfidenceConfig,
    /// Decisive outcomes, oldest first. `true` = correct.
    outcomes: VecDeque<bool>,
    state: ConfidenceState,
}

impl ConfidenceEngine {
    pub fn new(config: ConfidenceConfig) -> Self {
        let components = ConfidenceComponents::default();
        let state = compose(components, &config);
        Self {
            config,
            outcomes: VecDeque::new(),
            state,
        }
    }

    pub fn state(&self) -> ConfidenceState {
        self.state
    }

    /// Feed back a decisive evaluation outcome.
    pub fn record_outcome(&mut self, correct: bool) {
        self.outcomes.push_back(correct);
        while self.outcomes.len() > self.config.accuracy_window {
            self.outcomes.pop_front();
        }
        let mut components = self.state.components;
        components.recent_accuracy = self.recent_accuracy();
        self.state = compose(components, &self.config);
    }

    /// Recompute every bar-driven tracker.
    pub fn update(&mut self, input: ConfidenceInput<'_>) -> ConfidenceState {
        let components = ConfidenceComponents {
            recent_accuracy: self.recent_accuracy(),
            pattern: self.pattern_score(input.swings, input.direction),
            structure_rhythm: self.rhythm_score(input.events, input.direction),
            move_magnitude: self.magnitude_score(input.bars, input.direction),
            volume_trend: self.volume_score(input.bars),
        };
        self.state = compose(components, &self.config);
        self.state
    }

    fn recent_accuracy(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.5;
        }
        let correct = self.outcomes.iter().filter(|c| **c).count();
        correct as f64 / self.outcomes.len() as f64
    }

    fn pattern_score(&self, swings: &[SwingPoint], direction: Direction) -> f64 {
        let sideways = self.config.pattern_sideways_score;
        if !direction.is_directional() {
            return sideways;
        }
        let highs = last_three(swings, SwingKind::High);
        let lows = last_three(swings, SwingKind::Low);
        let (highs, lows) = match (highs, lows) {
            (Some(h), Some(l)) => (h, l),
            _ => return sideways,
        };

        let rising = ascending(&highs) && ascending(&lows);
        let falling = descending(&highs) && descending(&lows);
        let structure = if rising {
            Direction::Up
        } else if falling {
            Direction::Down
        } else {
            return sideways;
        };

        if structure == direction {
            self.config.pattern_aligned_score
        } else {
            self.config.pattern_contradicts_score
        }
    }

    fn rhythm_score(&self, events: &[StructureEvent], direction: Direction) -> f64 {
        if !direction.is_directional() {
            return 0.5;
        }
        let recent: Vec<&StructureEvent> = events
            .iter()
            .rev()
            .filter(|e| e.kind == StructureKind::BreakOfStructure)
            .take(self.config.rhythm_window)
            .collect();
        if recent.is_empty() {
            return 0.5;
        }
        let aligned = recent.iter().filter(|e| e.direction == direction).count();
        aligned as f64 / recent.len() as f64
    }

    fn magnitude_score(&self, bars: &[Bar], direction: Direction) -> f64 {
        if !direction.is_directional() || bars.len() < 2 {
            return 0.5;
        }
        let start = bars.len().saturating_sub(self.config.magnitude_window + 1);
        let sign = direction.sign();
        let (mut favorable, mut opposite) = (Vec::new(), Vec::new());
        for w in bars[start..].windows(2) {
            let signed = (w[1].close - w[0].close) * sign;
            if signed > 0.0 {
                favorable.push(signed);
            } else if signed < 0.0 {
                opposite.push(-signed);
            }
        }

        let ratio = match (mean(&favorable), mean(&opposite)) {
            (None, None) => return 0.5,
            (Some(_), None) => self.config.max_move_ratio,
            (None, Some(_)) => 0.0,
            (Some(f), Some(o)) => (f / o).min(self.config.max_move_ratio),
        };
        (0.5 + (ratio - 1.0) * self.config.move_ratio_slope).clamp(0.0, 1.0)
    }

    fn volume_score(&self, bars: &[Bar]) -> f64 {
        let n = self.config.volume_window;
        if bars.len() < n * 2 {
            return 0.5;
        }
        let recent = average_volume(&bars[bars.len() - n..]);
        let previous = average_volume(&bars[bars.len() - 2 * n..bars.len() - n]);
        let ratio = match (recent, previous) {
            (Some(r), Some(p)) if p > 0.0 => r / p,
            _ => return 0.5,
        };
        if ratio >= self.config.volume_high_ratio {
            self.config.volume_high_score
        } else if ratio <= self.config.volume_low_ratio {
            self.config.volume_low_score
        } else {
            0.5
        }
    }
}

fn compose(components: ConfidenceComponents, config: &ConfidenceConfig) -> ConfidenceState {
    let w = &config.weights;
    let composite = (components.recent_accuracy * w.recent_accuracy
        + components.pattern * w.pattern
        + components.structure_rhythm * w.structure_rhythm
        + components.move_magnitude * w.move_magnitude
        + components.volume_trend * w.volume_trend)
        .clamp(0.0, 1.0);
    ConfidenceState {
        components,
        composite,
        label: ConfidenceLabel::from_score(composite, &config.bands),
    }
}

fn last_three(swings: &[SwingPoint], kind: SwingKind) -> Option<[f64; 3]> {
    let mut prices = swings.iter().rev().filter(|s| s.kind == kind).map(|s| s.price);
    let c = prices.next()?;
    let b = prices.next()?;
    let a = prices.next()?;
    Some([a, b, c])
}

fn ascending(p: &[f64; 3]) -> bool {
    p[0] < p[1] && p[1] < p[2]
}

fn descending(p: &[f64; 3]) -> bool {
    p[0] > p[1] && p[1] > p[2]
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
