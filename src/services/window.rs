//! Bounded per-symbol bar buffer.

use std::collections::VecDeque;

use crate::error::{Result, SignalError};
use crate::types::Bar;

/// The most recent bars for one symbol, oldest first.
#[derive(Debug, Clone)]
pub struct BarWindow {
    // Kept contiguous after every push so `bars()` can hand out one slice.
    bars: VecDeque<Bar>,
    capacity: usize,
    next_sequence: u64,
}

impl BarWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            bars: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            next_sequence: 0,
        }
    }

    /// Validate and append a bar, evicting the oldest on overflow.
    ///
    /// A rejected bar leaves the window untouched, including the sequence
    /// counter.
    pub fn push(&mut self, bar: Bar) -> Result<Bar> {
        bar.validate()?;
        if let Some(last) = self.bars.back() {
            if bar.timestamp <= last.timestamp {
                return Err(SignalError::MalformedBar(format!(
                    "timestamp {} not after previous {}",
                    bar.timestamp, last.timestamp
                )));
            }
        }

        let mut accepted = bar;
        accepted.sequence = self.next_sequence;
        self.next_sequence += 1;

        self.bars.push_back(accepted);
        while self.bars.len() > self.capacity {
            self.bars.pop_front();
        }
        self.bars.make_contiguous();

        Ok(accepted)
    }

    /// All retained bars, oldest first.
    pub fn bars(&self) -> &[Bar] {
        self.bars.as_slices().0
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.back()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total bars ever accepted.
    pub fn accepted(&self) -> u64 {
        self.next_sequence
    }

    /// Error unless at least `need` bars are present.
    pub fn require(&self, need: usize) -> Result<&[Bar]> {
        if self.bars.len() < need {
            return Err(SignalError::InsufficientData {
                have: self.bars.len(),
                need,
            });
        }
        Ok(self.bars())
    }
}

/// Average volume of `bars`, or `None` when empty.
pub fn average_volume(bars: &[Bar]) -> Option<f64> {
    if bars.is_empty() {
        return None;
    }
    Some(bars.iter().map(|b| b.volume).sum::<f64>() / bars.len() as f64)
}

/// Average volume of the `count` bars preceding the last one.
pub fn trailing_average_volume(bars: &[Bar], count: usize) -> Option<f64> {
    if bars.len() < 2 || count == 0 {
        return None;
    }
    let end = bars.len() - 1;
    let start = end.saturating_sub(count);
    average_volume(&bars[start..end])
}

/// Simple average of true ranges over the window.
pub fn average_true_range(bars: &[Bar]) -> Option<f64> {
    if bars.len() < 2 {
        return None;
    }
    let sum: f64 = bars
        .windows(2)
        .map(|w| w[1].true_range(w[0].close))
        .sum();
    Some(sum / (bars.len() - 1) as f64)
}
