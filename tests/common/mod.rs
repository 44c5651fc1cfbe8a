//! Shared bar fixtures for integration tests.
#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sigil::types::Bar;

pub const MINUTE: i64 = 60_000;

fn bar(i: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Bar {
    Bar::new(i * MINUTE, open, high, low, close, volume)
}

/// Ten bars: a swing high at 103, a pullback, two green bars on rising
/// volume and a gap-up close through the swing high.
pub fn breakout_bars() -> Vec<Bar> {
    vec![
        bar(0, 100.0, 100.6, 99.8, 100.4, 100.0),
        bar(1, 100.4, 101.2, 100.2, 101.0, 100.0),
        bar(2, 101.0, 101.8, 100.8, 101.6, 100.0),
        bar(3, 101.6, 103.0, 101.4, 101.9, 100.0),
        bar(4, 101.9, 102.2, 100.9, 101.1, 100.0),
        bar(5, 101.1, 101.3, 100.4, 100.6, 100.0),
        bar(6, 100.6, 101.0, 100.3, 100.8, 100.0),
        bar(7, 100.8, 101.9, 100.7, 101.8, 160.0),
        bar(8, 101.8, 103.2, 101.7, 102.7, 260.0),
        bar(9, 103.2, 104.6, 103.1, 104.5, 420.0),
    ]
}

/// Bars oscillating inside a fixed 99.7-100.5 range on flat volume.
pub fn ranging_bars(count: usize) -> Vec<Bar> {
    (0..count as i64)
        .map(|i| {
            if i % 2 == 0 {
                bar(i, 100.0, 100.5, 99.7, 100.2, 100.0)
            } else {
                bar(i, 100.2, 100.5, 99.7, 100.0, 100.0)
            }
        })
        .collect()
}

/// Seeded random walk with volume bursts.
pub fn random_walk(seed: u64, count: usize) -> Vec<Bar> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut price = 100.0;
    (0..count as i64)
        .map(|i| {
            let open: f64 = price;
            let close = open * (1.0 + rng.gen_range(-0.01..0.01));
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.004));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.004));
            let burst = if rng.gen_bool(0.15) { 2.5 } else { 1.0 };
            let volume = rng.gen_range(80.0..120.0) * burst;
            price = close;
            bar(i, open, high, low, close, volume)
        })
        .collect()
}
