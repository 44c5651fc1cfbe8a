//! Time sources for the evaluation scheduler.

use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of "now" in Unix milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock driven by the caller, used for replays and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    /// Move forward by `delta_ms`, returning the new time.
    pub fn advance(&self, delta_ms: i64) -> i64 {
        self.now.fetch_add(delta_ms, Ordering::SeqCst) + delta_ms
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Clock that follows the bars the pipeline has actually processed.
///
/// Now is the oldest of the per-symbol latest processed timestamps, so a
/// checkpoint only comes due once every symbol's price tape has reached it.
/// Time never moves backwards.
#[derive(Debug)]
pub struct WatermarkClock {
    latest: DashMap<String, i64>,
    now: AtomicI64,
}

impl WatermarkClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            latest: DashMap::new(),
            now: AtomicI64::new(start_ms),
        }
    }

    /// Note that `symbol` has processed a bar stamped `timestamp`. Returns
    /// the resulting time.
    pub fn observe(&self, symbol: &str, timestamp: i64) -> i64 {
        self.latest
            .entry(symbol.to_uppercase())
            .and_modify(|ts| *ts = (*ts).max(timestamp))
            .or_insert(timestamp);
        let watermark = self.latest.iter().map(|e| *e.value()).min().unwrap_or(timestamp);
        let previous = self.now.fetch_max(watermark, Ordering::SeqCst);
        previous.max(watermark)
    }
}

impl Clock for WatermarkClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
