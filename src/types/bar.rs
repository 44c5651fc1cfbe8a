use serde::{Deserialize, Serialize};

use crate::error::{Result, SignalError};

/// One price/volume bar.
///
/// `sequence` is assigned by the bar window when the bar is accepted; values
/// supplied by callers are overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Unix timestamp (milliseconds) of the bar open.
    pub timestamp: i64,
    #[serde(default)]
    pub sequence: u64,
}

impl Bar {
    /// Create a bar with an unassigned sequence index.
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            open,
            high,
            low,
            close,
            volume,
            timestamp,
            sequence: 0,
        }
    }

    /// Upper wick: high - max(open, close).
    pub fn upper_wick(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    /// Lower wick: min(open, close) - low.
    pub fn lower_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    /// Body size: |close - open|.
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// Check the bar's own fields. Timestamp ordering is checked by the window.
    pub fn validate(&self) -> Result<()> {
        let prices = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ];
        for (name, value) in prices {
            if !value.is_finite() {
                return Err(SignalError::MalformedBar(format!("{} is not finite", name)));
            }
            if value < 0.0 {
                return Err(SignalError::MalformedBar(format!(
                    "negative {}: {}",
                    name, value
                )));
            }
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(SignalError::MalformedBar(format!(
                "invalid volume: {}",
                self.volume
            )));
        }
        if self.high < self.open.max(self.close) {
            return Err(SignalError::MalformedBar(format!(
                "high {} below body top {}",
                self.high,
                self.open.max(self.close)
            )));
        }
        if self.low > self.open.min(self.close) {
            return Err(SignalError::MalformedBar(format!(
                "low {} above body bottom {}",
                self.low,
                self.open.min(self.close)
            )));
        }
        Ok(())
    }
}
