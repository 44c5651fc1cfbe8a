use serde::{Deserialize, Serialize};

use super::{Direction, StructureKind};

/// Named pattern adjustments consumed by the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoosterKind {
    Rejection,
    Continuation,
    Absorption,
    BreakRetest,
    Sweep,
    FreshGap,
}

impl BoosterKind {
    /// Get display name for this booster.
    pub fn name(&self) -> &'static str {
        match self {
            BoosterKind::Rejection => "rejection",
            BoosterKind::Continuation => "continuation",
            BoosterKind::Absorption => "absorption",
            BoosterKind::BreakRetest => "break_retest",
            BoosterKind::Sweep => "sweep",
            BoosterKind::FreshGap => "fresh_gap",
        }
    }
}

/// A directional multiplicative adjustment from one detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booster {
    pub kind: BoosterKind,
    pub direction: Direction,
    pub factor: f64,
}

impl Booster {
    pub fn new(kind: BoosterKind, direction: Direction, factor: f64) -> Self {
        Self {
            kind,
            direction,
            factor,
        }
    }
}

/// How a signal's composite score was assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentBreakdown {
    /// Structure event that fired on this bar, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure_event: Option<StructureKind>,
    /// Direction of the structure contribution (event or carried trend).
    pub structure_direction: Direction,
    pub structure_score: f64,
    /// Boosters after clamping to the configured bounds.
    pub boosters: Vec<Booster>,
    pub bullish: f64,
    pub bearish: f64,
    /// bullish - bearish.
    pub net: f64,
    pub magnetism: f64,
}

/// A scored classification for one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    /// Per-symbol sequence number, starting at 1.
    pub id: u64,
    pub symbol: String,
    pub direction: Direction,
    /// Star rating, 0-4.
    pub stars: u8,
    /// Grade, 1-10.
    pub grade: u8,
    pub composite_score: f64,
    /// Close of the bar the signal was computed on.
    pub price: f64,
    /// Unix timestamp (milliseconds) of that bar.
    pub timestamp: i64,
    /// Sequence index of that bar.
    pub index: u64,
    pub components: ComponentBreakdown,
}

/// Why the sticky filter showed or hid a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterReason {
    Baseline,
    Stronger,
    HighConvictionFlip,
    SameDirectionWeaker,
    FlipLowConviction,
    Neutral,
}

impl FilterReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterReason::Baseline => "baseline",
            FilterReason::Stronger => "stronger",
            FilterReason::HighConvictionFlip => "high-conviction-flip",
            FilterReason::SameDirectionWeaker => "same-direction-weaker",
            FilterReason::FlipLowConviction => "flip-low-conviction",
            FilterReason::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for FilterReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDecision {
    pub signal_id: u64,
    pub shown: bool,
    pub reason: FilterReason,
}
