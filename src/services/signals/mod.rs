//! Signal pipeline: structure, gaps, pattern boosters, scoring, the sticky
//! filter, confidence and forward evaluation.

pub mod accuracy;
pub mod confidence;
pub mod context;
pub mod detectors;
pub mod engine;
pub mod evaluation;
pub mod gaps;
pub mod scorer;
pub mod sticky;
pub mod structure;

pub use confidence::ConfidenceEngine;
pub use context::{IngestStatus, PipelineOutput, SymbolContext};
pub use engine::SignalEngine;
pub use evaluation::EvaluationHarness;
pub use gaps::GapTracker;
pub use sticky::StickyFilter;
pub use structure::StructureDetector;

use crate::types::{Bar, Booster, BoosterKind};

/// A pattern detector that contributes a directional booster.
pub trait BoosterDetector: Send + Sync {
    /// Unique identifier for this detector.
    fn id(&self) -> &str;

    /// Booster kind this detector produces.
    fn kind(&self) -> BoosterKind;

    /// Minimum number of bars required.
    fn min_periods(&self) -> usize;

    /// Inspect the newest bar in context of the window.
    /// Returns None when the pattern is absent or there are too few bars.
    fn detect(&self, bars: &[Bar]) -> Option<Booster>;
}

/// Source of forward prices for evaluation checkpoints.
pub trait PriceLookup: Send + Sync {
    /// Price for `symbol` at `at_ms`, or `None` if not yet known.
    fn price_at(&self, symbol: &str, at_ms: i64) -> Option<f64>;
}
