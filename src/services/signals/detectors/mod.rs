//! Pattern booster detectors.

pub mod absorption;
pub mod break_retest;
pub mod continuation;
pub mod rejection;
pub mod sweep;

pub use absorption::Absorption;
pub use break_retest::BreakRetest;
pub use continuation::Continuation;
pub use rejection::Rejection;
pub use sweep::Sweep;

use super::BoosterDetector;
use crate::config::PatternConfig;

/// Get all pattern detectors, in evaluation order.
pub fn all_detectors(config: &PatternConfig) -> Vec<Box<dyn BoosterDetector>> {
    vec![
        // Single-bar
        Box::new(Rejection::new(config)),
        // Multi-bar
        Box::new(Continuation::new(config)),
        Box::new(Absorption::new(config)),
        Box::new(BreakRetest::new(config)),
        // Liquidity
        Box::new(Sweep::new(config)),
    ]
}
