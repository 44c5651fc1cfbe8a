use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use tracing::warn;

use crate::error::{Result, SignalError};

/// Tolerance for the confidence weights summing to 1.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Bar window sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Maximum bars retained per symbol; the oldest is evicted on overflow.
    pub capacity: usize,
    /// Bars required before any detector runs.
    pub min_lookback: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            capacity: 200,
            min_lookback: 5,
        }
    }
}

/// Swing lookback used in quiet, normal and volatile windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LookbackBounds {
    pub min: usize,
    pub base: usize,
    pub max: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    pub swing_lookback: LookbackBounds,
    /// ATR as % of price at or below which the window counts as quiet.
    pub low_volatility_atr_pct: f64,
    /// ATR as % of price at or above which the window counts as volatile.
    pub high_volatility_atr_pct: f64,
    /// Structure events kept per symbol.
    pub max_events: usize,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            swing_lookback: LookbackBounds {
                min: 1,
                base: 2,
                max: 3,
            },
            low_volatility_atr_pct: 0.05,
            high_volatility_atr_pct: 5.0,
            max_events: 1_000,
        }
    }
}

/// Fair-value gap detection and magnetism.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapConfig {
    /// Gaps narrower than this % of price are ignored.
    pub min_gap_pct: f64,
    pub min_supporting_gaps: usize,
    pub max_opposing_gaps: usize,
    /// Supporting size must exceed opposing size by more than this factor.
    pub size_ratio: f64,
    pub favorable_multiplier: f64,
    pub unfavorable_multiplier: f64,
    /// (lower, upper) clamp applied to every magnetism multiplier.
    pub magnetism_bounds: (f64, f64),
    /// Booster factor for a gap formed on the current bar.
    pub fresh_gap_factor: f64,
    /// Gaps kept per symbol, oldest dropped first.
    pub max_tracked_gaps: usize,
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            min_gap_pct: 0.01,
            min_supporting_gaps: 2,
            max_opposing_gaps: 1,
            size_ratio: 2.0,
            favorable_multiplier: 1.5,
            unfavorable_multiplier: 0.6,
            magnetism_bounds: (0.6, 1.5),
            fresh_gap_factor: 1.3,
            max_tracked_gaps: 100,
        }
    }
}

/// Multiplicative factor each pattern booster applies to its side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoosterFactors {
    pub rejection: f64,
    pub continuation: f64,
    pub absorption: f64,
    pub break_retest: f64,
    pub sweep: f64,
}

impl Default for BoosterFactors {
    fn default() -> Self {
        Self {
            rejection: 1.4,
            continuation: 1.6,
            absorption: 1.3,
            break_retest: 1.5,
            sweep: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// A wick longer than this multiple of the body is a rejection candidate.
    pub wick_body_ratio: f64,
    /// Volume at or above this multiple of the trailing average is a surge.
    pub volume_surge_ratio: f64,
    /// Bars in the trailing volume average.
    pub volume_average_bars: usize,
    pub continuation_bars: usize,
    pub absorption_window: usize,
    pub absorption_min_tests: usize,
    /// Distance from a level, as % of the level, that still counts as a test.
    pub level_tolerance_pct: f64,
    pub retest_window: usize,
    pub sweep_window: usize,
    pub factors: BoosterFactors,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            wick_body_ratio: 2.0,
            volume_surge_ratio: 1.5,
            volume_average_bars: 5,
            continuation_bars: 3,
            absorption_window: 10,
            absorption_min_tests: 3,
            level_tolerance_pct: 0.1,
            retest_window: 6,
            sweep_window: 5,
            factors: BoosterFactors::default(),
        }
    }
}

/// Composite score assembly and band tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Baseline on both sides so boosters register without a structure event.
    pub booster_seed: f64,
    pub bos_score: f64,
    pub choch_score: f64,
    /// Structure score in the trend's direction on bars without an event.
    pub trend_carry_score: f64,
    /// |net| below this is neutral and emits no signal.
    pub min_magnitude: f64,
    pub score_cap: f64,
    /// (lower, upper) clamp applied to every booster factor.
    pub booster_bounds: (f64, f64),
    /// Lower edges of the 0-4 star bands, strictly ascending.
    pub star_thresholds: [f64; 5],
    /// Lower edges of the 1-10 grade bands, strictly ascending.
    pub grade_thresholds: [f64; 10],
    /// Signals (and their filter decisions) kept per symbol.
    pub max_signals: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            booster_seed: 10.0,
            bos_score: 40.0,
            choch_score: 30.0,
            trend_carry_score: 10.0,
            min_magnitude: 5.0,
            score_cap: 100.0,
            booster_bounds: (0.5, 2.0),
            star_thresholds: [0.0, 20.0, 40.0, 60.0, 80.0],
            grade_thresholds: [0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0],
            max_signals: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StickyConfig {
    /// Opposite-direction signals at or above this grade are shown.
    pub flip_grade_min: u8,
    /// Opposite-direction signals at or above this many stars are shown.
    pub flip_stars_min: u8,
}

impl Default for StickyConfig {
    fn default() -> Self {
        Self {
            flip_grade_min: 7,
            flip_stars_min: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub recent_accuracy: f64,
    pub pattern: f64,
    pub structure_rhythm: f64,
    pub move_magnitude: f64,
    pub volume_trend: f64,
}

impl ConfidenceWeights {
    pub fn sum(&self) -> f64 {
        self.recent_accuracy
            + self.pattern
            + self.structure_rhythm
            + self.move_magnitude
            + self.volume_trend
    }

    fn as_array(&self) -> [f64; 5] {
        [
            self.recent_accuracy,
            self.pattern,
            self.structure_rhythm,
            self.move_magnitude,
            self.volume_trend,
        ]
    }
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            recent_accuracy: 0.25,
            pattern: 0.20,
            structure_rhythm: 0.25,
            move_magnitude: 0.20,
            volume_trend: 0.10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub weights: ConfidenceWeights,
    /// Decisive outcomes kept for the recent-accuracy tracker.
    pub accuracy_window: usize,
    /// BoS events considered by the structure-rhythm tracker.
    pub rhythm_window: usize,
    /// Close-to-close moves considered by the move-magnitude tracker.
    pub magnitude_window: usize,
    /// Favorable/opposite ratio used when there are no opposite moves.
    pub max_move_ratio: f64,
    /// Score change per unit of favorable/opposite ratio away from 1.
    pub move_ratio_slope: f64,
    /// Bars in each of the two volume averages compared.
    pub volume_window: usize,
    pub volume_high_ratio: f64,
    pub volume_low_ratio: f64,
    pub volume_high_score: f64,
    pub volume_low_score: f64,
    pub pattern_aligned_score: f64,
    pub pattern_sideways_score: f64,
    pub pattern_contradicts_score: f64,
    /// Lower edges of medium-low, medium and high.
    pub bands: [f64; 3],
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            weights: ConfidenceWeights::default(),
            accuracy_window: 20,
            rhythm_window: 10,
            magnitude_window: 20,
            max_move_ratio: 4.0,
            move_ratio_slope: 0.15,
            volume_window: 5,
            volume_high_ratio: 1.5,
            volume_low_ratio: 0.7,
            volume_high_score: 0.8,
            volume_low_score: 0.2,
            pattern_aligned_score: 0.90,
            pattern_sideways_score: 0.50,
            pattern_contradicts_score: 0.10,
            bands: [0.45, 0.60, 0.75],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Forward horizons in milliseconds, strictly ascending.
    pub horizons_ms: Vec<i64>,
    /// Fractional move that must be exceeded to count as decisive.
    pub noise_threshold: f64,
    /// Lookups returning no price before a checkpoint goes inconclusive.
    pub max_lookup_attempts: u32,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            horizons_ms: vec![120_000, 300_000, 600_000, 1_800_000],
            noise_threshold: 0.001,
            max_lookup_attempts: 3,
        }
    }
}

/// Complete pipeline configuration, fixed at engine construction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub window: WindowConfig,
    pub structure: StructureConfig,
    pub gaps: GapConfig,
    pub patterns: PatternConfig,
    pub scoring: ScoringConfig,
    pub sticky: StickyConfig,
    pub confidence: ConfidenceConfig,
    pub evaluation: EvaluationConfig,
}

impl SignalConfig {
    /// Load a JSON config file. Missing sections take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: SignalConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    ///
    /// `SIGIL_CONFIG_FILE` names a JSON file to start from; individual
    /// `SIGIL_*` variables then override common scalars.
    pub fn from_env() -> Result<Self> {
        let mut config = match env::var("SIGIL_CONFIG_FILE") {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)?;
                serde_json::from_str(&raw)?
            }
            Err(_) => SignalConfig::default(),
        };

        if let Some(v) = env_parse("SIGIL_WINDOW_CAPACITY") {
            config.window.capacity = v;
        }
        if let Some(v) = env_parse("SIGIL_MIN_LOOKBACK") {
            config.window.min_lookback = v;
        }
        if let Some(v) = env_parse("SIGIL_FLIP_GRADE_MIN") {
            config.sticky.flip_grade_min = v;
        }
        if let Some(v) = env_parse("SIGIL_FLIP_STARS_MIN") {
            config.sticky.flip_stars_min = v;
        }
        if let Some(v) = env_parse("SIGIL_NOISE_THRESHOLD") {
            config.evaluation.noise_threshold = v;
        }
        if let Some(v) = env_parse("SIGIL_MAX_LOOKUP_ATTEMPTS") {
            config.evaluation.max_lookup_attempts = v;
        }
        // Format: "120000,300000,600000"
        if let Ok(raw) = env::var("SIGIL_HORIZONS_MS") {
            let parsed: std::result::Result<Vec<i64>, _> =
                raw.split(',').map(|s| s.trim().parse::<i64>()).collect();
            match parsed {
                Ok(horizons) => config.evaluation.horizons_ms = horizons,
                Err(e) => warn!("Ignoring SIGIL_HORIZONS_MS={:?}: {}", raw, e),
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Check every table, bound and weight. Fails fast before any bar is
    /// processed.
    pub fn validate(&self) -> Result<()> {
        let window = &self.window;
        if window.min_lookback < 3 {
            return Err(invalid(format!(
                "min_lookback must be at least 3, got {}",
                window.min_lookback
            )));
        }
        if window.capacity < window.min_lookback {
            return Err(invalid(format!(
                "window capacity {} is smaller than min_lookback {}",
                window.capacity, window.min_lookback
            )));
        }

        let structure = &self.structure;
        let lb = structure.swing_lookback;
        if lb.min == 0 || lb.min > lb.base || lb.base > lb.max {
            return Err(invalid(format!(
                "swing lookback must satisfy 1 <= min <= base <= max, got {}/{}/{}",
                lb.min, lb.base, lb.max
            )));
        }
        if !(structure.low_volatility_atr_pct < structure.high_volatility_atr_pct) {
            return Err(invalid(
                "low_volatility_atr_pct must be below high_volatility_atr_pct".to_string(),
            ));
        }
        if structure.max_events == 0 || self.scoring.max_signals == 0 {
            return Err(invalid("event and signal caps must be non-zero".to_string()));
        }

        let gaps = &self.gaps;
        let (lo, hi) = gaps.magnetism_bounds;
        if !(lo > 0.0 && lo <= 1.0 && hi >= 1.0) {
            return Err(invalid(format!(
                "magnetism bounds must straddle 1.0, got ({}, {})",
                lo, hi
            )));
        }
        if gaps.size_ratio <= 0.0 || gaps.min_gap_pct < 0.0 {
            return Err(invalid("gap size settings must be non-negative".to_string()));
        }

        let scoring = &self.scoring;
        let (b_lo, b_hi) = scoring.booster_bounds;
        if !(b_lo > 0.0 && b_lo <= 1.0 && b_hi >= 1.0) {
            return Err(invalid(format!(
                "booster bounds must straddle 1.0, got ({}, {})",
                b_lo, b_hi
            )));
        }
        if !is_strictly_ascending(&scoring.star_thresholds) {
            return Err(invalid(format!(
                "star thresholds must be strictly ascending: {:?}",
                scoring.star_thresholds
            )));
        }
        if !is_strictly_ascending(&scoring.grade_thresholds) {
            return Err(invalid(format!(
                "grade thresholds must be strictly ascending: {:?}",
                scoring.grade_thresholds
            )));
        }
        if scoring.score_cap <= 0.0 || scoring.min_magnitude < 0.0 || scoring.booster_seed < 0.0 {
            return Err(invalid("score cap, seed and magnitude must be non-negative".to_string()));
        }

        let sticky = &self.sticky;
        if sticky.flip_grade_min == 0 || sticky.flip_grade_min > 10 {
            return Err(invalid(format!(
                "sticky flip grade must be 1-10, got {}",
                sticky.flip_grade_min
            )));
        }
        if sticky.flip_stars_min > 4 {
            return Err(invalid(format!(
                "sticky flip stars must be 0-4, got {}",
                sticky.flip_stars_min
            )));
        }

        let confidence = &self.confidence;
        if confidence.weights.as_array().iter().any(|w| *w < 0.0 || !w.is_finite()) {
            return Err(invalid("confidence weights must be non-negative".to_string()));
        }
        let sum = confidence.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(invalid(format!(
                "confidence weights must sum to 1.0, got {}",
                sum
            )));
        }
        if !is_strictly_ascending(&confidence.bands)
            || confidence.bands[0] < 0.0
            || confidence.bands[2] > 1.0
        {
            return Err(invalid(format!(
                "confidence bands must be strictly ascending within [0, 1]: {:?}",
                confidence.bands
            )));
        }
        if confidence.accuracy_window == 0
            || confidence.rhythm_window == 0
            || confidence.magnitude_window == 0
            || confidence.volume_window == 0
        {
            return Err(invalid("confidence windows must be non-zero".to_string()));
        }
        if !(confidence.move_ratio_slope.is_finite() && confidence.move_ratio_slope > 0.0)
            || !(confidence.max_move_ratio.is_finite() && confidence.max_move_ratio >= 1.0)
        {
            return Err(invalid(format!(
                "move ratio slope must be positive and max move ratio at least 1, got {} and {}",
                confidence.move_ratio_slope, confidence.max_move_ratio
            )));
        }

        let patterns = &self.patterns;
        if patterns.volume_average_bars == 0 || patterns.continuation_bars < 2 {
            return Err(invalid(
                "volume average needs at least 1 bar and continuation at least 2".to_string(),
            ));
        }

        let evaluation = &self.evaluation;
        if evaluation.horizons_ms.is_empty() {
            return Err(invalid("at least one evaluation horizon is required".to_string()));
        }
        if evaluation.horizons_ms[0] <= 0
            || !evaluation.horizons_ms.windows(2).all(|w| w[0] < w[1])
        {
            return Err(invalid(format!(
                "evaluation horizons must be positive and strictly ascending: {:?}",
                evaluation.horizons_ms
            )));
        }
        if !(0.0..1.0).contains(&evaluation.noise_threshold) {
            return Err(invalid(format!(
                "noise threshold must be in [0, 1), got {}",
                evaluation.noise_threshold
            )));
        }

        Ok(())
    }
}

fn invalid(message: String) -> SignalError {
    SignalError::Configuration(message)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring unparsable {}={:?}", key, raw);
            None
        }
    }
}

/// True when every value is finite and strictly greater than the previous.
pub fn is_strictly_ascending(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite()) && values.windows(2).all(|w| w[0] < w[1])
}

/// Settings for the replay binary.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// JSON-lines bar file; each line is `{"symbol": .., "bar": {..}}`.
    /// When absent a synthetic random walk is generated.
    pub feed_path: Option<String>,
    /// Symbols for the synthetic feed.
    pub symbols: Vec<String>,
    pub synthetic_bars: usize,
    pub seed: u64,
    pub bar_interval_ms: i64,
    /// Evaluation scheduler tick.
    pub evaluation_tick_ms: u64,
}

impl ReplayConfig {
    /// Load replay settings from environment variables.
    pub fn from_env() -> Self {
        // Format: "BTC,ETH,SOL"
        let symbols = env::var("SIGIL_SYMBOLS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|sym| sym.trim().to_uppercase())
                    .filter(|sym| !sym.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| vec!["BTC".to_string(), "ETH".to_string()]);

        Self {
            feed_path: env::var("SIGIL_FEED").ok(),
            symbols,
            synthetic_bars: env::var("SIGIL_SYNTHETIC_BARS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            seed: env::var("SIGIL_SEED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7),
            bar_interval_ms: env::var("SIGIL_BAR_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60_000),
            evaluation_tick_ms: env::var("SIGIL_EVALUATION_TICK_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SignalConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_move_ratio_slope() {
        let mut config = SignalConfig::default();
        config.confidence.move_ratio_slope = 0.0;
        assert!(config.validate().is_err());

        config.confidence.move_ratio_slope = 0.15;
        config.confidence.max_move_ratio = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_signal_cap() {
        let mut config = SignalConfig::default();
        config.scoring.max_signals = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let weights = ConfidenceWeights::default();
        assert!((weights.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_weights_not_summing_to_one() {
        let mut config = SignalConfig::default();
        config.confidence.weights.volume_trend = 0.2;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, SignalError::Configuration(_)));
        assert!(err.to_string().contains("sum to 1.0"));
    }

    #[test]
    fn test_rejects_unordered_star_table() {
        let mut config = SignalConfig::default();
        config.scoring.star_thresholds = [0.0, 40.0, 20.0, 60.0, 80.0];
        assert!(matches!(
            config.validate(),
            Err(SignalError::Configuration(_))
        ));
    }

    #[test]
    fn test_rejects_flat_grade_table() {
        let mut config = SignalConfig::default();
        config.scoring.grade_thresholds[4] = config.scoring.grade_thresholds[3];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unsorted_horizons() {
        let mut config = SignalConfig::default();
        config.evaluation.horizons_ms = vec![300_000, 120_000];
        assert!(config.validate().is_err());

        config.evaluation.horizons_ms = vec![];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_magnetism_bounds() {
        let mut config = SignalConfig::default();
        config.gaps.magnetism_bounds = (1.5, 0.6);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_min_lookback_over_capacity() {
        let mut config = SignalConfig::default();
        config.window.capacity = 4;
        config.window.min_lookback = 8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_flip_settings() {
        let mut config = SignalConfig::default();
        config.sticky.flip_grade_min = 11;
        assert!(config.validate().is_err());

        let mut config = SignalConfig::default();
        config.sticky.flip_stars_min = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let json = r#"{ "window": { "min_lookback": 12 }, "sticky": { "flip_grade_min": 8 } }"#;
        let config: SignalConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.window.min_lookback, 12);
        assert_eq!(config.window.capacity, 200);
        assert_eq!(config.sticky.flip_grade_min, 8);
        assert_eq!(config.sticky.flip_stars_min, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_is_strictly_ascending() {
        assert!(is_strictly_ascending(&[0.0, 1.0, 2.0]));
        assert!(!is_strictly_ascending(&[0.0, 0.0, 2.0]));
        assert!(!is_strictly_ascending(&[0.0, f64::NAN]));
        assert!(is_strictly_ascending(&[]));
    }
}
