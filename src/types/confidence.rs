use serde::{Deserialize, Serialize};

/// Labeled band of the 0-1 confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLabel {
    Low,
    MediumLow,
    Medium,
    High,
}

impl ConfidenceLabel {
    /// Map a score to a label. `bands` are the ascending lower edges of
    /// medium-low, medium and high. The top band is exclusive at its edge:
    /// a score exactly on the last edge is still medium.
    pub fn from_score(score: f64, bands: &[f64; 3]) -> Self {
        if score < bands[0] {
            ConfidenceLabel::Low
        } else if score < bands[1] {
            ConfidenceLabel::MediumLow
        } else if score <= bands[2] {
            ConfidenceLabel::Medium
        } else {
            ConfidenceLabel::High
        }
    }

    /// Get display label.
    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceLabel::Low => "Low",
            ConfidenceLabel::MediumLow => "Medium-Low",
            ConfidenceLabel::Medium => "Medium",
            ConfidenceLabel::High => "High",
        }
    }
}

/// Per-tracker scores, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceComponents {
    pub recent_accuracy: f64,
    pub pattern: f64,
    pub structure_rhythm: f64,
    pub move_magnitude: f64,
    pub volume_trend: f64,
}

impl Default for ConfidenceComponents {
    fn default() -> Self {
        Self {
            recent_accuracy: 0.5,
            pattern: 0.5,
            structure_rhythm: 0.5,
            move_magnitude: 0.5,
            volume_trend: 0.5,
        }
    }
}

/// Snapshot of a symbol's confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceState {
    pub components: ConfidenceComponents,
    /// Weighted composite in [0, 1].
    pub composite: f64,
    pub label: ConfidenceLabel,
}

impl ConfidenceState {
    /// Composite as a percentage (0-100).
    pub fn percent(&self) -> f64 {
        self.composite * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANDS: [f64; 3] = [0.45, 0.60, 0.75];

    #[test]
    fn test_label_bands() {
        assert_eq!(ConfidenceLabel::from_score(0.10, &BANDS), ConfidenceLabel::Low);
        assert_eq!(ConfidenceLabel::from_score(0.45, &BANDS), ConfidenceLabel::MediumLow);
        assert_eq!(ConfidenceLabel::from_score(0.60, &BANDS), ConfidenceLabel::Medium);
        assert_eq!(ConfidenceLabel::from_score(0.75, &BANDS), ConfidenceLabel::Medium);
        assert_eq!(ConfidenceLabel::from_score(0.76, &BANDS), ConfidenceLabel::High);
    }

    #[test]
    fn test_percent() {
        let state = ConfidenceState {
            components: ConfidenceComponents::default(),
            composite: 0.625,
            label: ConfidenceLabel::Medium,
        };
        assert!((state.percent() - 62.5).abs() < 1e-9);
    }
}
