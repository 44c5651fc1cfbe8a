use serde::{Deserialize, Serialize};

/// Directional classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    #[default]
    Neutral,
}

impl Direction {
    /// +1 for up, -1 for down, 0 for neutral.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Up => 1.0,
            Direction::Down => -1.0,
            Direction::Neutral => 0.0,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Neutral => Direction::Neutral,
        }
    }

    pub fn is_directional(&self) -> bool {
        !matches!(self, Direction::Neutral)
    }

    /// Get display label for this direction.
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Up => "Up",
            Direction::Down => "Down",
            Direction::Neutral => "Neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwingKind {
    High,
    Low,
}

/// A confirmed local extreme. Derived from the current window only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwingPoint {
    pub price: f64,
    /// Bar sequence index of the extreme.
    pub index: u64,
    pub kind: SwingKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructureKind {
    /// Break of Structure: close beyond the prior swing with the trend.
    #[serde(rename = "bos")]
    BreakOfStructure,
    /// Change of Character: close beyond the prior swing against the trend.
    #[serde(rename = "choch")]
    ChangeOfCharacter,
}

impl StructureKind {
    pub fn label(&self) -> &'static str {
        match self {
            StructureKind::BreakOfStructure => "BoS",
            StructureKind::ChangeOfCharacter => "CHoCH",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureEvent {
    pub kind: StructureKind,
    pub direction: Direction,
    /// Price of the swing that was broken.
    pub price: f64,
    /// Sequence index of the bar whose close broke the swing.
    pub index: u64,
    pub timestamp: i64,
}

/// A three-bar price discontinuity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FairValueGap {
    pub upper: f64,
    pub lower: f64,
    /// Sequence index of the third bar of the pattern.
    pub index: u64,
    pub direction: Direction,
    pub mitigated: bool,
}

impl FairValueGap {
    pub fn size(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn midpoint(&self) -> f64 {
        (self.upper + self.lower) / 2.0
    }
}
