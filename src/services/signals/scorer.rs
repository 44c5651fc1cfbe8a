//! Composite score assembly and star/grade banding.

use crate::config::ScoringConfig;
use crate::types::{Booster, ComponentBreakdown, Direction, StructureEvent, StructureKind};

/// Ascending lower band edges. A value falls in the highest band whose edge
/// it reaches; values below the first edge fall in band 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdTable<'a> {
    edges: &'a [f64],
}

impl<'a> ThresholdTable<'a> {
    pub fn new(edges: &'a [f64]) -> Self {
        Self { edges }
    }

    pub fn band(&self, value: f64) -> usize {
        self.edges
            .iter()
            .take_while(|edge| value >= **edge)
            .count()
            .saturating_sub(1)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Star rating 0-4.
pub fn stars_for(score: f64, config: &ScoringConfig) -> u8 {
    ThresholdTable::new(&config.star_thresholds).band(score) as u8
}

/// Grade 1-10.
pub fn grade_for(score: f64, config: &ScoringConfig) -> u8 {
    ThresholdTable::new(&config.grade_thresholds).band(score) as u8 + 1
}

/// Result of scoring one bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub direction: Direction,
    pub composite: f64,
    pub stars: u8,
    pub grade: u8,
    pub breakdown: ComponentBreakdown,
}

/// Combine structure, boosters and magnetism into a directional score.
///
/// Each side starts from the booster seed plus any structure score in its
/// direction, then multiplies in its boosters. Magnetism is looked up for the
/// winning direction only.
pub fn score(
    event: Option<&StructureEvent>,
    trend: Direction,
    boosters: &[Booster],
    magnetism: impl Fn(Direction) -> f64,
    config: &ScoringConfig,
) -> Score {
    let (structure_direction, structure_score) = match event {
        Some(event) => (
            event.direction,
            match event.kind {
                StructureKind::BreakOfStructure => config.bos_score,
                StructureKind::ChangeOfCharacter => config.choch_score,
            },
        ),
        None if trend.is_directional() => (trend, config.trend_carry_score),
        None => (Direction::Neutral, 0.0),
    };

    let (lo, hi) = config.booster_bounds;
    let boosters: Vec<Booster> = boosters
        .iter()
        .map(|b| Booster::new(b.kind, b.direction, b.factor.clamp(lo, hi)))
        .collect();

    let side = |direction: Direction| {
        let base = config.booster_seed
            + if structure_direction == direction {
                structure_score
            } else {
                0.0
            };
        boosters
            .iter()
            .filter(|b| b.direction == direction)
            .fold(base, |acc, b| acc * b.factor)
    };
    let bullish = side(Direction::Up);
    let bearish = side(Direction::Down);
    let net = bullish - bearish;

    let direction = if net >= config.min_magnitude {
        Direction::Up
    } else if net <= -config.min_magnitude {
        Direction::Down
    } else {
        Direction::Neutral
    };

    let magnetism = if direction.is_directional() {
        magnetism(direction)
    } else {
        1.0
    };
    let composite = (net.abs() * magnetism).clamp(0.0, config.score_cap);

    Score {
        direction,
        composite,
        stars: stars_for(composite, config),
        grade: grade_for(composite, config),
        breakdown: ComponentBreakdown {
            structure_event: event.map(|e| e.kind),
            structure_direction,
            structure_score,
            boosters,
            bullish,
            bearish,
            net,
            magnetism,
        },
    }
}
