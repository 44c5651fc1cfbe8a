use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Direction;

/// Outcome of a checkpoint, or of a whole record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationOutcome {
    #[default]
    Pending,
    /// Price moved beyond the noise threshold in the predicted direction.
    Correct,
    /// Price moved beyond the noise threshold against the prediction.
    Incorrect,
    /// Price stayed within the noise threshold, or no price was available.
    Inconclusive,
    /// The session ended before the horizon came due.
    Abandoned,
}

impl EvaluationOutcome {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, EvaluationOutcome::Pending)
    }

    pub fn is_decisive(&self) -> bool {
        matches!(
            self,
            EvaluationOutcome::Correct | EvaluationOutcome::Incorrect
        )
    }
}

/// Classify a forward price move against a predicted direction.
///
/// Up is correct iff `price_at_horizon > price_at_signal * (1 + noise)` and
/// incorrect iff `price_at_horizon < price_at_signal * (1 - noise)`; down
/// mirrors it. Anything else, including a neutral prediction, is
/// inconclusive.
pub fn classify_move(
    direction: Direction,
    price_at_signal: f64,
    price_at_horizon: f64,
    noise_threshold: f64,
) -> EvaluationOutcome {
    let upper = price_at_signal * (1.0 + noise_threshold);
    let lower = price_at_signal * (1.0 - noise_threshold);
    let moved_up = price_at_horizon > upper;
    let moved_down = price_at_horizon < lower;

    match direction {
        Direction::Up if moved_up => EvaluationOutcome::Correct,
        Direction::Up if moved_down => EvaluationOutcome::Incorrect,
        Direction::Down if moved_down => EvaluationOutcome::Correct,
        Direction::Down if moved_up => EvaluationOutcome::Incorrect,
        _ => EvaluationOutcome::Inconclusive,
    }
}

/// One forward check of a signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Forward offset in milliseconds of bar time.
    pub horizon_ms: i64,
    /// Unix timestamp (milliseconds) at which the checkpoint comes due.
    pub due_at: i64,
    pub price_at_signal: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_at_horizon: Option<f64>,
    pub outcome: EvaluationOutcome,
    /// Lookups that returned no price.
    pub lookup_attempts: u32,
    /// Resolved inconclusive because no price was ever available.
    #[serde(default)]
    pub missing_data: bool,
}

/// Which side of the sticky filter a signal landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cohort {
    Shown,
    Hidden,
}

impl Cohort {
    pub fn from_shown(shown: bool) -> Self {
        if shown {
            Cohort::Shown
        } else {
            Cohort::Hidden
        }
    }
}

/// Forward-outcome record for one signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRecord {
    pub symbol: String,
    pub signal_id: u64,
    pub session_id: Uuid,
    pub direction: Direction,
    /// Copied from the signal's filter decision.
    pub shown: bool,
    pub price_at_signal: f64,
    pub signal_timestamp: i64,
    /// Ordered by ascending horizon.
    pub checkpoints: Vec<Checkpoint>,
    pub final_result: EvaluationOutcome,
}

impl EvaluationRecord {
    /// Create a record with one pending checkpoint per horizon.
    /// `horizons_ms` must be ascending.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: String,
        signal_id: u64,
        session_id: Uuid,
        direction: Direction,
        shown: bool,
        price_at_signal: f64,
        signal_timestamp: i64,
        horizons_ms: &[i64],
    ) -> Self {
        let checkpoints = horizons_ms
            .iter()
            .map(|&horizon_ms| Checkpoint {
                horizon_ms,
                due_at: signal_timestamp + horizon_ms,
                price_at_signal,
                price_at_horizon: None,
                outcome: EvaluationOutcome::Pending,
                lookup_attempts: 0,
                missing_data: false,
            })
            .collect();

        Self {
            symbol,
            signal_id,
            session_id,
            direction,
            shown,
            price_at_signal,
            signal_timestamp,
            checkpoints,
            final_result: EvaluationOutcome::Pending,
        }
    }

    pub fn cohort(&self) -> Cohort {
        Cohort::from_shown(self.shown)
    }

    /// Index of the first unresolved checkpoint.
    pub fn next_pending(&self) -> Option<usize> {
        self.checkpoints
            .iter()
            .position(|c| c.outcome == EvaluationOutcome::Pending)
    }

    pub fn is_frozen(&self) -> bool {
        self.final_result.is_resolved()
    }

    /// Resolve checkpoint `idx` with a price. Returns the outcome, or `None`
    /// if that checkpoint is not the next pending one.
    pub fn resolve_checkpoint(
        &mut self,
        idx: usize,
        price_at_horizon: f64,
        noise_threshold: f64,
    ) -> Option<EvaluationOutcome> {
        if self.is_frozen() || self.next_pending() != Some(idx) {
            return None;
        }
        let outcome = classify_move(
            self.direction,
            self.price_at_signal,
            price_at_horizon,
            noise_threshold,
        );
        let checkpoint = &mut self.checkpoints[idx];
        checkpoint.price_at_horizon = Some(price_at_horizon);
        checkpoint.outcome = outcome;
        self.freeze_if_complete();
        Some(outcome)
    }

    /// Resolve checkpoint `idx` as inconclusive for lack of data.
    pub fn resolve_missing(&mut self, idx: usize) -> Option<EvaluationOutcome> {
        if self.is_frozen() || self.next_pending() != Some(idx) {
            return None;
        }
        let checkpoint = &mut self.checkpoints[idx];
        checkpoint.outcome = EvaluationOutcome::Inconclusive;
        checkpoint.missing_data = true;
        self.freeze_if_complete();
        Some(EvaluationOutcome::Inconclusive)
    }

    /// Mark every pending checkpoint abandoned and freeze the record.
    /// Returns true if anything changed.
    pub fn abandon_pending(&mut self) -> bool {
        if self.is_frozen() {
            return false;
        }
        for checkpoint in self.checkpoints.iter_mut() {
            if checkpoint.outcome == EvaluationOutcome::Pending {
                checkpoint.outcome = EvaluationOutcome::Abandoned;
            }
        }
        self.final_result = EvaluationOutcome::Abandoned;
        true
    }

    /// The final result is the outcome of the last horizon, once resolved.
    fn freeze_if_complete(&mut self) {
        if self.next_pending().is_none() {
            self.final_result = self
                .checkpoints
                .last()
                .map(|c| c.outcome)
                .unwrap_or(EvaluationOutcome::Inconclusive);
        }
    }
}

/// Outcome counts for one cohort at one horizon (or for final results).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeTally {
    pub total: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub inconclusive: u32,
    pub abandoned: u32,
    pub pending: u32,
    /// correct / (correct + incorrect) * 100, or 0 with no decisive outcomes.
    pub accuracy_pct: f64,
}

impl OutcomeTally {
    pub fn record(&mut self, outcome: EvaluationOutcome) {
        self.total += 1;
        match outcome {
            EvaluationOutcome::Pending => self.pending += 1,
            EvaluationOutcome::Correct => self.correct += 1,
            EvaluationOutcome::Incorrect => self.incorrect += 1,
            EvaluationOutcome::Inconclusive => self.inconclusive += 1,
            EvaluationOutcome::Abandoned => self.abandoned += 1,
        }
        self.recalculate_accuracy();
    }

    /// Fraction of decisive outcomes that were correct.
    pub fn accuracy(&self) -> Option<f64> {
        let decisive = self.correct + self.incorrect;
        if decisive == 0 {
            None
        } else {
            Some(self.correct as f64 / decisive as f64)
        }
    }

    fn recalculate_accuracy(&mut self) {
        self.accuracy_pct = self.accuracy().map(|a| a * 100.0).unwrap_or(0.0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HorizonTally {
    pub horizon_ms: i64,
    pub tally: OutcomeTally,
}

/// Accuracy for one cohort across a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortAccuracy {
    pub cohort: Cohort,
    pub final_result: OutcomeTally,
    pub by_horizon: Vec<HorizonTally>,
}

impl CohortAccuracy {
    pub fn new(cohort: Cohort, horizons_ms: &[i64]) -> Self {
        Self {
            cohort,
            final_result: OutcomeTally::default(),
            by_horizon: horizons_ms
                .iter()
                .map(|&horizon_ms| HorizonTally {
                    horizon_ms,
                    tally: OutcomeTally::default(),
                })
                .collect(),
        }
    }

    /// Add one record's outcomes.
    pub fn add(&mut self, record: &EvaluationRecord) {
        self.record_final(record.final_result);
        for checkpoint in &record.checkpoints {
            self.record_checkpoint(checkpoint.horizon_ms, checkpoint.outcome);
        }
    }

    /// Count one checkpoint outcome. Unknown horizons are ignored.
    pub fn record_checkpoint(&mut self, horizon_ms: i64, outcome: EvaluationOutcome) {
        if let Some(slot) = self
            .by_horizon
            .iter_mut()
            .find(|h| h.horizon_ms == horizon_ms)
        {
            slot.tally.record(outcome);
        }
    }

    pub fn record_final(&mut self, outcome: EvaluationOutcome) {
        self.final_result.record(outcome);
    }

    pub fn horizon(&self, horizon_ms: i64) -> Option<&OutcomeTally> {
        self.by_horizon
            .iter()
            .find(|h| h.horizon_ms == horizon_ms)
            .map(|h| &h.tally)
    }
}

/// Summary produced when a session ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub session_id: Uuid,
    pub started_at: i64,
    pub ended_at: i64,
    pub records: usize,
    pub shown: CohortAccuracy,
    pub hidden: CohortAccuracy,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(direction: Direction) -> EvaluationRecord {
        EvaluationRecord::new(
            "BTC".to_string(),
            1,
            Uuid::nil(),
            direction,
            true,
            100.0,
            0,
            &[120_000, 300_000],
        )
    }

    #[test]
    fn test_classify_up() {
        assert_eq!(classify_move(Direction::Up, 100.0, 100.6, 0.005), EvaluationOutcome::Correct);
        assert_eq!(classify_move(Direction::Up, 100.0, 100.5, 0.005), EvaluationOutcome::Inconclusive);
        assert_eq!(classify_move(Direction::Up, 100.0, 99.4, 0.005), EvaluationOutcome::Incorrect);
    }

    #[test]
    fn test_classify_down() {
        assert_eq!(classify_move(Direction::Down, 100.0, 99.4, 0.005), EvaluationOutcome::Correct);
        assert_eq!(classify_move(Direction::Down, 100.0, 100.6, 0.005), EvaluationOutcome::Incorrect);
        assert_eq!(classify_move(Direction::Down, 100.0, 99.8, 0.005), EvaluationOutcome::Inconclusive);
    }

    #[test]
    fn test_classify_neutral_never_decisive() {
        assert_eq!(classify_move(Direction::Neutral, 100.0, 150.0, 0.005), EvaluationOutcome::Inconclusive);
    }

    #[test]
    fn test_new_record_schedules_checkpoints() {
        let rec = record(Direction::Up);
        assert_eq!(rec.checkpoints.len(), 2);
        assert_eq!(rec.checkpoints[0].due_at, 120_000);
        assert_eq!(rec.checkpoints[1].due_at, 300_000);
        assert_eq!(rec.next_pending(), Some(0));
        assert!(!rec.is_frozen());
    }

    #[test]
    fn test_checkpoints_resolve_in_order() {
        let mut rec = record(Direction::Up);
        // Out of order resolution is refused
        assert_eq!(rec.resolve_checkpoint(1, 110.0, 0.001), None);
        assert_eq!(rec.resolve_checkpoint(0, 101.0, 0.001), Some(EvaluationOutcome::Correct));
        // Resolving the same checkpoint twice is refused
        assert_eq!(rec.resolve_checkpoint(0, 90.0, 0.001), None);
        assert!(!rec.is_frozen());
        assert_eq!(rec.resolve_checkpoint(1, 98.0, 0.001), Some(EvaluationOutcome::Incorrect));
        assert!(rec.is_frozen());
        assert_eq!(rec.final_result, EvaluationOutcome::Incorrect);
    }

    #[test]
    fn test_abandon_never_marks_incorrect() {
        let mut rec = record(Direction::Down);
        rec.resolve_checkpoint(0, 99.0, 0.001);
        assert!(rec.abandon_pending());
        assert_eq!(rec.checkpoints[0].outcome, EvaluationOutcome::Correct);
        assert_eq!(rec.checkpoints[1].outcome, EvaluationOutcome::Abandoned);
        assert_eq!(rec.final_result, EvaluationOutcome::Abandoned);
        // Frozen records stay untouched
        assert!(!rec.abandon_pending());
    }

    #[test]
    fn test_missing_data_marks_inconclusive() {
        let mut rec = record(Direction::Up);
        assert_eq!(rec.resolve_missing(0), Some(EvaluationOutcome::Inconclusive));
        assert!(rec.checkpoints[0].missing_data);
    }

    #[test]
    fn test_tally_accuracy() {
        let mut tally = OutcomeTally::default();
        assert_eq!(tally.accuracy(), None);
        tally.record(EvaluationOutcome::Correct);
        tally.record(EvaluationOutcome::Correct);
        tally.record(EvaluationOutcome::Incorrect);
        tally.record(EvaluationOutcome::Inconclusive);
        assert_eq!(tally.total, 4);
        assert!((tally.accuracy().unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((tally.accuracy_pct - 66.666_666).abs() < 1e-3);
    }
}
