//! Forward evaluation of emitted signals.
//!
//! Every signal, shown or hidden, gets a record with one checkpoint per
//! horizon. A min-heap keyed by due time holds only each record's next
//! unresolved checkpoint, so a record's horizons always resolve in order.

use dashmap::DashMap;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::accuracy::AccuracyStore;
use super::PriceLookup;
use crate::config::EvaluationConfig;
use crate::error::{Result, SignalError};
use crate::types::{
    Cohort, CohortAccuracy, EvaluationOutcome, EvaluationRecord, FilterDecision, SessionReport,
    Signal,
};

/// Records are keyed by (symbol, signal id).
type RecordKey = (String, u64);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct PendingCheckpoint {
    due_at: i64,
    key: RecordKey,
    checkpoint: usize,
}

#[derive(Debug, Clone, Copy)]
struct Session {
    id: Uuid,
    started_at: i64,
}

/// Scheduler and store for evaluation records.
pub struct EvaluationHarness {
    config: EvaluationConfig,
    records: DashMap<RecordKey, EvaluationRecord>,
    queue: Mutex<BinaryHeap<Reverse<PendingCheckpoint>>>,
    session: RwLock<Option<Session>>,
    accuracy: Arc<AccuracyStore>,
}

impl EvaluationHarness {
    /// Create a new harness.
    pub fn new(config: EvaluationConfig) -> Arc<Self> {
        let accuracy = AccuracyStore::new(&config.horizons_ms);
        Arc::new(Self {
            config,
            records: DashMap::new(),
            queue: Mutex::new(BinaryHeap::new()),
            session: RwLock::new(None),
            accuracy,
        })
    }

    /// Open a new session, discarding the previous session's records.
    pub fn start_session(&self, now: i64) -> Uuid {
        let id = Uuid::new_v4();
        {
            let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = session.as_ref() {
                warn!("Session {} replaced before it was ended", previous.id);
            }
            *session = Some(Session {
                id,
                started_at: now,
            });
        }
        self.lock_queue().clear();
        self.records.clear();
        self.accuracy.clear();
        info!("Evaluation session {} started at {}", id, now);
        id
    }

    /// Current session id, if a session is open.
    pub fn session_id(&self) -> Option<Uuid> {
        self.current_session().map(|s| s.id)
    }

    /// Create a record for a signal and schedule its first checkpoint.
    pub fn record_signal(&self, signal: &Signal, decision: &FilterDecision) -> Result<()> {
        let session = self.current_session().ok_or(SignalError::NoSession)?;
        let key = (signal.symbol.clone(), signal.id);
        let record = EvaluationRecord::new(
            signal.symbol.clone(),
            signal.id,
            session.id,
            signal.direction,
            decision.shown,
            signal.price,
            signal.timestamp,
            &self.config.horizons_ms,
        );
        let first = record
            .next_pending()
            .map(|idx| (idx, record.checkpoints[idx].due_at));
        self.records.insert(key.clone(), record);

        if let Some((checkpoint, due_at)) = first {
            self.lock_queue().push(Reverse(PendingCheckpoint {
                due_at,
                key,
                checkpoint,
            }));
        }
        debug!(
            "Tracking {} signal {} ({})",
            signal.symbol,
            signal.id,
            if decision.shown { "shown" } else { "hidden" }
        );
        Ok(())
    }

    /// Resolve every checkpoint due at or before `now`.
    ///
    /// Returns the records touched by this pass, in the order they were first
    /// touched. A checkpoint with no price available is retried on later
    /// passes until `max_lookup_attempts` is reached.
    pub fn advance(&self, now: i64, lookup: &dyn PriceLookup) -> Vec<EvaluationRecord> {
        let mut touched: Vec<RecordKey> = Vec::new();
        let mut seen: HashSet<RecordKey> = HashSet::new();
        let mut retry: Vec<PendingCheckpoint> = Vec::new();

        {
            let mut queue = self.lock_queue();
            while let Some(Reverse(top)) = queue.peek() {
                if top.due_at > now {
                    break;
                }
                let pending = match queue.pop() {
                    Some(Reverse(pending)) => pending,
                    None => break,
                };

                let next = match self.resolve(&pending, lookup) {
                    Resolution::Stale => continue,
                    Resolution::Retry => {
                        retry.push(pending.clone());
                        None
                    }
                    Resolution::Resolved(next) => next,
                };

                if seen.insert(pending.key.clone()) {
                    touched.push(pending.key.clone());
                }
                if let Some((checkpoint, due_at)) = next {
                    queue.push(Reverse(PendingCheckpoint {
                        due_at,
                        key: pending.key,
                        checkpoint,
                    }));
                }
            }
            for pending in retry {
                queue.push(Reverse(pending));
            }
        }

        touched
            .iter()
            .filter_map(|key| self.records.get(key).map(|r| r.clone()))
            .collect()
    }

    fn resolve(&self, pending: &PendingCheckpoint, lookup: &dyn PriceLookup) -> Resolution {
        let mut guard = match self.records.get_mut(&pending.key) {
            Some(guard) => guard,
            None => return Resolution::Stale,
        };
        let record = guard.value_mut();
        if record.is_frozen() || record.next_pending() != Some(pending.checkpoint) {
            return Resolution::Stale;
        }

        let cohort = record.cohort();
        let horizon_ms = record.checkpoints[pending.checkpoint].horizon_ms;
        let outcome = match lookup.price_at(&record.symbol, pending.due_at) {
            Some(price) => {
                record.resolve_checkpoint(pending.checkpoint, price, self.config.noise_threshold)
            }
            None => {
                let checkpoint = &mut record.checkpoints[pending.checkpoint];
                checkpoint.lookup_attempts += 1;
                if checkpoint.lookup_attempts < self.config.max_lookup_attempts {
                    debug!(
                        "No price for {} at {} (attempt {})",
                        record.symbol, pending.due_at, checkpoint.lookup_attempts
                    );
                    return Resolution::Retry;
                }
                warn!(
                    "No price for {} at {} after {} attempts, marking inconclusive",
                    record.symbol, pending.due_at, checkpoint.lookup_attempts
                );
                record.resolve_missing(pending.checkpoint)
            }
        };

        if let Some(outcome) = outcome {
            self.accuracy
                .record_checkpoint(&record.symbol, cohort, horizon_ms, outcome);
        }
        if record.is_frozen() {
            self.accuracy
                .record_final(&record.symbol, cohort, record.final_result);
            debug!(
                "{} signal {} final result {:?}",
                record.symbol, record.signal_id, record.final_result
            );
        }

        Resolution::Resolved(
            record
                .next_pending()
                .map(|idx| (idx, record.checkpoints[idx].due_at)),
        )
    }

    /// Close the session: resolve what is due, abandon what is not, and
    /// report per-cohort accuracy.
    pub fn end_session(&self, now: i64, lookup: &dyn PriceLookup) -> Result<SessionReport> {
        let session = self.current_session().ok_or(SignalError::NoSession)?;
        self.advance(now, lookup);

        self.lock_queue().clear();
        let mut abandoned = 0usize;
        for mut record in self.records.iter_mut() {
            let cohort = record.cohort();
            let pending: Vec<i64> = record
                .checkpoints
                .iter()
                .filter(|c| c.outcome == EvaluationOutcome::Pending)
                .map(|c| c.horizon_ms)
                .collect();
            if record.abandon_pending() {
                abandoned += 1;
                for horizon_ms in pending {
                    self.accuracy.record_checkpoint(
                        &record.symbol,
                        cohort,
                        horizon_ms,
                        EvaluationOutcome::Abandoned,
                    );
                }
                self.accuracy
                    .record_final(&record.symbol, cohort, EvaluationOutcome::Abandoned);
            }
        }

        *self.session.write().unwrap_or_else(PoisonError::into_inner) = None;

        let report = SessionReport {
            session_id: session.id,
            started_at: session.started_at,
            ended_at: now,
            records: self.records.len(),
            shown: self.accuracy.get_global_accuracy(Cohort::Shown),
            hidden: self.accuracy.get_global_accuracy(Cohort::Hidden),
        };
        info!(
            "Evaluation session {} ended: {} records, {} abandoned, shown {:.1}% / hidden {:.1}%",
            session.id,
            report.records,
            abandoned,
            report.shown.final_result.accuracy_pct,
            report.hidden.final_result.accuracy_pct
        );
        Ok(report)
    }

    /// Live accuracy for one cohort across all symbols.
    pub fn cohort_accuracy(&self, cohort: Cohort) -> CohortAccuracy {
        self.accuracy.get_global_accuracy(cohort)
    }

    pub fn accuracy_store(&self) -> &Arc<AccuracyStore> {
        &self.accuracy
    }

    pub fn record(&self, symbol: &str, signal_id: u64) -> Option<EvaluationRecord> {
        self.records
            .get(&(symbol.to_uppercase(), signal_id))
            .map(|r| r.clone())
    }

    /// All records for a symbol, ordered by signal id.
    pub fn records(&self, symbol: &str) -> Vec<EvaluationRecord> {
        let symbol = symbol.to_uppercase();
        let mut records: Vec<EvaluationRecord> = self
            .records
            .iter()
            .filter(|r| r.key().0 == symbol)
            .map(|r| r.value().clone())
            .collect();
        records.sort_by_key(|r| r.signal_id);
        records
    }

    /// Checkpoints waiting in the queue.
    pub fn pending_count(&self) -> usize {
        self.lock_queue().len()
    }

    /// Due time of the earliest queued checkpoint.
    pub fn next_due(&self) -> Option<i64> {
        self.lock_queue().peek().map(|Reverse(p)| p.due_at)
    }

    fn current_session(&self) -> Option<Session> {
        *self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, BinaryHeap<Reverse<PendingCheckpoint>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

enum Resolution {
    /// The checkpoint was already resolved or its record is gone.
    Stale,
    /// No price yet; queue the same checkpoint again.
    Retry,
    /// Resolved; carries the record's next checkpoint, if any.
    Resolved(Option<(usize, i64)>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ComponentBreakdown, Direction, FilterReason};
    use std::collections::HashMap;

    struct Prices(HashMap<i64, f64>);

    impl PriceLookup for Prices {
        fn price_at(&self, _symbol: &str, at_ms: i64) -> Option<f64> {
            self.0.get(&at_ms).copied()
        }
    }

    fn config() -> EvaluationConfig {
        EvaluationConfig {
            horizons_ms: vec![1_000, 2_000],
            noise_threshold: 0.001,
            max_lookup_attempts: 2,
        }
    }

    fn signal(id: u64, direction: Direction) -> Signal {
        Signal {
            id,
            symbol: "BTC".to_string(),
            direction,
            stars: 2,
            grade: 5,
            composite_score: 45.0,
            price: 100.0,
            timestamp: 0,
            index: id,
            components: ComponentBreakdown {
                structure_event: None,
                structure_direction: direction,
                structure_score: 0.0,
                boosters: Vec::new(),
                bullish: 0.0,
                bearish: 0.0,
                net: 0.0,
                magnetism: 1.0,
            },
        }
    }

    fn decision(id: u64, shown: bool) -> FilterDecision {
        FilterDecision {
            signal_id: id,
            shown,
            reason: if shown {
                FilterReason::Baseline
            } else {
                FilterReason::SameDirectionWeaker
            },
        }
    }

    #[test]
    fn test_requires_session() {
        let harness = EvaluationHarness::new(config());
        let err = harness
            .record_signal(&signal(1, Direction::Up), &decision(1, true))
            .unwrap_err();
        assert!(matches!(err, SignalError::NoSession));
    }

    #[test]
    fn test_checkpoints_resolve_in_order() {
        let harness = EvaluationHarness::new(config());
        harness.start_session(0);
        harness
            .record_signal(&signal(1, Direction::Up), &decision(1, true))
            .unwrap();
        assert_eq!(harness.pending_count(), 1);
        assert_eq!(harness.next_due(), Some(1_000));

        let prices = Prices(HashMap::from([(1_000, 101.0), (2_000, 99.0)]));
        assert!(harness.advance(999, &prices).is_empty());

        // Both horizons are due; they resolve in one pass, in order
        let touched = harness.advance(5_000, &prices);
        assert_eq!(touched.len(), 1);
        let record = &touched[0];
        assert_eq!(record.checkpoints[0].outcome, EvaluationOutcome::Correct);
        assert_eq!(record.checkpoints[1].outcome, EvaluationOutcome::Incorrect);
        assert_eq!(record.final_result, EvaluationOutcome::Incorrect);
        assert_eq!(harness.pending_count(), 0);
    }

    #[test]
    fn test_missing_price_retries_then_inconclusive() {
        let harness = EvaluationHarness::new(config());
        harness.start_session(0);
        harness
            .record_signal(&signal(1, Direction::Down), &decision(1, false))
            .unwrap();
        let empty = Prices(HashMap::new());

        let touched = harness.advance(1_000, &empty);
        assert!(touched.is_empty());
        assert_eq!(harness.pending_count(), 1);
        let record = harness.record("BTC", 1).unwrap();
        assert_eq!(record.checkpoints[0].lookup_attempts, 1);
        assert_eq!(record.checkpoints[0].outcome, EvaluationOutcome::Pending);

        let touched = harness.advance(1_500, &empty);
        assert_eq!(touched.len(), 1);
        assert_eq!(touched[0].checkpoints[0].outcome, EvaluationOutcome::Inconclusive);
        assert!(touched[0].checkpoints[0].missing_data);
    }

    #[test]
    fn test_end_session_abandons_pending() {
        let harness = EvaluationHarness::new(config());
        harness.start_session(0);
        harness
            .record_signal(&signal(1, Direction::Up), &decision(1, true))
            .unwrap();
        harness
            .record_signal(&signal(2, Direction::Up), &decision(2, false))
            .unwrap();

        let prices = Prices(HashMap::from([(1_000, 101.0)]));
        let report = harness.end_session(1_000, &prices).unwrap();

        assert_eq!(report.records, 2);
        assert_eq!(report.shown.final_result.abandoned, 1);
        assert_eq!(report.hidden.final_result.abandoned, 1);
        assert_eq!(report.shown.horizon(1_000).unwrap().correct, 1);
        assert_eq!(report.shown.horizon(2_000).unwrap().abandoned, 1);
        assert_eq!(report.shown.final_result.incorrect, 0);
        assert!(harness.session_id().is_none());
        assert_eq!(harness.pending_count(), 0);

        let record = harness.record("BTC", 1).unwrap();
        assert_eq!(record.final_result, EvaluationOutcome::Abandoned);
    }

    #[test]
    fn test_end_session_without_start() {
        let harness = EvaluationHarness::new(config());
        let prices = Prices(HashMap::new());
        assert!(matches!(
            harness.end_session(0, &prices),
            Err(SignalError::NoSession)
        ));
    }
}
