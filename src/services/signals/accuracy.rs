//! Shown/hidden cohort accuracy for the current session.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::types::{Cohort, CohortAccuracy, EvaluationOutcome};

/// Running outcome tallies, per symbol and across all symbols.
pub struct AccuracyStore {
    horizons_ms: Vec<i64>,
    /// key = (symbol, cohort)
    accuracies: DashMap<(String, Cohort), CohortAccuracy>,
    global_accuracies: DashMap<Cohort, CohortAccuracy>,
}

impl AccuracyStore {
    /// Create a new accuracy store for the given horizons.
    pub fn new(horizons_ms: &[i64]) -> Arc<Self> {
        Arc::new(Self {
            horizons_ms: horizons_ms.to_vec(),
            accuracies: DashMap::new(),
            global_accuracies: DashMap::new(),
        })
    }

    /// Record one resolved checkpoint.
    pub fn record_checkpoint(
        &self,
        symbol: &str,
        cohort: Cohort,
        horizon_ms: i64,
        outcome: EvaluationOutcome,
    ) {
        self.entry(symbol, cohort)
            .record_checkpoint(horizon_ms, outcome);
        self.global_entry(cohort)
            .record_checkpoint(horizon_ms, outcome);
    }

    /// Record a record's final result.
    pub fn record_final(&self, symbol: &str, cohort: Cohort, outcome: EvaluationOutcome) {
        {
            let mut entry = self.entry(symbol, cohort);
            entry.record_final(outcome);
            debug!(
                "Updated {:?} accuracy for {}: {:.1}% ({} total)",
                cohort,
                symbol,
                entry.final_result.accuracy_pct,
                entry.final_result.total
            );
        }
        self.global_entry(cohort).record_final(outcome);
    }

    /// Accuracy for one symbol's cohort.
    pub fn get_accuracy(&self, symbol: &str, cohort: Cohort) -> Option<CohortAccuracy> {
        self.accuracies
            .get(&(symbol.to_uppercase(), cohort))
            .map(|e| e.clone())
    }

    /// Accuracy for a cohort across all symbols.
    pub fn get_global_accuracy(&self, cohort: Cohort) -> CohortAccuracy {
        self.global_accuracies
            .get(&cohort)
            .map(|e| e.clone())
            .unwrap_or_else(|| CohortAccuracy::new(cohort, &self.horizons_ms))
    }

    /// Both cohorts for every symbol seen, sorted by symbol.
    pub fn get_symbol_accuracies(&self) -> Vec<(String, CohortAccuracy)> {
        let mut all: Vec<(String, CohortAccuracy)> = self
            .accuracies
            .iter()
            .map(|e| (e.key().0.clone(), e.value().clone()))
            .collect();
        all.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| (a.1.cohort == Cohort::Hidden).cmp(&(b.1.cohort == Cohort::Hidden)))
        });
        all
    }

    pub fn clear(&self) {
        self.accuracies.clear();
        self.global_accuracies.clear();
    }

    fn entry(
        &self,
        symbol: &str,
        cohort: Cohort,
    ) -> dashmap::mapref::one::RefMut<'_, (String, Cohort), CohortAccuracy> {
        self.accuracies
            .entry((symbol.to_uppercase(), cohort))
            .or_insert_with(|| CohortAccuracy::new(cohort, &self.horizons_ms))
    }

    fn global_entry(&self, cohort: Cohort) -> dashmap::mapref::one::RefMut<'_, Cohort, CohortAccuracy> {
        self.global_accuracies
            .entry(cohort)
            .or_insert_with(|| CohortAccuracy::new(cohort, &self.horizons_ms))
    }
}
