//! Signal engine: per-symbol contexts plus the shared evaluation harness.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::context::{IngestStatus, PipelineOutput, SymbolContext};
use super::evaluation::EvaluationHarness;
use super::PriceLookup;
use crate::config::SignalConfig;
use crate::error::{Result, SignalError};
use crate::services::price_tape::PriceTape;
use crate::types::{
    Bar, Cohort, CohortAccuracy, ConfidenceState, EvaluationOutcome, EvaluationRecord,
    FairValueGap, FilterDecision, SessionReport, Signal, StructureEvent,
};

/// Entry point for the whole pipeline.
///
/// Symbols are processed independently; each symbol's context sits behind
/// its own map entry, so bars for one symbol are handled one at a time while
/// other symbols proceed in parallel.
pub struct SignalEngine {
    config: Arc<SignalConfig>,
    contexts: DashMap<String, SymbolContext>,
    harness: Arc<EvaluationHarness>,
    price_tape: Arc<PriceTape>,
}

impl SignalEngine {
    /// Create an engine. Fails if the configuration is invalid.
    pub fn new(config: SignalConfig) -> Result<Self> {
        config.validate()?;
        let harness = EvaluationHarness::new(config.evaluation.clone());
        info!(
            "Signal engine ready: min lookback {}, horizons {:?}",
            config.window.min_lookback, config.evaluation.horizons_ms
        );
        Ok(Self {
            config: Arc::new(config),
            contexts: DashMap::new(),
            harness,
            price_tape: Arc::new(PriceTape::new()),
        })
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Open a session. Contexts and records from any earlier session are
    /// discarded.
    pub fn start_session(&self, now: i64) -> Uuid {
        self.contexts.clear();
        self.price_tape.clear();
        self.harness.start_session(now)
    }

    /// Process one bar and return its signal, if any.
    ///
    /// `Err(InsufficientData)` means the bar was stored but the window is
    /// still warming up.
    pub fn ingest_bar(&self, symbol: &str, bar: Bar) -> Result<Option<Signal>> {
        let output = self.process_bar(symbol, bar)?;
        match output.status {
            IngestStatus::Warmup { have, need } => Err(SignalError::InsufficientData { have, need }),
            IngestStatus::Evaluated => Ok(output.signal),
        }
    }

    /// Process one bar and return everything it produced.
    pub fn process_bar(&self, symbol: &str, bar: Bar) -> Result<PipelineOutput> {
        if self.harness.session_id().is_none() {
            return Err(SignalError::NoSession);
        }
        let key = symbol.to_uppercase();
        let output = {
            let mut context = self
                .contexts
                .entry(key.clone())
                .or_insert_with(|| SymbolContext::new(&key, Arc::clone(&self.config)));
            match context.ingest(bar) {
                Ok(output) => output,
                Err(e) => {
                    warn!("Rejected bar for {}: {}", key, e);
                    return Err(e);
                }
            }
        };

        self.price_tape
            .record(&key, output.bar.timestamp, output.bar.close);
        if let (Some(signal), Some(decision)) = (&output.signal, &output.decision) {
            self.harness.record_signal(signal, decision)?;
        }
        Ok(output)
    }

    /// Filter decision recorded for a signal.
    pub fn get_filter_decision(&self, symbol: &str, signal_id: u64) -> Option<FilterDecision> {
        self.contexts
            .get(&symbol.to_uppercase())
            .and_then(|c| c.decision(signal_id).cloned())
    }

    /// What the sticky filter would decide for `signal` right now.
    pub fn preview_filter(&self, symbol: &str, signal: &Signal) -> Option<FilterDecision> {
        self.contexts
            .get(&symbol.to_uppercase())
            .map(|c| c.preview(signal))
    }

    pub fn get_confidence(&self, symbol: &str) -> Option<ConfidenceState> {
        self.contexts
            .get(&symbol.to_uppercase())
            .map(|c| c.confidence())
    }

    pub fn signals(&self, symbol: &str) -> Vec<Signal> {
        self.contexts
            .get(&symbol.to_uppercase())
            .map(|c| c.signals().to_vec())
            .unwrap_or_default()
    }

    pub fn structure_events(&self, symbol: &str) -> Vec<StructureEvent> {
        self.contexts
            .get(&symbol.to_uppercase())
            .map(|c| c.events().to_vec())
            .unwrap_or_default()
    }

    pub fn gaps(&self, symbol: &str) -> Vec<FairValueGap> {
        self.contexts
            .get(&symbol.to_uppercase())
            .map(|c| c.gaps().to_vec())
            .unwrap_or_default()
    }

    /// Symbols with a live context, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.contexts.iter().map(|e| e.key().clone()).collect();
        symbols.sort();
        symbols
    }

    /// Resolve due checkpoints and feed decisive final results back into
    /// each symbol's confidence.
    pub fn advance_evaluation(&self, now: i64, lookup: &dyn PriceLookup) -> Vec<EvaluationRecord> {
        let touched = self.harness.advance(now, lookup);
        for record in &touched {
            if !record.final_result.is_decisive() {
                continue;
            }
            if let Some(mut context) = self.contexts.get_mut(&record.symbol) {
                context.record_outcome(record.final_result == EvaluationOutcome::Correct);
            }
        }
        touched
    }

    /// End the session and tear down every symbol context.
    pub fn end_session(&self, now: i64, lookup: &dyn PriceLookup) -> Result<SessionReport> {
        self.advance_evaluation(now, lookup);
        let report = self.harness.end_session(now, lookup)?;
        self.contexts.clear();
        Ok(report)
    }

    pub fn cohort_accuracy(&self, cohort: Cohort) -> CohortAccuracy {
        self.harness.cohort_accuracy(cohort)
    }

    pub fn harness(&self) -> &Arc<EvaluationHarness> {
        &self.harness
    }

    /// Closes of every accepted bar, usable as a `PriceLookup`.
    pub fn price_tape(&self) -> &Arc<PriceTape> {
        &self.price_tape
    }
}
