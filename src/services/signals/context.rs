//! Per-symbol pipeline state and the bar-by-bar pipeline itself.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::confidence::{ConfidenceEngine, ConfidenceInput};
use super::detectors::all_detectors;
use super::gaps::GapTracker;
use super::scorer;
use super::sticky::StickyFilter;
use super::structure::StructureDetector;
use super::BoosterDetector;
use crate::config::SignalConfig;
use crate::error::{Result, SignalError};
use crate::services::window::BarWindow;
use crate::types::{
    Bar, Booster, ConfidenceState, Direction, FairValueGap, FilterDecision, Signal,
    StructureEvent, SwingPoint,
};

/// Whether the pipeline ran on a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum IngestStatus {
    /// The bar was stored but the window is still too short.
    Warmup { have: usize, need: usize },
    Evaluated,
}

/// Everything one accepted bar produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    pub symbol: String,
    /// The bar as stored, with its sequence assigned.
    pub bar: Bar,
    pub status: IngestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<StructureEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fresh_gap: Option<FairValueGap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<Signal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<FilterDecision>,
    pub confidence: ConfidenceState,
}

/// All state the pipeline keeps for one symbol during a session.
pub struct SymbolContext {
    symbol: String,
    config: Arc<SignalConfig>,
    window: BarWindow,
    structure: StructureDetector,
    gaps: GapTracker,
    detectors: Vec<Box<dyn BoosterDetector>>,
    sticky: StickyFilter,
    confidence: ConfidenceEngine,
    events: Vec<StructureEvent>,
    swings: Vec<SwingPoint>,
    signals: Vec<Signal>,
    decisions: BTreeMap<u64, FilterDecision>,
    next_signal_id: u64,
}

impl SymbolContext {
    pub fn new(symbol: &str, config: Arc<SignalConfig>) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            window: BarWindow::new(config.window.capacity),
            structure: StructureDetector::new(),
            gaps: GapTracker::new(),
            detectors: all_detectors(&config.patterns),
            sticky: StickyFilter::new(config.sticky.clone()),
            confidence: ConfidenceEngine::new(config.confidence.clone()),
            events: Vec::new(),
            swings: Vec::new(),
            signals: Vec::new(),
            decisions: BTreeMap::new(),
            next_signal_id: 1,
            config,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Run one bar through the pipeline.
    ///
    /// A malformed bar is rejected with every piece of state untouched. An
    /// accepted bar during warm-up yields `IngestStatus::Warmup`.
    pub fn ingest(&mut self, bar: Bar) -> Result<PipelineOutput> {
        let bar = self.window.push(bar)?;
        let config = Arc::clone(&self.config);
        let bars = self.window.bars();

        let fresh_gap = self.gaps.update(bars, &config.gaps);

        let reading = match self.structure.detect(bars, &config.window, &config.structure) {
            Ok(reading) => reading,
            Err(SignalError::InsufficientData { have, need }) => {
                let direction = self.current_direction();
                let confidence = self.confidence.update(ConfidenceInput {
                    bars,
                    swings: &[],
                    events: &self.events,
                    direction,
                });
                debug!("{} warming up: {}/{} bars", self.symbol, have, need);
                return Ok(PipelineOutput {
                    symbol: self.symbol.clone(),
                    bar,
                    status: IngestStatus::Warmup { have, need },
                    event: None,
                    fresh_gap,
                    signal: None,
                    decision: None,
                    confidence,
                });
            }
            Err(e) => return Err(e),
        };

        if let Some(event) = reading.event {
            self.events.push(event);
            if self.events.len() > config.structure.max_events {
                let excess = self.events.len() - config.structure.max_events;
                self.events.drain(..excess);
            }
        }

        let mut boosters: Vec<Booster> = self
            .detectors
            .iter()
            .filter(|d| bars.len() >= d.min_periods())
            .filter_map(|d| d.detect(bars))
            .collect();
        boosters.extend(self.gaps.fresh_booster(&config.gaps));

        let reference = reading.event.map(|e| e.price).unwrap_or(bar.close);
        let gaps = &self.gaps;
        let score = scorer::score(
            reading.event.as_ref(),
            reading.trend,
            &boosters,
            |direction| gaps.magnetism(reference, direction, &config.gaps),
            &config.scoring,
        );
        debug!(
            "{} bar {}: bull {:.2} bear {:.2} net {:.2} x{:.2} -> {:?}",
            self.symbol,
            bar.sequence,
            score.breakdown.bullish,
            score.breakdown.bearish,
            score.breakdown.net,
            score.breakdown.magnetism,
            score.direction
        );

        let (signal, decision) = if score.direction.is_directional() {
            let signal = Signal {
                id: self.next_signal_id,
                symbol: self.symbol.clone(),
                direction: score.direction,
                stars: score.stars,
                grade: score.grade,
                composite_score: score.composite,
                price: bar.close,
                timestamp: bar.timestamp,
                index: bar.sequence,
                components: score.breakdown,
            };
            self.next_signal_id += 1;

            let decision = self.sticky.apply(&signal);
            debug!(
                "{} signal {} {} {}* grade {} -> {} ({})",
                self.symbol,
                signal.id,
                signal.direction.label(),
                signal.stars,
                signal.grade,
                if decision.shown { "shown" } else { "hidden" },
                decision.reason
            );
            self.decisions.insert(signal.id, decision.clone());
            self.signals.push(signal.clone());
            if self.signals.len() > config.scoring.max_signals {
                let excess = self.signals.len() - config.scoring.max_signals;
                self.signals.drain(..excess);
                // Decisions follow the retained signals
                if let Some(oldest) = self.signals.first() {
                    self.decisions = self.decisions.split_off(&oldest.id);
                }
            }
            (Some(signal), Some(decision))
        } else {
            (None, None)
        };

        self.swings = reading.swings;
        let direction = self.current_direction();
        let confidence = self.confidence.update(ConfidenceInput {
            bars,
            swings: &self.swings,
            events: &self.events,
            direction,
        });

        Ok(PipelineOutput {
            symbol: self.symbol.clone(),
            bar,
            status: IngestStatus::Evaluated,
            event: reading.event,
            fresh_gap,
            signal,
            decision,
            confidence,
        })
    }

    /// Direction of the latest signal, else the established trend.
    pub fn current_direction(&self) -> Direction {
        self.signals
            .last()
            .map(|s| s.direction)
            .unwrap_or_else(|| self.structure.trend())
    }

    /// What the sticky filter would decide, without advancing it.
    pub fn preview(&self, signal: &Signal) -> FilterDecision {
        self.sticky.evaluate(signal)
    }

    pub fn decision(&self, signal_id: u64) -> Option<&FilterDecision> {
        self.decisions.get(&signal_id)
    }

    pub fn confidence(&self) -> ConfidenceState {
        self.confidence.state()
    }

    /// Feed a decisive evaluation outcome into the accuracy tracker.
    pub fn record_outcome(&mut self, correct: bool) {
        self.confidence.record_outcome(correct);
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn events(&self) -> &[StructureEvent] {
        &self.events
    }

    pub fn swings(&self) -> &[SwingPoint] {
        &self.swings
    }

    pub fn gaps(&self) -> &[FairValueGap] {
        self.gaps.gaps()
    }

    pub fn window(&self) -> &BarWindow {
        &self.window
    }

    pub fn sticky(&self) -> &StickyFilter {
        &self.sticky
    }
}
