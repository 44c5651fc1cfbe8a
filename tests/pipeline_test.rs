//! End-to-end pipeline tests: bars in, signals, filter decisions and
//! confidence out.

mod common;

use common::{breakout_bars, random_walk, ranging_bars, MINUTE};
use sigil::config::SignalConfig;
use sigil::services::signals::IngestStatus;
use sigil::types::{
    Bar, BoosterKind, ConfidenceState, Direction, FilterDecision, FilterReason, Signal,
    StructureKind,
};
use sigil::{SignalEngine, SignalError};

fn engine() -> SignalEngine {
    let engine = SignalEngine::new(SignalConfig::default()).unwrap();
    engine.start_session(0);
    engine
}

/// Feed every bar, collecting (signal, decision, confidence) per bar.
fn run(
    engine: &SignalEngine,
    symbol: &str,
    bars: &[Bar],
) -> Vec<(Option<Signal>, Option<FilterDecision>, ConfidenceState)> {
    bars.iter()
        .map(|bar| {
            let output = engine.process_bar(symbol, *bar).unwrap();
            (output.signal, output.decision, output.confidence)
        })
        .collect()
}

// ============================================================================
// Warm-up
// ============================================================================

#[test]
fn test_short_window_is_insufficient_data() {
    let engine = engine();
    let bars = breakout_bars();
    let min_lookback = engine.config().window.min_lookback;

    for bar in &bars[..min_lookback - 1] {
        match engine.ingest_bar("BTC", *bar) {
            Err(SignalError::InsufficientData { need, .. }) => assert_eq!(need, min_lookback),
            other => panic!("expected InsufficientData, got {:?}", other),
        }
    }
    assert!(engine.ingest_bar("BTC", bars[min_lookback - 1]).is_ok());
}

// ============================================================================
// Breakout
// ============================================================================

#[test]
fn test_gap_up_breakout_is_strong_up_signal() {
    let engine = engine();
    let bars = breakout_bars();
    let mut last = None;
    for bar in &bars {
        last = Some(engine.process_bar("BTC", *bar).unwrap());
    }
    let output = last.unwrap();
    assert_eq!(output.status, IngestStatus::Evaluated);

    let event = output.event.expect("close through the swing high");
    assert_eq!(event.kind, StructureKind::BreakOfStructure);
    assert_eq!(event.direction, Direction::Up);
    assert_eq!(event.price, 103.0);
    assert!(output.fresh_gap.is_some());

    let signal = output.signal.expect("breakout bar emits a signal");
    assert_eq!(signal.direction, Direction::Up);
    assert!(signal.stars >= 3, "expected >= 3 stars, got {}", signal.stars);
    assert_eq!(signal.price, 104.5);
    assert_eq!(signal.index, 9);

    let kinds: Vec<BoosterKind> = signal.components.boosters.iter().map(|b| b.kind).collect();
    assert!(kinds.contains(&BoosterKind::Continuation));
    assert!(kinds.contains(&BoosterKind::FreshGap));
    assert!(signal.components.bullish > signal.components.bearish);

    let decision = engine.get_filter_decision("btc", signal.id).unwrap();
    assert!(decision.shown);
    assert_eq!(output.decision, Some(decision));
}

// ============================================================================
// Ranging market
// ============================================================================

#[test]
fn test_ranging_market_stays_quiet() {
    let engine = engine();
    let results = run(&engine, "ETH", &ranging_bars(20));

    assert!(engine.structure_events("ETH").is_empty());
    let signals: Vec<&(Option<Signal>, Option<FilterDecision>, ConfidenceState)> =
        results.iter().filter(|r| r.0.is_some()).collect();
    assert!(signals.len() <= 1, "ranging bars produced {} signals", signals.len());
    for (signal, decision, _) in signals.iter().skip(1) {
        assert!(signal.is_some());
        assert!(!decision.as_ref().unwrap().shown);
    }
}

// ============================================================================
// Malformed input
// ============================================================================

#[test]
fn test_malformed_bar_does_not_disturb_pipeline() {
    let bars = breakout_bars();

    let clean = engine();
    let expected = run(&clean, "BTC", &bars);

    let dirty = engine();
    let mut results = run(&dirty, "BTC", &bars[..9]);
    let mut bad = bars[9];
    bad.volume = -5.0;
    assert!(matches!(
        dirty.ingest_bar("BTC", bad),
        Err(SignalError::MalformedBar(_))
    ));
    results.extend(run(&dirty, "BTC", &bars[9..]));

    assert_eq!(results, expected);
    assert_eq!(dirty.get_confidence("BTC"), clean.get_confidence("BTC"));
}

#[test]
fn test_out_of_order_timestamp_rejected() {
    let engine = engine();
    let bars = breakout_bars();
    engine.process_bar("BTC", bars[1]).unwrap();
    assert!(matches!(
        engine.process_bar("BTC", bars[0]),
        Err(SignalError::MalformedBar(_))
    ));
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_identical_input_gives_identical_output() {
    let bars = random_walk(42, 400);
    let a = engine();
    let b = engine();
    let first = run(&a, "SOL", &bars);
    let second = run(&b, "SOL", &bars);
    assert_eq!(first, second);
    assert_eq!(a.signals("SOL"), b.signals("SOL"));
}

#[test]
fn test_symbols_are_independent() {
    let engine = engine();
    let walk = random_walk(7, 200);
    let alone = {
        let solo = self::engine();
        run(&solo, "BTC", &walk)
    };

    // Interleave a second symbol; BTC's results must not change
    let other = random_walk(8, 200);
    let mut mixed = Vec::new();
    for (a, b) in walk.iter().zip(other.iter()) {
        let output = engine.process_bar("BTC", *a).unwrap();
        mixed.push((output.signal, output.decision, output.confidence));
        engine.process_bar("ETH", *b).unwrap();
    }
    assert_eq!(mixed, alone);
    assert_eq!(engine.symbols(), vec!["BTC".to_string(), "ETH".to_string()]);
}

// ============================================================================
// Properties over a long random walk
// ============================================================================

#[test]
fn test_sticky_filter_properties() {
    let engine = engine();
    let results = run(&engine, "BTC", &random_walk(3, 1_000));
    let emitted: Vec<(Signal, FilterDecision)> = results
        .into_iter()
        .filter_map(|(s, d, _)| Some((s?, d?)))
        .collect();
    assert!(!emitted.is_empty(), "random walk produced no signals");

    // First signal is always shown
    assert!(emitted[0].1.shown);
    assert_eq!(emitted[0].1.reason, FilterReason::Baseline);

    let mut last_shown: Option<&Signal> = None;
    for (signal, decision) in &emitted {
        assert_eq!(decision.signal_id, signal.id);
        if let Some(last) = last_shown {
            if signal.direction == last.direction
                && signal.grade <= last.grade
                && signal.stars <= last.stars
            {
                assert!(!decision.shown, "weaker same-direction signal {} shown", signal.id);
                assert_eq!(decision.reason, FilterReason::SameDirectionWeaker);
            }
        }
        if decision.shown {
            last_shown = Some(signal);
        }
    }

    // Ids are a per-symbol sequence
    for (n, (signal, _)) in emitted.iter().enumerate() {
        assert_eq!(signal.id, n as u64 + 1);
    }
}

#[test]
fn test_scores_and_confidence_stay_in_range() {
    let engine = engine();
    for (signal, _, confidence) in run(&engine, "BTC", &random_walk(11, 600)) {
        assert!((0.0..=1.0).contains(&confidence.composite));
        if let Some(signal) = signal {
            let m = signal.components.magnetism;
            assert!((0.6..=1.5).contains(&m), "magnetism {} out of bounds", m);
            assert!((0.0..=100.0).contains(&signal.composite_score));
            assert!(signal.stars <= 4);
            assert!((1..=10).contains(&signal.grade));
            assert_ne!(signal.direction, Direction::Neutral);
        }
    }
}

#[test]
fn test_preview_does_not_advance_filter() {
    let engine = engine();
    let bars = breakout_bars();
    run(&engine, "BTC", &bars);
    let signal = engine.signals("BTC").last().cloned().unwrap();

    let first = engine.preview_filter("BTC", &signal).unwrap();
    let second = engine.preview_filter("BTC", &signal).unwrap();
    assert_eq!(first, second);
    assert!(!first.shown);
    assert_eq!(first.reason, FilterReason::SameDirectionWeaker);
}

#[test]
fn test_evaluation_feeds_confidence() {
    let mut config = SignalConfig::default();
    config.evaluation.horizons_ms = vec![MINUTE];
    let engine = SignalEngine::new(config).unwrap();
    engine.start_session(0);

    let mut bars = breakout_bars();
    bars.push(Bar::new(10 * MINUTE, 104.5, 105.2, 104.3, 105.0, 300.0));
    run(&engine, "BTC", &bars);

    let before = engine.get_confidence("BTC").unwrap();
    assert_eq!(before.components.recent_accuracy, 0.5);

    let tape = engine.price_tape().clone();
    let touched = engine.advance_evaluation(10 * MINUTE, tape.as_ref());
    assert!(!touched.is_empty());
    for record in &touched {
        assert_eq!(record.final_result, sigil::types::EvaluationOutcome::Correct);
    }

    let after = engine.get_confidence("BTC").unwrap();
    assert_eq!(after.components.recent_accuracy, 1.0);
    assert!(after.composite > before.composite);
}
