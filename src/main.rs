//! Sigil replay - feeds bars through the signal engine and reports how shown
//! and hidden signals fared.

use std::io::{BufRead, BufReader};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sigil::config::{ReplayConfig, SignalConfig};
use sigil::services::workers::DEFAULT_QUEUE_DEPTH;
use sigil::services::{
    spawn_evaluation_loop, Clock, PriceLookup, SignalEngine, SymbolWorkers, WatermarkClock,
    WorkerEvent,
};
use sigil::types::Bar;

/// One line of a JSON-lines feed.
#[derive(Debug, Deserialize)]
struct FeedLine {
    symbol: String,
    bar: Bar,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sigil=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = SignalConfig::from_env()?;
    let replay = ReplayConfig::from_env();

    let feed = match &replay.feed_path {
        Some(path) => load_feed(path)?,
        None => synthetic_feed(&replay),
    };
    let (first_ts, last_ts) = match (feed.first(), feed.last()) {
        (Some((_, first)), Some((_, last))) => (first.timestamp, last.timestamp),
        _ => {
            warn!("Feed is empty, nothing to replay");
            return Ok(());
        }
    };
    info!("Replaying {} bars", feed.len());

    let engine = Arc::new(SignalEngine::new(config)?);
    let session_id = engine.start_session(first_ts);
    info!("Session {} started", session_id);

    // Advanced by processed bars, not dispatched ones
    let clock = Arc::new(WatermarkClock::new(first_ts));
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let workers = SymbolWorkers::new(Arc::clone(&engine), events_tx.clone(), DEFAULT_QUEUE_DEPTH);
    let lookup: Arc<dyn PriceLookup> = engine.price_tape().clone();
    let evaluation = spawn_evaluation_loop(
        Arc::clone(&engine),
        Arc::clone(&lookup),
        clock.clone() as Arc<dyn Clock>,
        Duration::from_millis(replay.evaluation_tick_ms.max(1)),
        shutdown_tx.subscribe(),
        events_tx,
    );

    // Print signals and resolved records as JSON lines
    let printer_clock = Arc::clone(&clock);
    let printer = tokio::spawn(async move {
        let mut shown = 0u64;
        let mut hidden = 0u64;
        while let Some(event) = events_rx.recv().await {
            match event {
                WorkerEvent::Output(output) => {
                    printer_clock.observe(&output.symbol, output.bar.timestamp);
                    if let (Some(signal), Some(decision)) = (&output.signal, &output.decision) {
                        if decision.shown {
                            shown += 1;
                        } else {
                            hidden += 1;
                        }
                        let line = serde_json::json!({
                            "type": "signal",
                            "signal": signal,
                            "decision": decision,
                            "confidence": output.confidence,
                        });
                        println!("{}", line);
                    }
                }
                WorkerEvent::Rejected { symbol, error } => {
                    warn!("{}: {}", symbol, error);
                }
                WorkerEvent::Evaluated(record) => {
                    if record.is_frozen() {
                        let line = serde_json::json!({ "type": "evaluation", "record": record });
                        println!("{}", line);
                    }
                }
            }
        }
        (shown, hidden)
    });

    for (symbol, bar) in feed {
        workers.dispatch(&symbol, bar).await?;
    }

    workers.shutdown().await;
    let _ = shutdown_tx.send(());
    if let Err(e) = evaluation.await {
        warn!("Evaluation loop ended abnormally: {}", e);
    }
    drop(workers);

    let report = engine.end_session(last_ts, lookup.as_ref())?;
    let (shown, hidden) = printer.await?;
    info!("{} signals shown, {} hidden", shown, hidden);
    println!(
        "{}",
        serde_json::json!({ "type": "session_report", "report": report })
    );

    Ok(())
}

/// Read a JSON-lines feed, skipping blank lines.
fn load_feed(path: &str) -> anyhow::Result<Vec<(String, Bar)>> {
    let file = std::fs::File::open(path)?;
    let mut feed = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<FeedLine>(&line) {
            Ok(entry) => feed.push((entry.symbol, entry.bar)),
            Err(e) => warn!("Skipping feed line {}: {}", n + 1, e),
        }
    }
    feed.sort_by_key(|(_, bar)| bar.timestamp);
    Ok(feed)
}

/// Seeded random walk with occasional volume bursts, interleaved by time.
fn synthetic_feed(replay: &ReplayConfig) -> Vec<(String, Bar)> {
    let mut rng = StdRng::seed_from_u64(replay.seed);
    let start = chrono::Utc::now().timestamp_millis() / replay.bar_interval_ms * replay.bar_interval_ms;
    let mut prices: Vec<f64> = replay
        .symbols
        .iter()
        .map(|_| rng.gen_range(50.0..5_000.0))
        .collect();

    let mut feed = Vec::with_capacity(replay.synthetic_bars * replay.symbols.len());
    for i in 0..replay.synthetic_bars {
        let timestamp = start + i as i64 * replay.bar_interval_ms;
        for (symbol, price) in replay.symbols.iter().zip(prices.iter_mut()) {
            let open = *price;
            let close = (open * (1.0 + rng.gen_range(-0.006..0.006))).max(0.01);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.003));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.003));
            let burst = if rng.gen_bool(0.1) { 3.0 } else { 1.0 };
            let volume = rng.gen_range(500.0..1_500.0) * burst;
            *price = close;
            feed.push((
                symbol.clone(),
                Bar::new(timestamp, open, high, low, close, volume),
            ));
        }
    }
    feed
}
