//! Tokio tasks driving the engine: one worker per symbol plus the
//! evaluation scheduler loop.

use dashmap::DashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::error::{Result, SignalError};
use crate::services::clock::Clock;
use crate::services::signals::{PipelineOutput, PriceLookup, SignalEngine};
use crate::types::{Bar, EvaluationRecord};

/// Bars buffered per symbol before `dispatch` waits.
pub const DEFAULT_QUEUE_DEPTH: usize = 256;

/// Something a worker or the evaluation loop produced.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Output(PipelineOutput),
    Rejected { symbol: String, error: String },
    Evaluated(EvaluationRecord),
}

/// One task per symbol, each fed by its own channel so a symbol's bars are
/// processed strictly in arrival order.
pub struct SymbolWorkers {
    engine: Arc<SignalEngine>,
    senders: DashMap<String, mpsc::Sender<Bar>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    events: mpsc::UnboundedSender<WorkerEvent>,
    queue_depth: usize,
}

impl SymbolWorkers {
    pub fn new(
        engine: Arc<SignalEngine>,
        events: mpsc::UnboundedSender<WorkerEvent>,
        queue_depth: usize,
    ) -> Self {
        Self {
            engine,
            senders: DashMap::new(),
            handles: Mutex::new(Vec::new()),
            events,
            queue_depth: queue_depth.max(1),
        }
    }

    /// Queue a bar for its symbol's worker, starting the worker if needed.
    pub async fn dispatch(&self, symbol: &str, bar: Bar) -> Result<()> {
        let key = symbol.to_uppercase();
        let sender = self
            .senders
            .entry(key.clone())
            .or_insert_with(|| self.spawn_worker(&key))
            .clone();
        sender
            .send(bar)
            .await
            .map_err(|_| SignalError::ChannelClosed(key))
    }

    pub fn worker_count(&self) -> usize {
        self.senders.len()
    }

    /// Close every channel and wait for the workers to drain.
    pub async fn shutdown(&self) {
        self.senders.clear();
        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        let count = handles.len();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Symbol worker ended abnormally: {}", e);
            }
        }
        info!("Stopped {} symbol workers", count);
    }

    fn spawn_worker(&self, symbol: &str) -> mpsc::Sender<Bar> {
        let (tx, mut rx) = mpsc::channel::<Bar>(self.queue_depth);
        let engine = Arc::clone(&self.engine);
        let events = self.events.clone();
        let symbol = symbol.to_string();

        debug!("Starting worker for {}", symbol);
        let handle = tokio::spawn(async move {
            while let Some(bar) = rx.recv().await {
                let event = match engine.process_bar(&symbol, bar) {
                    Ok(output) => WorkerEvent::Output(output),
                    Err(e) => WorkerEvent::Rejected {
                        symbol: symbol.clone(),
                        error: e.to_string(),
                    },
                };
                if events.send(event).is_err() {
                    debug!("Output channel closed, stopping worker for {}", symbol);
                    break;
                }
            }
        });
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
        tx
    }
}

/// Run `advance_evaluation` on every tick until shutdown.
pub fn spawn_evaluation_loop(
    engine: Arc<SignalEngine>,
    lookup: Arc<dyn PriceLookup>,
    clock: Arc<dyn Clock>,
    tick: Duration,
    mut shutdown: broadcast::Receiver<()>,
    events: mpsc::UnboundedSender<WorkerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Evaluation loop tick interval: {:?}", tick);
        let mut ticker = interval(tick);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = clock.now_ms();
                    for record in engine.advance_evaluation(now, lookup.as_ref()) {
                        let _ = events.send(WorkerEvent::Evaluated(record));
                    }
                }
                _ = shutdown.recv() => {
                    info!("Evaluation loop received shutdown signal");
                    break;
                }
            }
        }
    })
}
