use crate::config::PipelineConfig;
use crate::crosshair::CrosshairIndex;
use crate::debug_hooks;
use crate::events::PipelineEvent;
use crate::pipeline::Pipeline;
use crate::sample::{Origin, RawBatch, Snapshot, UpdateRequest};
use crate::sink::RenderSink;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Proof that a producer read the active symbol at a given moment. Results
/// carried under a ticket are dropped once the symbol has moved on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTicket {
    symbol: String,
    epoch: u64,
}

impl SymbolTicket {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

#[derive(Debug)]
enum Job {
    Reset { symbol: String, epoch: u64 },
    Apply(UpdateRequest),
}

#[derive(Debug, Default)]
struct QueueState {
    active: Option<String>,
    epoch: u64,
    pending: VecDeque<Job>,
    consuming: bool,
}

impl QueueState {
    fn is_current(&self, symbol: &str, epoch: Option<u64>) -> bool {
        self.active.as_deref() == Some(symbol) && epoch.map_or(true, |e| e == self.epoch)
    }

    /// Drops every queued apply and schedules a reset for `symbol`.
    fn switch_to(&mut self, symbol: &str) -> SymbolTicket {
        let dropped = self
            .pending
            .iter()
            .filter(|job| matches!(job, Job::Apply(_)))
            .count();
        debug_hooks::log_symbol_switch(self.active.as_deref(), symbol, dropped);

        self.epoch += 1;
        self.active = Some(symbol.to_string());
        self.pending.clear();
        self.pending.push_back(Job::Reset {
            symbol: symbol.to_string(),
            epoch: self.epoch,
        });
        SymbolTicket {
            symbol: symbol.to_string(),
            epoch: self.epoch,
        }
    }
}

struct Inner<S: RenderSink> {
    queue: Mutex<QueueState>,
    pipeline: tokio::sync::Mutex<Pipeline<S>>,
    busy: watch::Sender<bool>,
    events: mpsc::Sender<PipelineEvent>,
    crosshair: watch::Receiver<Arc<CrosshairIndex>>,
    snapshot: watch::Receiver<Option<Arc<Snapshot>>>,
    settle_delay: Duration,
}

impl<S: RenderSink> Inner<S> {
    fn lock_queue(&self) -> MutexGuard<'_, QueueState> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    // Never waits on the reader: with the buffer full the event is logged
    // and dropped.
    fn emit(&self, event: PipelineEvent) {
        if let Err(mpsc::error::TrySendError::Full(ev)) = self.events.try_send(event) {
            debug_hooks::log_event_overflow(ev.symbol());
        }
    }
}

/// Serializes every update through one pipeline. Producers call `enqueue`
/// from any task; a single consumer drains the queue in FIFO order, so two
/// passes never overlap.
pub struct UpdateScheduler<S: RenderSink> {
    inner: Arc<Inner<S>>,
}

impl<S: RenderSink> Clone for UpdateScheduler<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: RenderSink> UpdateScheduler<S> {
    /// Must be called inside a tokio runtime; the consumer is spawned lazily
    /// on the first enqueue. The receiver holds at most `cfg.event_buffer`
    /// undrained events; later ones are dropped until it is read.
    pub fn new(sink: S, cfg: &PipelineConfig) -> (Self, mpsc::Receiver<PipelineEvent>) {
        let pipeline = Pipeline::new(sink, cfg);
        let crosshair = pipeline.subscribe_crosshair();
        let snapshot = pipeline.subscribe_snapshot();
        let (events, events_rx) = mpsc::channel(cfg.event_buffer.max(1));
        let (busy, _) = watch::channel(false);

        let inner = Inner {
            queue: Mutex::new(QueueState::default()),
            pipeline: tokio::sync::Mutex::new(pipeline),
            busy,
            events,
            crosshair,
            snapshot,
            settle_delay: cfg.settle_delay(),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            events_rx,
        )
    }

    pub fn active_symbol(&self) -> Option<String> {
        self.inner.lock_queue().active.clone()
    }

    pub fn ticket(&self) -> Option<SymbolTicket> {
        let q = self.inner.lock_queue();
        q.active.as_ref().map(|symbol| SymbolTicket {
            symbol: symbol.clone(),
            epoch: q.epoch,
        })
    }

    /// Makes `symbol` active. Same symbol is a no-op and keeps the queue.
    pub fn switch_symbol(&self, symbol: &str) -> SymbolTicket {
        let ticket = {
            let mut q = self.inner.lock_queue();
            if q.active.as_deref() == Some(symbol) {
                return SymbolTicket {
                    symbol: symbol.to_string(),
                    epoch: q.epoch,
                };
            }
            q.switch_to(symbol)
        };
        self.kick();
        ticket
    }

    /// Queues `request`. A request naming a different symbol than the active
    /// one is a switch: everything still queued is dropped first.
    pub fn enqueue(&self, mut request: UpdateRequest) {
        {
            let mut q = self.inner.lock_queue();
            if q.active.as_deref() != Some(request.symbol.as_str()) {
                q.switch_to(&request.symbol);
            }
            request.epoch = Some(q.epoch);
            q.pending.push_back(Job::Apply(request));
        }
        self.kick();
    }

    /// Queues a producer result unless the symbol moved on since the ticket
    /// was taken. Never switches the active symbol.
    pub fn enqueue_with_ticket(&self, ticket: &SymbolTicket, batch: RawBatch, origin: Origin) -> bool {
        {
            let mut q = self.inner.lock_queue();
            if !q.is_current(&ticket.symbol, Some(ticket.epoch)) {
                debug_hooks::log_stale_drop(&ticket.symbol, origin, q.active.as_deref());
                drop(q);
                self.inner.emit(PipelineEvent::StaleDropped {
                    symbol: ticket.symbol.clone(),
                    origin,
                });
                return false;
            }
            let mut request = UpdateRequest::new(ticket.symbol.clone(), batch, origin);
            request.epoch = Some(ticket.epoch);
            q.pending.push_back(Job::Apply(request));
        }
        self.kick();
        true
    }

    pub fn pending(&self) -> usize {
        self.inner.lock_queue().pending.len()
    }

    /// Resolves once the queue is drained and no pass is running.
    pub async fn flush(&self) {
        let mut rx = self.inner.busy.subscribe();
        let _ = rx.wait_for(|busy| !*busy).await;
    }

    pub fn crosshair(&self) -> Arc<CrosshairIndex> {
        self.inner.crosshair.borrow().clone()
    }

    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.snapshot.borrow().clone()
    }

    /// Change feed for the crosshair tooltip; fires once per committed pass
    /// and on every reset.
    pub fn watch_crosshair(&self) -> watch::Receiver<Arc<CrosshairIndex>> {
        self.inner.crosshair.clone()
    }

    /// Runs `f` against the sink between passes.
    pub async fn with_sink<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let pipeline = self.inner.pipeline.lock().await;
        f(pipeline.sink())
    }

    fn kick(&self) {
        {
            let mut q = self.inner.lock_queue();
            if q.consuming || q.pending.is_empty() {
                return;
            }
            q.consuming = true;
            // Flipped under the queue lock so it cannot interleave with the
            // consumer going idle.
            self.inner.busy.send_replace(true);
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { consume(inner).await });
    }
}

async fn consume<S: RenderSink>(inner: Arc<Inner<S>>) {
    loop {
        let job = {
            let mut q = inner.lock_queue();
            match q.pending.pop_front() {
                Some(job) => job,
                None => {
                    q.consuming = false;
                    inner.busy.send_replace(false);
                    return;
                }
            }
        };

        // Staleness is judged only once the pipeline is ours; a switch made
        // while waiting for the lock must still win.
        match job {
            Job::Reset { symbol, epoch } => {
                let mut pipeline = inner.pipeline.lock().await;
                if !inner.lock_queue().is_current(&symbol, Some(epoch)) {
                    continue;
                }
                pipeline.reset(&symbol);
                drop(pipeline);
                inner.emit(PipelineEvent::Reset { symbol });
                // Let the widget settle before the first batch lands.
                if !inner.settle_delay.is_zero() {
                    tokio::time::sleep(inner.settle_delay).await;
                }
            }
            Job::Apply(request) => {
                let mut pipeline = inner.pipeline.lock().await;
                let current = inner.lock_queue().is_current(&request.symbol, request.epoch);
                let event = if current {
                    pipeline.process(&request)
                } else {
                    let active = inner.lock_queue().active.clone();
                    debug_hooks::log_stale_drop(&request.symbol, request.origin, active.as_deref());
                    PipelineEvent::StaleDropped {
                        symbol: request.symbol.clone(),
                        origin: request.origin,
                    }
                };
                drop(pipeline);
                inner.emit(event);
            }
        }
    }
}
