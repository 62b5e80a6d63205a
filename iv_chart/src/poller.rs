// Producers feeding the scheduler: the periodic live poll and the one-shot
// bulk backfill. Both capture a ticket before fetching so a result for a
// symbol the user already left is dropped instead of drawn.

use crate::debug_hooks;
use crate::error::SourceError;
use crate::sample::Origin;
use crate::scheduler::UpdateScheduler;
use crate::sink::RenderSink;
use crate::source::{BulkLoader, DataSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

pub struct Poller {
    handle: JoinHandle<()>,
}

impl Poller {
    pub fn spawn<S, D>(scheduler: UpdateScheduler<S>, source: Arc<D>, every: Duration) -> Self
    where
        S: RenderSink,
        D: DataSource + ?Sized,
    {
        let handle = tokio::spawn(async move {
            let mut tick = interval(every);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut idle: u64 = 0;

            loop {
                tick.tick().await;
                let Some(ticket) = scheduler.ticket() else {
                    idle += 1;
                    debug_hooks::log_poll_idle(idle);
                    continue;
                };
                idle = 0;

                match source.fetch_series(ticket.symbol()).await {
                    Ok(batch) => {
                        scheduler.enqueue_with_ticket(&ticket, batch, Origin::Live);
                    }
                    Err(err) => debug_hooks::log_poll_failure(ticket.symbol(), &err),
                }
            }
        });
        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Loads history for the active symbol and queues it as a bulk batch.
/// Returns whether the batch was queued; `Ok(false)` means no symbol was
/// active or it changed while loading.
pub async fn backfill<S, L>(scheduler: &UpdateScheduler<S>, loader: &L) -> Result<bool, SourceError>
where
    S: RenderSink,
    L: BulkLoader + ?Sized,
{
    let Some(ticket) = scheduler.ticket() else {
        return Ok(false);
    };
    let batch = loader.load_bulk(ticket.symbol()).await?;
    Ok(scheduler.enqueue_with_ticket(&ticket, batch, Origin::Bulk))
}
