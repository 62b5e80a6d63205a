use crate::config::PipelineConfig;
use crate::crosshair::CrosshairIndex;
use crate::debug_hooks;
use crate::error::{RenderError, ValidationError};
use crate::events::PipelineEvent;
use crate::sample::{Series, Snapshot, UpdateRequest};
use crate::sink::RenderSink;
use crate::snapshot::SnapshotStore;
use crate::trim;
use crate::validate::{self, Validated};
use crate::viewport::{ViewportAction, ViewportPreserver};
use std::sync::Arc;
use tokio::sync::watch;

/// Everything one pass mutates. Owned by the scheduler and touched only from
/// its consumer task.
pub struct Pipeline<S: RenderSink> {
    sink: S,
    symbol: Option<String>,
    snapshots: SnapshotStore,
    viewport: ViewportPreserver,

    max_points: usize,
    flat_epsilon: f64,
    crosshair_tolerance_secs: i64,

    crosshair_tx: watch::Sender<Arc<CrosshairIndex>>,
    snapshot_tx: watch::Sender<Option<Arc<Snapshot>>>,
}

impl<S: RenderSink> Pipeline<S> {
    pub fn new(sink: S, cfg: &PipelineConfig) -> Self {
        let (crosshair_tx, _) =
            watch::channel(Arc::new(CrosshairIndex::empty(cfg.crosshair_tolerance_secs)));
        let (snapshot_tx, _) = watch::channel(None);
        Self {
            sink,
            symbol: None,
            snapshots: SnapshotStore::new(),
            viewport: ViewportPreserver::new(cfg.follow_tolerance_secs, cfg.follow_points),
            max_points: cfg.max_points,
            flat_epsilon: cfg.flat_epsilon,
            crosshair_tolerance_secs: cfg.crosshair_tolerance_secs,
            crosshair_tx,
            snapshot_tx,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    pub fn subscribe_crosshair(&self) -> watch::Receiver<Arc<CrosshairIndex>> {
        self.crosshair_tx.subscribe()
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.snapshot_tx.subscribe()
    }

    pub fn reset(&mut self, symbol: &str) {
        self.symbol = Some(symbol.to_string());
        self.snapshots.clear();
        self.crosshair_tx
            .send_replace(Arc::new(CrosshairIndex::empty(self.crosshair_tolerance_secs)));
        self.snapshot_tx.send_replace(None);
        self.sink.clear();
        debug_hooks::log_reset(symbol);
    }

    /// One full pass: validate, trim, draw, commit, then place the viewport.
    /// Never fails; the outcome is reported as an event.
    pub fn process(&mut self, request: &UpdateRequest) -> PipelineEvent {
        let symbol = request.symbol.as_str();
        if self.symbol.as_deref() != Some(symbol) {
            debug_hooks::log_stale_drop(symbol, request.origin, self.symbol.as_deref());
            return PipelineEvent::StaleDropped {
                symbol: symbol.to_string(),
                origin: request.origin,
            };
        }

        let Validated { series, stats } = match validate::validate_with_stats(&request.batch) {
            Ok(v) => v,
            Err(error) => return self.fall_back(request, error),
        };
        let (series, trim_report) = trim::trim_with_report(series, self.max_points, self.flat_epsilon);

        // Read before the swap; the sink may move its range when data changes.
        let previous = self.sink.visible_window();
        let previously_empty = self.snapshots.is_empty_for(symbol);

        if let Err(err) = self.apply_with_retry(symbol, &series) {
            return PipelineEvent::RenderWarning {
                symbol: symbol.to_string(),
                message: err.to_string(),
            };
        }

        debug_hooks::log_apply(
            symbol,
            request.origin,
            &stats,
            &trim_report,
            series.len(),
            series.last_time(),
        );

        let action = self.viewport.decide(previous, previously_empty, &series);
        let points = series.len();
        let snap = self.commit(symbol, series);
        self.apply_viewport(action, &snap.series);

        PipelineEvent::Applied {
            symbol: symbol.to_string(),
            origin: request.origin,
            points,
            viewport: action,
        }
    }

    fn commit(&mut self, symbol: &str, series: Series) -> Arc<Snapshot> {
        let index = CrosshairIndex::build(&series, self.crosshair_tolerance_secs);
        let snap = self.snapshots.replace(symbol, series);
        self.crosshair_tx.send_replace(Arc::new(index));
        self.snapshot_tx.send_replace(Some(snap.clone()));
        snap
    }

    fn fall_back(&mut self, request: &UpdateRequest, error: ValidationError) -> PipelineEvent {
        let symbol = request.symbol.as_str();
        let Some(snap) = self.snapshots.for_symbol(symbol).cloned() else {
            debug_hooks::log_rejected(symbol, request.origin, &error, false);
            return PipelineEvent::Rejected {
                symbol: symbol.to_string(),
                error,
            };
        };

        debug_hooks::log_rejected(symbol, request.origin, &error, true);
        let window = self.sink.visible_window();
        if let Err(err) = self.apply_with_retry(symbol, &snap.series) {
            return PipelineEvent::RenderWarning {
                symbol: symbol.to_string(),
                message: err.to_string(),
            };
        }
        if let Some(w) = window {
            self.sink.set_visible_window(w);
        }
        PipelineEvent::Recovered {
            symbol: symbol.to_string(),
            error,
        }
    }

    fn apply_with_retry(&mut self, symbol: &str, series: &Series) -> Result<(), RenderError> {
        match self.sink.apply_full(series) {
            Ok(()) => Ok(()),
            Err(first) => {
                debug_hooks::log_render_retry(symbol, first.to_string());
                self.sink.apply_full(series).map_err(|err| {
                    debug_hooks::log_render_gave_up(symbol, err.to_string());
                    err
                })
            }
        }
    }

    fn apply_viewport(&mut self, action: ViewportAction, series: &Series) {
        match action {
            ViewportAction::FitAll => self.sink.fit_all(),
            ViewportAction::KeepWindow(w) => self.sink.set_visible_window(w),
            ViewportAction::AdvanceToLatest => match self.viewport.latest_window(series) {
                Some(w) => self.sink.set_visible_window(w),
                None => self.sink.fit_all(),
            },
        }
    }
}
