use crate::error::RenderError;
use crate::sample::{Series, VisibleWindow};
use crate::time_norm::format_civil;

/// The chart widget as seen from the pipeline. Implementations are driven
/// only from the scheduler's consumer, one call at a time.
pub trait RenderSink: Send + 'static {
    fn apply_full(&mut self, series: &Series) -> Result<(), RenderError>;
    fn visible_window(&self) -> Option<VisibleWindow>;
    fn set_visible_window(&mut self, window: VisibleWindow);
    fn fit_all(&mut self);
    fn clear(&mut self);
}

/// In-memory sink for running without a widget. Tracks what a real chart
/// would display and logs each change.
#[derive(Debug, Default)]
pub struct HeadlessSink {
    series: Series,
    window: Option<VisibleWindow>,
    applies: u64,
}

impl HeadlessSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    pub fn applies(&self) -> u64 {
        self.applies
    }

    fn full_window(&self) -> Option<VisibleWindow> {
        match (self.series.first(), self.series.last()) {
            (Some(a), Some(b)) => Some(VisibleWindow::new(a.time, b.time)),
            _ => None,
        }
    }
}

impl RenderSink for HeadlessSink {
    fn apply_full(&mut self, series: &Series) -> Result<(), RenderError> {
        self.series = series.clone();
        self.applies += 1;
        if let Some(last) = series.last() {
            log::info!(
                target: "sink.headless",
                "applied {} points; last {} iv={:.2}%",
                series.len(),
                format_civil(last.time),
                last.value
            );
        }
        Ok(())
    }

    fn visible_window(&self) -> Option<VisibleWindow> {
        self.window
    }

    fn set_visible_window(&mut self, window: VisibleWindow) {
        log::debug!(
            target: "sink.headless",
            "visible window {} .. {}",
            format_civil(window.from),
            format_civil(window.to)
        );
        self.window = Some(window);
    }

    fn fit_all(&mut self) {
        self.window = self.full_window();
    }

    fn clear(&mut self) {
        self.series = Series::empty();
        self.window = None;
    }
}
