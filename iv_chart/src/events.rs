use crate::error::ValidationError;
use crate::sample::Origin;
use crate::viewport::ViewportAction;

/// Notices surfaced to whoever drives the scheduler (status bar, logs, tests).
/// None of them are fatal; the pipeline keeps running after each.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Reset {
        symbol: String,
    },
    Applied {
        symbol: String,
        origin: Origin,
        points: usize,
        viewport: ViewportAction,
    },
    StaleDropped {
        symbol: String,
        origin: Origin,
    },
    // Batch rejected and the last good snapshot put back on the chart.
    Recovered {
        symbol: String,
        error: ValidationError,
    },
    // Batch rejected with nothing to fall back to.
    Rejected {
        symbol: String,
        error: ValidationError,
    },
    RenderWarning {
        symbol: String,
        message: String,
    },
}

impl PipelineEvent {
    pub fn symbol(&self) -> &str {
        match self {
            PipelineEvent::Reset { symbol }
            | PipelineEvent::Applied { symbol, .. }
            | PipelineEvent::StaleDropped { symbol, .. }
            | PipelineEvent::Recovered { symbol, .. }
            | PipelineEvent::Rejected { symbol, .. }
            | PipelineEvent::RenderWarning { symbol, .. } => symbol,
        }
    }
}
