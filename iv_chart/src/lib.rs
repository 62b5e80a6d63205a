//! Streaming update pipeline for an implied-volatility chart: raw batches in,
//! a validated, trimmed series on the chart out, one pass at a time.

pub mod config;
pub mod crosshair;
pub mod debug_hooks;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod poller;
pub mod sample;
pub mod scheduler;
pub mod sink;
pub mod snapshot;
pub mod source;
pub mod time_norm;
pub mod trim;
pub mod validate;
pub mod viewport;

pub use config::PipelineConfig;
pub use crosshair::CrosshairIndex;
pub use error::{RenderError, SourceError, ValidationError};
pub use events::PipelineEvent;
pub use sample::{Origin, RawBatch, RawScalar, Sample, Series, Snapshot, UpdateRequest, VisibleWindow};
pub use scheduler::{SymbolTicket, UpdateScheduler};
pub use sink::{HeadlessSink, RenderSink};
pub use viewport::ViewportAction;
