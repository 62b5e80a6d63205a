use thiserror::Error;

/// Batch-level rejection. Per-sample defects never surface here; they are
/// dropped and counted in `ValidationStats`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("batch has no timestamps")]
    EmptyBatch,
    #[error("array length mismatch: {field} has {found} entries, timestamps has {expected}")]
    ArrayLengthMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("no usable samples after filtering {dropped} entries")]
    EmptyAfterFiltering { dropped: usize },
}

impl ValidationError {
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::EmptyBatch => "empty_batch",
            ValidationError::ArrayLengthMismatch { .. } => "array_length_mismatch",
            ValidationError::EmptyAfterFiltering { .. } => "empty_after_filtering",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("render sink rejected series: {0}")]
pub struct RenderError(pub String);

/// Failures owned by producers. The scheduler never sees these; a failed fetch
/// is simply "no update this cycle".
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("payload decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error in {path}: {reason}")]
    Csv { path: String, reason: String },
}
