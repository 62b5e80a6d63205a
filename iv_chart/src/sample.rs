use serde::{Deserialize, Serialize};

/// One observation of the implied-volatility curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: i64, // epoch seconds, civil wall-clock frame
    pub value: f64, // IV in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux_a: Option<f64>, // option close
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux_b: Option<f64>, // futures close
}

/// Strictly increasing (by `time`) run of samples.
///
/// Built only by the validator and trimmer, so the ordering and uniqueness
/// invariants hold for every value of this type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    samples: Vec<Sample>,
}

impl Series {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Caller guarantees `samples` is strictly increasing by time.
    pub(crate) fn from_sorted(samples: Vec<Sample>) -> Self {
        debug_assert!(samples.windows(2).all(|w| w[0].time < w[1].time));
        Self { samples }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn last_time(&self) -> Option<i64> {
        self.samples.last().map(|s| s.time)
    }

    pub(crate) fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}

/// A JSON scalar as the feed delivers it: timestamps arrive either as civil
/// strings or as numeric epochs, values sometimes as numeric strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawScalar {
    Number(f64),
    Text(String),
    // null, bool, array or object: kept so one bad cell drops one sample,
    // not the whole payload.
    Other(serde_json::Value),
}

impl RawScalar {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawScalar::Number(n) => Some(*n),
            RawScalar::Text(s) => s.trim().parse::<f64>().ok(),
            RawScalar::Other(_) => None,
        }
    }
}

impl From<f64> for RawScalar {
    fn from(n: f64) -> Self {
        RawScalar::Number(n)
    }
}

impl From<i64> for RawScalar {
    fn from(n: i64) -> Self {
        RawScalar::Number(n as f64)
    }
}

impl From<&str> for RawScalar {
    fn from(s: &str) -> Self {
        RawScalar::Text(s.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBatch {
    pub symbol: String,
    pub timestamps: Vec<RawScalar>,
    pub values: Vec<Option<RawScalar>>,
    #[serde(default)]
    pub aux_a: Option<Vec<Option<RawScalar>>>,
    #[serde(default)]
    pub aux_b: Option<Vec<Option<RawScalar>>>,
}

impl RawBatch {
    pub fn new(
        symbol: impl Into<String>,
        timestamps: Vec<RawScalar>,
        values: Vec<Option<RawScalar>>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamps,
            values,
            aux_a: None,
            aux_b: None,
        }
    }

    pub fn with_aux(
        mut self,
        aux_a: Option<Vec<Option<RawScalar>>>,
        aux_b: Option<Vec<Option<RawScalar>>>,
    ) -> Self {
        self.aux_a = aux_a;
        self.aux_b = aux_b;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    Live,
    Bulk,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Live => "live",
            Origin::Bulk => "bulk",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub symbol: String,
    pub batch: RawBatch,
    pub origin: Origin,
    // Symbol epoch the request belongs to; stamped by the scheduler.
    pub(crate) epoch: Option<u64>,
}

impl UpdateRequest {
    pub fn new(symbol: impl Into<String>, batch: RawBatch, origin: Origin) -> Self {
        Self {
            symbol: symbol.into(),
            batch,
            origin,
            epoch: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub symbol: String,
    pub series: Series,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleWindow {
    pub from: i64,
    pub to: i64,
}

impl VisibleWindow {
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }
}
