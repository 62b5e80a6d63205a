use crate::sample::{Sample, Series};

pub const DEFAULT_TOLERANCE_SECS: i64 = 60;

/// Point lookup for the crosshair tooltip. Rebuilt from every accepted series,
/// never patched in place.
#[derive(Debug, Clone)]
pub struct CrosshairIndex {
    samples: Vec<Sample>,
    tolerance_secs: i64,
}

impl Default for CrosshairIndex {
    fn default() -> Self {
        Self::empty(DEFAULT_TOLERANCE_SECS)
    }
}

impl CrosshairIndex {
    pub fn empty(tolerance_secs: i64) -> Self {
        Self {
            samples: Vec::new(),
            tolerance_secs: tolerance_secs.max(0),
        }
    }

    pub fn build(series: &Series, tolerance_secs: i64) -> Self {
        Self {
            samples: series.samples().to_vec(),
            tolerance_secs: tolerance_secs.max(0),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Closest sample to `time` if it lies within the tolerance. Equidistant
    /// neighbours resolve to the earlier one.
    pub fn nearest(&self, time: i64) -> Option<&Sample> {
        let idx = self.samples.partition_point(|s| s.time < time);
        let after = self.samples.get(idx);
        let before = idx.checked_sub(1).and_then(|i| self.samples.get(i));

        let best = match (before, after) {
            (Some(b), Some(a)) => {
                if time.abs_diff(b.time) <= a.time.abs_diff(time) {
                    b
                } else {
                    a
                }
            }
            (Some(b), None) => b,
            (None, Some(a)) => a,
            (None, None) => return None,
        };

        (best.time.abs_diff(time) <= self.tolerance_secs as u64).then_some(best)
    }
}
