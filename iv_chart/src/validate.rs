use crate::error::ValidationError;
use crate::sample::{RawBatch, RawScalar, Sample, Series};
use crate::time_norm;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub accepted: usize,
    pub bad_timestamps: usize,
    pub bad_values: usize,
    pub duplicates: usize,
}

impl ValidationStats {
    pub fn dropped(&self) -> usize {
        self.bad_timestamps + self.bad_values
    }
}

#[derive(Debug, Clone)]
pub struct Validated {
    pub series: Series,
    pub stats: ValidationStats,
}

pub fn validate(batch: &RawBatch) -> Result<Series, ValidationError> {
    validate_with_stats(batch).map(|v| v.series)
}

pub fn validate_with_stats(batch: &RawBatch) -> Result<Validated, ValidationError> {
    let n = batch.timestamps.len();
    if n == 0 {
        return Err(ValidationError::EmptyBatch);
    }
    check_len("values", n, batch.values.len())?;
    let aux_a = present_aux(batch.aux_a.as_deref());
    let aux_b = present_aux(batch.aux_b.as_deref());
    if let Some(a) = aux_a {
        check_len("aux_a", n, a.len())?;
    }
    if let Some(b) = aux_b {
        check_len("aux_b", n, b.len())?;
    }

    let mut stats = ValidationStats::default();

    // Pass 1: collect keyed by time; a later entry overwrites an earlier one.
    let mut by_time: BTreeMap<i64, Sample> = BTreeMap::new();
    for (i, raw_ts) in batch.timestamps.iter().enumerate() {
        let Some(time) = time_norm::normalize(raw_ts) else {
            stats.bad_timestamps += 1;
            continue;
        };
        let Some(value) = batch.values[i].as_ref().and_then(parse_value) else {
            stats.bad_values += 1;
            continue;
        };

        let sample = Sample {
            time,
            value,
            aux_a: aux_a.and_then(|a| aux_at(a, i)),
            aux_b: aux_b.and_then(|b| aux_at(b, i)),
        };
        if by_time.insert(time, sample).is_some() {
            stats.duplicates += 1;
        }
    }

    if by_time.is_empty() {
        return Err(ValidationError::EmptyAfterFiltering {
            dropped: stats.dropped(),
        });
    }

    // Pass 2: the map iterates in ascending time order.
    let samples: Vec<Sample> = by_time.into_values().collect();
    stats.accepted = samples.len();
    Ok(Validated {
        series: Series::from_sorted(samples),
        stats,
    })
}

fn check_len(field: &'static str, expected: usize, found: usize) -> Result<(), ValidationError> {
    if expected != found {
        return Err(ValidationError::ArrayLengthMismatch {
            field,
            expected,
            found,
        });
    }
    Ok(())
}

// The live endpoint sends `[]` for a column it does not have.
fn present_aux(aux: Option<&[Option<RawScalar>]>) -> Option<&[Option<RawScalar>]> {
    aux.filter(|a| !a.is_empty())
}

fn parse_value(raw: &RawScalar) -> Option<f64> {
    raw.as_f64().filter(|v| v.is_finite() && *v >= 0.0)
}

fn aux_at(aux: &[Option<RawScalar>], i: usize) -> Option<f64> {
    aux[i]
        .as_ref()
        .and_then(RawScalar::as_f64)
        .filter(|v| v.is_finite())
}
