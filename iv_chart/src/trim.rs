use crate::sample::Series;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimReport {
    pub retention_dropped: usize,
    pub flat_dropped: usize,
}

pub fn trim(series: Series, max_len: usize, flat_epsilon: f64) -> Series {
    trim_with_report(series, max_len, flat_epsilon).0
}

/// Retention first, then the stalled-tail cut. Samples that survive are never
/// touched; only the head and tail are cut away.
pub fn trim_with_report(series: Series, max_len: usize, flat_epsilon: f64) -> (Series, TrimReport) {
    let mut samples = series.into_samples();
    let mut report = TrimReport::default();

    let max_len = max_len.max(1);
    if samples.len() > max_len {
        report.retention_dropped = samples.len() - max_len;
        samples.drain(..report.retention_dropped);
    }

    let run = flat_tail_len(&samples, flat_epsilon);
    let len = samples.len();
    if run < len && run * 10 > len {
        // Keep the first sample of the run as its anchor.
        let keep = len - run + 1;
        report.flat_dropped = len - keep;
        samples.truncate(keep);
    }

    (Series::from_sorted(samples), report)
}

/// Length of the trailing run whose consecutive values differ by less than
/// `eps`, counting the run's first sample. A lone last sample is a run of 1.
fn flat_tail_len(samples: &[crate::sample::Sample], eps: f64) -> usize {
    if samples.is_empty() {
        return 0;
    }
    let mut run = 1;
    for pair in samples.windows(2).rev() {
        if (pair[1].value - pair[0].value).abs() < eps {
            run += 1;
        } else {
            break;
        }
    }
    run
}
