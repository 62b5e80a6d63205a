use crate::sample::{Series, VisibleWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportAction {
    FitAll,
    KeepWindow(VisibleWindow),
    AdvanceToLatest,
}

impl ViewportAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewportAction::FitAll => "fit_all",
            ViewportAction::KeepWindow(_) => "keep_window",
            ViewportAction::AdvanceToLatest => "advance_to_latest",
        }
    }
}

/// Decides whether an update should leave the viewer where they are or follow
/// the live edge.
#[derive(Debug, Clone, Copy)]
pub struct ViewportPreserver {
    follow_tolerance_secs: i64,
    follow_points: usize,
}

impl Default for ViewportPreserver {
    fn default() -> Self {
        Self::new(5 * 60, 50)
    }
}

impl ViewportPreserver {
    pub fn new(follow_tolerance_secs: i64, follow_points: usize) -> Self {
        Self {
            follow_tolerance_secs: follow_tolerance_secs.max(0),
            follow_points: follow_points.max(2),
        }
    }

    pub fn decide(
        &self,
        previous: Option<VisibleWindow>,
        previously_empty: bool,
        series: &Series,
    ) -> ViewportAction {
        let (Some(prev), false) = (previous, previously_empty) else {
            return ViewportAction::FitAll;
        };
        let Some(last) = series.last_time() else {
            return ViewportAction::FitAll;
        };

        // A window reaching past the last sample is also at the live edge.
        if last - prev.to <= self.follow_tolerance_secs {
            ViewportAction::AdvanceToLatest
        } else {
            ViewportAction::KeepWindow(prev)
        }
    }

    /// Window covering the newest `follow_points` samples, or `None` when the
    /// whole series fits and the sink should just fit everything.
    pub fn latest_window(&self, series: &Series) -> Option<VisibleWindow> {
        let samples = series.samples();
        if samples.len() <= self.follow_points {
            return None;
        }
        let from = samples[samples.len() - self.follow_points].time;
        let to = samples[samples.len() - 1].time;
        Some(VisibleWindow::new(from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Sample;

    const T0: i64 = 1_735_722_900;

    fn series_minutes(n: usize) -> Series {
        Series::from_sorted(
            (0..n)
                .map(|i| Sample {
                    time: T0 + 60 * i as i64,
                    value: 12.0,
                    aux_a: None,
                    aux_b: None,
                })
                .collect(),
        )
    }

    #[test]
    fn first_series_fits_all() {
        let vp = ViewportPreserver::default();
        let s = series_minutes(10);
        assert_eq!(vp.decide(None, false, &s), ViewportAction::FitAll);
        let w = VisibleWindow::new(T0, T0 + 600);
        assert_eq!(vp.decide(Some(w), true, &s), ViewportAction::FitAll);
    }

    #[test]
    fn caught_up_viewer_follows_latest() {
        let vp = ViewportPreserver::default();
        let s = series_minutes(100); // last = T0 + 99 min
        let last = s.last_time().unwrap();
        let near = VisibleWindow::new(last - 3600, last - 240);
        assert_eq!(vp.decide(Some(near), false, &s), ViewportAction::AdvanceToLatest);
        let ahead = VisibleWindow::new(last - 600, last + 720);
        assert_eq!(vp.decide(Some(ahead), false, &s), ViewportAction::AdvanceToLatest);
    }

    #[test]
    fn panned_away_viewer_keeps_window() {
        let vp = ViewportPreserver::default();
        let s = series_minutes(100);
        let history = VisibleWindow::new(T0, T0 + 1800);
        assert_eq!(
            vp.decide(Some(history), false, &s),
            ViewportAction::KeepWindow(history)
        );
    }

    #[test]
    fn latest_window_spans_last_points() {
        let vp = ViewportPreserver::new(300, 50);
        assert_eq!(vp.latest_window(&series_minutes(30)), None);
        let s = series_minutes(120);
        let w = vp.latest_window(&s).unwrap();
        assert_eq!(w.to, s.last_time().unwrap());
        assert_eq!(w.from, s.samples()[70].time);
    }
}
