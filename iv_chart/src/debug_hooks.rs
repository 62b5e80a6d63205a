// Topic-scoped log helpers. Hot paths (every poll, every applied batch) are
// rate limited so a 2s poll does not flood the log at debug level.

use crate::error::ValidationError;
use crate::sample::Origin;
use crate::time_norm::format_civil;
use crate::trim::TrimReport;
use crate::validate::ValidationStats;
use std::sync::atomic::{AtomicU64, Ordering};

fn sampled(counter: &AtomicU64, first: u64, every: u64) -> Option<u64> {
    let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
    (n <= first || n % every == 0).then_some(n)
}

pub fn log_symbol_switch(from: Option<&str>, to: &str, dropped: usize) {
    log::info!(
        target: "scheduler.symbol",
        "active symbol {} -> {to}; dropped {dropped} queued request(s)",
        from.unwrap_or("(none)")
    );
}

pub fn log_stale_drop(symbol: &str, origin: Origin, active: Option<&str>) {
    log::debug!(
        target: "scheduler.stale",
        "discarding {} batch for {symbol}; active={}",
        origin.as_str(),
        active.unwrap_or("(none)")
    );
}

pub fn log_reset(symbol: &str) {
    log::debug!(target: "pipeline.reset", "cleared series, snapshot and crosshair for {symbol}");
}

pub fn log_apply(symbol: &str, origin: Origin, stats: &ValidationStats, trim: &TrimReport, points: usize, last: Option<i64>) {
    static COUNT: AtomicU64 = AtomicU64::new(0);
    if let Some(n) = sampled(&COUNT, 10, 50) {
        log::debug!(
            target: "pipeline.apply",
            "pass #{n} {symbol} ({}): points={points} last={} accepted={} bad_ts={} bad_val={} dup={} retention_cut={} flat_cut={}",
            origin.as_str(),
            last.map(format_civil).unwrap_or_default(),
            stats.accepted,
            stats.bad_timestamps,
            stats.bad_values,
            stats.duplicates,
            trim.retention_dropped,
            trim.flat_dropped
        );
    }
}

pub fn log_rejected(symbol: &str, origin: Origin, err: &ValidationError, fallback: bool) {
    log::warn!(
        target: "pipeline.reject",
        "{symbol} ({}) rejected [{}]: {err}; {}",
        origin.as_str(),
        err.kind(),
        if fallback { "re-applied last snapshot" } else { "no snapshot to fall back to" }
    );
}

pub fn log_render_retry(symbol: &str, detail: impl AsRef<str>) {
    log::warn!(target: "pipeline.render", "{symbol}: apply failed, retrying once: {}", detail.as_ref());
}

pub fn log_render_gave_up(symbol: &str, detail: impl AsRef<str>) {
    log::error!(target: "pipeline.render", "{symbol}: apply failed after retry: {}", detail.as_ref());
}

pub fn log_event_overflow(symbol: &str) {
    static COUNT: AtomicU64 = AtomicU64::new(0);
    if let Some(n) = sampled(&COUNT, 3, 100) {
        log::warn!(target: "scheduler.events", "event buffer full; dropped notice for {symbol} (#{n})");
    }
}

pub fn log_poll_failure(symbol: &str, err: &dyn std::fmt::Display) {
    static COUNT: AtomicU64 = AtomicU64::new(0);
    if let Some(n) = sampled(&COUNT, 5, 30) {
        log::warn!(target: "feed.poll", "no update this cycle for {symbol} (failure #{n}): {err}");
    }
}

pub fn log_poll_idle(loops: u64) {
    if loops == 1 || loops % 30 == 0 {
        log::debug!(target: "feed.poll", "no active symbol after {loops} ticks");
    }
}

pub fn log_bulk_result(symbol: &str, rows: usize, path: &std::path::Path) {
    log::info!(target: "feed.bulk", "loaded {rows} row(s) for {symbol} from {:?}", path);
}
