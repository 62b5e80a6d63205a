// Timestamp normalization.
//
// Every sample time ends up as epoch seconds in the chart's display frame. Civil
// strings are read as wall-clock components and placed in that frame unchanged,
// so "09:15:00" from the feed is drawn at 09:15:00 whatever the viewer's zone is.

use crate::sample::RawScalar;
use chrono::{DateTime, NaiveDateTime};

/// Numeric epochs above this are milliseconds.
pub const MILLIS_THRESHOLD: f64 = 10_000_000_000.0;

/// 9999-12-31 23:59:59; anything later is garbage from the feed.
const MAX_EPOCH_SECS: f64 = 253_402_300_799.0;

const CIVIL_LEN: usize = "YYYY-MM-DD HH:MM:SS".len();

pub fn normalize(raw: &RawScalar) -> Option<i64> {
    match raw {
        RawScalar::Number(n) => normalize_epoch(*n),
        RawScalar::Text(s) => parse_civil(s),
        RawScalar::Other(_) => None,
    }
}

pub fn normalize_epoch(n: f64) -> Option<i64> {
    if !n.is_finite() || n <= 0.0 {
        return None;
    }
    let secs = if n > MILLIS_THRESHOLD {
        (n / 1000.0).trunc()
    } else {
        n.trunc()
    };
    if secs < 1.0 || secs > MAX_EPOCH_SECS {
        return None;
    }
    Some(secs as i64)
}

pub fn parse_civil(raw: &str) -> Option<i64> {
    let s = strip_fraction(strip_offset(raw.trim()));
    if s.len() != CIVIL_LEN || !s.is_ascii() {
        return None;
    }
    let fmt = match s.as_bytes()[10] {
        b' ' => "%Y-%m-%d %H:%M:%S",
        b'T' => "%Y-%m-%dT%H:%M:%S",
        _ => return None,
    };
    // chrono accepts :60 as a leap second; the feed never means that.
    if &s[17..] == "60" {
        return None;
    }
    let dt = NaiveDateTime::parse_from_str(s, fmt).ok()?;
    let secs = dt.and_utc().timestamp();
    (secs > 0).then_some(secs)
}

/// Inverse of `parse_civil`, used for logs and tooltips.
pub fn format_civil(secs: i64) -> String {
    match DateTime::from_timestamp(secs, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("unix:{secs}"),
    }
}

fn strip_offset(s: &str) -> &str {
    if let Some(rest) = s.strip_suffix('Z').or_else(|| s.strip_suffix('z')) {
        return rest.trim_end();
    }

    let b = s.as_bytes();
    let n = b.len();
    let is_sign = |c: u8| c == b'+' || c == b'-';

    // +HH:MM
    if n >= CIVIL_LEN + 6 {
        let t = &b[n - 6..];
        if is_sign(t[0])
            && t[1].is_ascii_digit()
            && t[2].is_ascii_digit()
            && t[3] == b':'
            && t[4].is_ascii_digit()
            && t[5].is_ascii_digit()
        {
            return s[..n - 6].trim_end();
        }
    }
    // +HHMM
    if n >= CIVIL_LEN + 5 {
        let t = &b[n - 5..];
        if is_sign(t[0]) && t[1..].iter().all(u8::is_ascii_digit) {
            return s[..n - 5].trim_end();
        }
    }
    s
}

fn strip_fraction(s: &str) -> &str {
    match s.rsplit_once('.') {
        Some((head, frac))
            if head.len() == CIVIL_LEN
                && !frac.is_empty()
                && frac.bytes().all(|c| c.is_ascii_digit()) =>
        {
            head
        }
        _ => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2025-01-01 09:15:00 in the display frame.
    const T_0915: i64 = 1_735_722_900;

    #[test]
    fn epoch_seconds_pass_through_unchanged() {
        for secs in [1_i64, 1_600_000_000, T_0915, 9_999_999_999] {
            assert_eq!(normalize(&RawScalar::from(secs)), Some(secs));
        }
    }

    #[test]
    fn milliseconds_are_truncated_to_seconds() {
        assert_eq!(normalize_epoch(1_735_722_900_999.0), Some(T_0915));
        assert_eq!(normalize_epoch(10_000_000_001.0), Some(10_000_000));
    }

    #[test]
    fn non_positive_and_non_finite_numbers_are_dropped() {
        assert_eq!(normalize_epoch(0.0), None);
        assert_eq!(normalize_epoch(-5.0), None);
        assert_eq!(normalize_epoch(0.4), None);
        assert_eq!(normalize_epoch(f64::NAN), None);
        assert_eq!(normalize_epoch(f64::INFINITY), None);
        assert_eq!(normalize_epoch(1e300), None);
    }

    #[test]
    fn civil_time_is_read_as_wall_clock() {
        assert_eq!(parse_civil("2025-01-01 09:15:00"), Some(T_0915));
        assert_eq!(parse_civil("2025-01-01T09:15:00"), Some(T_0915));
        assert_eq!(format_civil(T_0915), "2025-01-01 09:15:00");
    }

    #[test]
    fn offset_suffix_is_stripped_not_applied() {
        assert_eq!(parse_civil("2025-01-01 09:15:00+05:30"), Some(T_0915));
        assert_eq!(parse_civil("2025-01-01T09:15:00-04:00"), Some(T_0915));
        assert_eq!(parse_civil("2025-01-01T09:15:00+0530"), Some(T_0915));
        assert_eq!(parse_civil("2025-01-01T09:15:00Z"), Some(T_0915));
        assert_eq!(parse_civil("  2025-01-01 09:15:00 +05:30 "), Some(T_0915));
    }

    #[test]
    fn fractional_seconds_are_ignored() {
        assert_eq!(parse_civil("2025-01-01 09:15:00.250"), Some(T_0915));
        assert_eq!(parse_civil("2025-01-01 09:15:00.250+05:30"), Some(T_0915));
    }

    #[test]
    fn malformed_civil_strings_yield_none() {
        for bad in [
            "bad",
            "",
            "2025-01-01",
            "2025-13-01 09:15:00",
            "2025-02-30 09:15:00",
            "2025-01-01 24:00:00",
            "2025-01-01 09:61:00",
            "2025-01-01 09:15:60",
            "2025-1-1 9:15:00",
            "2025/01/01 09:15:00",
            "2025-01-01_09:15:00",
            "1735722900",
        ] {
            assert_eq!(parse_civil(bad), None, "{bad:?} should not parse");
        }
    }
}
