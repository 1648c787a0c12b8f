use chrono::{DateTime, Utc};

/// Elapsed seconds between two timestamps.
pub fn duration_sec(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let secs = (end - start).num_milliseconds() as f64 / 1000.0;
    secs
}

/// Render a duration as a compact human string: `45s`, `1m30s`, `2m`.
pub fn format_duration(sec: f64) -> String {
    if sec < 0.0 {
        return format!("-{}", format_duration(-sec));
    }
    if sec < 60.0 {
        #[allow(clippy::cast_possible_truncation)]
        let rounded = sec.round() as i64;
        return format!("{rounded}s");
    }
    #[allow(clippy::cast_possible_truncation)]
    let m = (sec / 60.0).floor() as i64;
    #[allow(clippy::cast_possible_truncation)]
    let s = (sec % 60.0).round() as i64;
    if s > 0 {
        format!("{m}m{s}s")
    } else {
        format!("{m}m")
    }
}
