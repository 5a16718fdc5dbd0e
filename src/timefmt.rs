// SPDX-License-Identifier: Apache-2.0

//! Minimal RFC3339Nano timestamp formatting.
//!
//! Used only to size the row-admission estimator in [`crate::log_rows`] —
//! not a general-purpose calendar API, and not exposed outside the crate.

use chrono::{DateTime, Utc};

/// Formats `ts_ns` (nanoseconds since the Unix epoch) as RFC3339 with
/// nanosecond precision and a `Z` offset, trailing-zero-stripped the way
/// Go's `time.RFC3339Nano` layout does, e.g. `"2023-11-14T22:13:20.5Z"`.
///
/// `chrono` supplies the calendar math (`DateTime::from_timestamp`); the
/// trailing-zero stripping itself has no equivalent `SecondsFormat` variant
/// (`AutoSi` only rounds to whole millis/micros/nanos groups), so it's done
/// by hand on the formatted fractional digits.
pub(crate) fn format_rfc3339_nano(ts_ns: i64) -> String {
    let secs = ts_ns.div_euclid(1_000_000_000);
    let nanos = ts_ns.rem_euclid(1_000_000_000) as u32;
    let dt = DateTime::<Utc>::from_timestamp(secs, nanos).unwrap_or_else(|| {
        DateTime::<Utc>::from_timestamp(0, 0).expect("epoch timestamp is always valid")
    });
    if nanos == 0 {
        format!("{}Z", dt.format("%Y-%m-%dT%H:%M:%S"))
    } else {
        let mut frac = format!("{nanos:09}");
        while frac.ends_with('0') {
            let _ = frac.pop();
        }
        format!("{}.{frac}Z", dt.format("%Y-%m-%dT%H:%M:%S"))
    }
}
