//! # Time scale support
//!
//! All kernel coverage windows are expressed in **seconds TDB past J2000**, the scale the
//! underlying toolkit uses for its own coverage arithmetic. This module wraps
//! [hifitime](https://docs.rs/hifitime) for the conversions the rest of the crate needs:
//! ISO date strings to and from seconds TDB, day-of-year arithmetic for basename tags, and
//! filesystem timestamps for the release-date fallback.
//!
//! It also defines [`TimeRange`], the half-open-capable window type used by queries and
//! coverage records, including the slack-tolerant overlap test.

use std::time::SystemTime;

use hifitime::{Epoch, TimeScale, Unit};

use crate::constants::{DEFAULT_TIME_SLACK, TIME_CEILING, TIME_FLOOR};
use crate::spicerack_errors::{Result, SpiceRackError};

/// Parse an ISO date or date-time string into seconds TDB past J2000.
///
/// Accepted forms are `YYYY-MM-DD` and `YYYY-MM-DDTHH:MM:SS[.fff]`; the instant is
/// interpreted directly in the TDB scale.
///
/// Arguments
/// ---------
/// * `iso`: the date string to parse.
///
/// Return
/// ------
/// * The corresponding time in seconds TDB, or a `TimeFormat` error.
pub fn tdb_from_iso(iso: &str) -> Result<f64> {
    let bad = || SpiceRackError::TimeFormat(iso.to_string());

    let (date_part, time_part) = match iso.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (iso.trim(), None),
    };

    let mut ymd = date_part.trim().splitn(3, '-');
    let year: i32 = ymd.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let month: u8 = ymd.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let day: u8 = ymd.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;

    let (mut hour, mut minute, mut second, mut nanos) = (0u8, 0u8, 0u8, 0u32);
    if let Some(t) = time_part {
        let mut hms = t.trim_end_matches('Z').splitn(3, ':');
        hour = hms.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
        minute = hms.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
        let sec_text = hms.next().ok_or_else(bad)?;
        let sec: f64 = sec_text.parse().map_err(|_| bad())?;
        second = sec.trunc() as u8;
        nanos = ((sec - sec.trunc()) * 1.0e9) as u32;
    }

    let epoch =
        Epoch::maybe_from_gregorian(year, month, day, hour, minute, second, nanos, TimeScale::TDB)
            .map_err(|_| bad())?;
    Ok(epoch.to_tdb_seconds())
}

/// Format a time in seconds TDB as an ISO date string `YYYY-MM-DD`, dropping the
/// time-of-day part.
pub fn iso_from_tdb(tdb: f64) -> String {
    let (y, m, d, _, _, _, _) = Epoch::from_tdb_seconds(tdb).to_gregorian(TimeScale::TDB);
    iso_date(y, m as u32, d as u32)
}

/// Format a calendar date as `YYYY-MM-DD`.
pub fn iso_date(year: i32, month: u32, day: u32) -> String {
    format!("{year:04}-{month:02}-{day:02}")
}

/// Midnight of a calendar date in seconds TDB.
pub fn tdb_from_ymd(year: i32, month: u8, day: u8) -> Result<f64> {
    let epoch = Epoch::maybe_from_gregorian(year, month, day, 0, 0, 0, 0, TimeScale::TDB)
        .map_err(|_| SpiceRackError::TimeFormat(iso_date(year, month as u32, day as u32)))?;
    Ok(epoch.to_tdb_seconds())
}

/// Convert a year and day-of-year into a calendar `(year, month, day)` triple.
pub fn ymd_from_doy(year: i32, doy: u32) -> Result<(i32, u8, u8)> {
    if doy == 0 || doy > 366 {
        return Err(SpiceRackError::TimeFormat(format!("{year}-{doy:03}")));
    }
    let jan1 = Epoch::maybe_from_gregorian(year, 1, 1, 0, 0, 0, 0, TimeScale::TDB)
        .map_err(|_| SpiceRackError::TimeFormat(format!("{year}-{doy:03}")))?;
    let epoch = jan1 + Unit::Day * (doy as i64 - 1);
    let (y, m, d, _, _, _, _) = epoch.to_gregorian(TimeScale::TDB);
    Ok((y, m, d))
}

/// Expand a two-digit year into a full year, windowed to 1970–2069.
pub fn window_year(two_digit: i32) -> i32 {
    let year = 2000 + two_digit;
    if year >= 2070 {
        year - 100
    } else {
        year
    }
}

/// The ISO date of a filesystem timestamp, in UTC; `None` for pre-epoch timestamps.
pub fn iso_from_timestamp(stamp: SystemTime) -> Option<String> {
    let secs = stamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .ok()?
        .as_secs_f64();
    let (y, m, d, _, _, _, _) = Epoch::from_unix_seconds(secs).to_gregorian(TimeScale::UTC);
    Some(iso_date(y, m as u32, d as u32))
}

// -------------------------------------------------------------------------------------------------
// Time windows
// -------------------------------------------------------------------------------------------------

/// A time window in seconds TDB. Either bound may be open (`None`), meaning the window is
/// unconstrained on that side; the default window is all of time.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimeRange {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl TimeRange {
    /// The window covering all of time.
    pub fn all() -> Self {
        TimeRange::default()
    }

    /// A closed window between two times.
    pub fn between(start: f64, end: f64) -> Self {
        TimeRange {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Build a window from a coverage record, where `None` means "applies to all time".
    pub fn from_window(window: Option<(f64, f64)>) -> Self {
        match window {
            Some((t0, t1)) => TimeRange::between(t0, t1),
            None => TimeRange::all(),
        }
    }

    /// True if both bounds are open.
    pub fn is_all(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Concrete bounds, substituting the crate-wide floor/ceiling for open sides.
    pub fn bounds(&self) -> (f64, f64) {
        (
            self.start.unwrap_or(TIME_FLOOR),
            self.end.unwrap_or(TIME_CEILING),
        )
    }

    /// The portion of this window that overlaps another, or `None` when the windows are
    /// separated by more than `slack` seconds.
    ///
    /// Open bounds are unconstrained, so the overlap of an open side is the other
    /// window's bound. The returned window may itself carry open bounds when both inputs
    /// do.
    pub fn overlap(&self, other: &TimeRange, slack: f64) -> Option<TimeRange> {
        let t0 = match (self.start, other.start) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (Some(a), None) => Some(a),
            (None, b) => b,
        };
        let t1 = match (self.end, other.end) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, b) => b,
        };

        if let (Some(t0), Some(t1)) = (t0, t1) {
            if t1 < t0 - slack {
                return None;
            }
        }
        Some(TimeRange { start: t0, end: t1 })
    }

    /// True if this window overlaps another within the default slack.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.overlap(other, DEFAULT_TIME_SLACK).is_some()
    }
}

#[cfg(test)]
mod time_test {
    use super::*;

    #[test]
    fn iso_roundtrip() {
        let t = tdb_from_iso("2003-01-15").unwrap();
        assert_eq!(iso_from_tdb(t), "2003-01-15");

        let t = tdb_from_iso("1997-10-15T09:26:08").unwrap();
        assert_eq!(iso_from_tdb(t), "1997-10-15");
    }

    #[test]
    fn iso_ordering_matches_time_ordering() {
        let a = tdb_from_iso("2004-06-30").unwrap();
        let b = tdb_from_iso("2004-07-01").unwrap();
        assert!(a < b);
        assert!((b - a - 86_400.0).abs() < 1.0e-6);
    }

    #[test]
    fn rejects_garbage() {
        assert!(tdb_from_iso("not-a-date").is_err());
        assert!(tdb_from_iso("2004-13-01").is_err());
    }

    #[test]
    fn day_of_year() {
        assert_eq!(ymd_from_doy(2022, 1).unwrap(), (2022, 1, 1));
        assert_eq!(ymd_from_doy(2022, 305).unwrap(), (2022, 11, 1));
        assert_eq!(ymd_from_doy(2020, 366).unwrap(), (2020, 12, 31));
        assert!(ymd_from_doy(2022, 0).is_err());
    }

    #[test]
    fn year_windowing() {
        assert_eq!(window_year(3), 2003);
        assert_eq!(window_year(69), 2069);
        assert_eq!(window_year(70), 1970);
        assert_eq!(window_year(97), 1997);
    }

    #[test]
    fn overlap_with_slack() {
        let a = TimeRange::between(0.0, 100.0);
        let b = TimeRange::between(100.0 + DEFAULT_TIME_SLACK / 2.0, 200.0);
        let c = TimeRange::between(100.0 + 2.0 * DEFAULT_TIME_SLACK, 200.0);

        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));

        let clipped = a.overlap(&TimeRange::between(50.0, 300.0), 0.0).unwrap();
        assert_eq!(clipped, TimeRange::between(50.0, 100.0));
    }

    #[test]
    fn open_bounds_are_unconstrained() {
        let all = TimeRange::all();
        let window = TimeRange::between(-1.0e9, 1.0e9);
        assert!(all.overlaps(&window));
        assert_eq!(all.overlap(&window, 0.0).unwrap(), window);
        assert!(all.overlap(&all, 0.0).unwrap().is_all());
    }
}
