//! Release-date heuristics over embedded comments and labels.
//!
//! Kernel producers rarely state a release date in a uniform way, so the metadata store
//! falls back to scanning comment text for date-like substrings. Lines that carry
//! begin/end time markers are ignored (those are coverage limits, not release dates), as
//! are `@`-prefixed text-kernel dates.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::rules::month_number;
use crate::time::iso_date;

/// Comment markers whose lines reliably carry a creation date.
pub const CREATION_MARKERS: [&str; 7] = [
    "SATEPHMERGE",
    "SATMERGE",
    "SATGEN",
    "Release to",
    "; Created ",
    "Run Date:",
    "CREATION_TIME",
];

static ISO_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"((?:19|20)\d\d)-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])").expect("static pattern")
});

static DMY_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(0?[1-9]|[12]\d|3[01])[- ](Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*[- ,]+((?:19|20)\d\d)",
    )
    .expect("static pattern")
});

static MDY_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.? (0?[1-9]|[12]\d|3[01]),? ((?:19|20)\d\d)",
    )
    .expect("static pattern")
});

static TIME_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:BEGIN|END|START|STOP)[_ ]TIME|Timespan").expect("static pattern")
});

static TK_DATE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*@\d{4}-").expect("static pattern"));

/// Every date-like substring in a line, as ISO `YYYY-MM-DD` strings, in order of
/// appearance.
pub fn dates_in_string(line: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();

    for caps in ISO_DATE.captures_iter(line) {
        let start = caps.get(0).expect("group 0").start();
        found.push((start, caps[0].to_string()));
    }
    for caps in DMY_DATE.captures_iter(line) {
        let (Ok(day), Some(month), Ok(year)) = (
            caps[1].parse::<u32>(),
            month_number(&caps[2]),
            caps[3].parse::<i32>(),
        ) else {
            continue;
        };
        let start = caps.get(0).expect("group 0").start();
        found.push((start, iso_date(year, month, day)));
    }
    for caps in MDY_DATE.captures_iter(line) {
        let (Some(month), Ok(day), Ok(year)) = (
            month_number(&caps[1]),
            caps[2].parse::<u32>(),
            caps[3].parse::<i32>(),
        ) else {
            continue;
        };
        let start = caps.get(0).expect("group 0").start();
        found.push((start, iso_date(year, month, day)));
    }

    found.sort();
    found.into_iter().map(|(_, date)| date).collect()
}

/// True if this line carries a coverage-limit marker rather than a release date.
pub fn is_time_marker_line(line: &str) -> bool {
    TIME_MARKER.is_match(line)
}

/// True if this line is a text-kernel `@`-date, which is never a release date.
pub fn is_text_kernel_date_line(line: &str) -> bool {
    TK_DATE_LINE.is_match(line)
}

/// Dates found on lines carrying one of the reliable creation markers.
pub fn creation_dates(lines: &[String]) -> Vec<String> {
    let mut dates = Vec::new();
    for line in lines {
        if CREATION_MARKERS.iter().any(|marker| line.contains(marker)) {
            dates.extend(dates_in_string(line));
        }
    }
    dates
}

/// The latest embedded date that is not a coverage marker and not later than `cap`.
pub fn latest_plausible_date(lines: &[String], cap: &str) -> Option<String> {
    let mut dates = Vec::new();
    for line in lines {
        if is_time_marker_line(line) || is_text_kernel_date_line(line) {
            continue;
        }
        dates.extend(dates_in_string(line));
    }
    dates.retain(|date| date.as_str() <= cap);
    dates.into_iter().max()
}

#[cfg(test)]
mod dates_test {
    use super::*;

    #[test]
    fn date_forms() {
        assert_eq!(dates_in_string("produced on 2004-06-30 by hand"), vec!["2004-06-30"]);
        assert_eq!(dates_in_string("Run Date: 15-OCT-1997 09:26"), vec!["1997-10-15"]);
        assert_eq!(dates_in_string("Released June 3, 2011"), vec!["2011-06-03"]);
        assert!(dates_in_string("no dates here 123456").is_empty());
    }

    #[test]
    fn marker_lines_are_ignored() {
        assert!(is_time_marker_line("START_TIME = 2004-01-01"));
        assert!(is_time_marker_line("  Timespan covered: ..."));
        assert!(is_text_kernel_date_line("  @2004-JAN-01"));
        assert!(!is_time_marker_line("Release to project 2004-06-30"));
    }

    #[test]
    fn creation_marker_harvest() {
        let lines = vec![
            "SATEPHMERGE run of 2011-06-03".to_string(),
            "unrelated 2012-01-01".to_string(),
        ];
        assert_eq!(creation_dates(&lines), vec!["2011-06-03"]);
    }

    #[test]
    fn latest_date_capped_by_timestamp() {
        let lines = vec![
            "written 2004-06-30".to_string(),
            "revised 2005-02-01".to_string(),
            "STOP_TIME = 2030-01-01".to_string(),
            "future note 2029-01-01".to_string(),
        ];
        assert_eq!(
            latest_plausible_date(&lines, "2006-01-01"),
            Some("2005-02-01".to_string())
        );
    }
}
