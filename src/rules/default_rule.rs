//! # Default basename heuristics
//!
//! When no registered rule supplies a field, the default rule takes a best-effort look at
//! the basename itself. It hunts for up to three plausible calendar dates
//! (year-month-day, day-month-year, or year-day-of-year, with `_`, `-`, or no separator)
//! and a trailing `_vNN` / `_versionNN` integer suffix, and derives a family name by
//! replacing each find with its symbolic tag.
//!
//! A lone five-digit token that *could* be a `YYDOY` date is treated with skepticism: a
//! value below `02001` is more likely a version number and is rejected as a date.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::rules::rule::{month_number, RuleInfo};
use crate::rules::tags::{DD, DOY, MM, MON, YY, YYYY};
use crate::spicerack_errors::Result;
use crate::time::{iso_date, tdb_from_iso, window_year, ymd_from_doy};
use crate::values::Version;

const SEPS: [&str; 3] = ["", "_", "-"];

/// One date-shaped scanner: the compiled pattern plus the separator and field order it
/// was built with.
struct DateScanner {
    regex: Regex,
    sep: &'static str,
    year_first: bool,
    day_of_year: bool,
}

static DATE_SCANNERS: Lazy<Vec<Vec<DateScanner>>> = Lazy::new(|| {
    let year = format!("(?:{YYYY}|{YY})");
    let month = format!("(?:{MON}|{MM})");

    // Three forms, each tried with every separator: year-month-day, day-month-year,
    // and year-day-of-year
    let mut forms = Vec::new();
    for (year_first, day_of_year) in [(true, false), (false, false), (true, true)] {
        let mut scanners = Vec::new();
        for sep in SEPS {
            let pattern = if day_of_year {
                format!("(?P<y>{year}){sep}(?P<d>{DOY})")
            } else if year_first {
                format!("(?P<y>{year}){sep}(?P<m>{month}){sep}(?P<d>{DD})")
            } else {
                format!("(?P<d>{DD}){sep}(?P<m>{month}){sep}(?P<y>{year})")
            };
            scanners.push(DateScanner {
                regex: Regex::new(&pattern).expect("static date pattern compiles"),
                sep,
                year_first,
                day_of_year,
            });
        }
        forms.push(scanners);
    }
    forms
});

static V_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^.*_v(\d+)\.\w+$").expect("static version pattern compiles"));
static VERSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^.*_version(\d+).*$").expect("static version pattern compiles"));

/// Smallest five-digit token accepted as a contiguous `YYDOY` date; anything below looks
/// like a version number.
const YYDOY_MINIMUM: &str = "02001";

/// One date found inside a basename.
struct DateCapture {
    index: usize,
    text: String,
    tag: String,
    year: i32,
    month: Option<String>,
    day: u32,
}

/// The instance-free default rule.
pub struct DefaultRule;

impl DefaultRule {
    /// Extract whatever the default heuristics can find: a release date and/or time
    /// range, a trailing version number, and the tag-substituted family name.
    pub fn apply(basename: &str) -> Result<RuleInfo> {
        let mut info = RuleInfo::default();

        let (family, dates) = dates_from_basename(basename)?;
        if dates.len() == 1 || dates.len() == 3 {
            info.release_date = Some(dates[0].clone());
        }
        if dates.len() >= 2 {
            let t0 = tdb_from_iso(&dates[dates.len() - 2])?;
            let t1 = tdb_from_iso(&dates[dates.len() - 1])?;
            info.time = Some((t0, t1));
        }

        let (family, version) = version_from_basename(&family);
        if let Some(version) = version {
            info.version = Some(version);
        }

        if family != basename {
            info.family = Some(family);
        }

        Ok(info)
    }
}

/// Extract up to three plausible dates and return the tag-substituted family name plus
/// the dates in ISO format. On failure the family is the basename itself and the date
/// list is empty.
fn dates_from_basename(basename: &str) -> Result<(String, Vec<String>)> {
    let mut family = basename.to_string();
    let mut captures: Vec<DateCapture> = Vec::new();

    for scanners in DATE_SCANNERS.iter() {
        let mut found: Vec<(usize, usize, &DateScanner, regex::Captures<'_>)> = Vec::new();
        for scanner in scanners {
            for caps in scanner.regex.captures_iter(&family) {
                let whole = caps.get(0).expect("group 0 always present");
                if bounded_by_digits(&family, whole.start(), whole.end()) {
                    continue;
                }
                found.push((whole.start(), whole.end(), scanner, caps));
            }
        }

        // Leftmost-longest wins among the separator variants; later candidates that
        // overlap an accepted span are dropped
        found.sort_by_key(|&(start, end, _, _)| (start, std::cmp::Reverse(end)));
        let mut accepted: Vec<(usize, usize, String, DateCapture)> = Vec::new();
        for (start, end, scanner, caps) in found {
            if accepted.iter().any(|&(a, b, _, _)| start < b && end > a) {
                continue;
            }

            let y_text = caps.name("y").expect("year group").as_str().to_string();
            let d_text = caps.name("d").expect("day group").as_str().to_string();
            let m_text = caps.name("m").map(|m| m.as_str().to_string());

            let ytag = "Y".repeat(y_text.len());
            let mtag = match &m_text {
                None => "",
                Some(m) if m.len() == 2 => "MM",
                Some(_) => "MON",
            };
            let dtag = if d_text.len() == 2 { "DD" } else { "DOY" };
            let sep = scanner.sep;
            let tag = if scanner.year_first {
                format!("{ytag}{sep}{mtag}{}{dtag}", if mtag.is_empty() { "" } else { sep })
            } else {
                format!("{dtag}{sep}{mtag}{}{ytag}", if mtag.is_empty() { "" } else { sep })
            };

            let year = match y_text.len() {
                2 => window_year(y_text.parse().expect("two digits")),
                _ => y_text.parse().expect("four digits"),
            };
            let day: u32 = d_text.parse().expect("day digits");
            debug_assert!(scanner.day_of_year == (dtag == "DOY"));

            accepted.push((
                start,
                end,
                tag.clone(),
                DateCapture {
                    index: start,
                    text: caps.get(0).expect("group 0").as_str().to_string(),
                    tag,
                    year,
                    month: m_text,
                    day,
                },
            ));
        }

        // Replace each accepted span with its tag, working backwards from the end
        accepted.sort_by_key(|&(start, _, _, _)| std::cmp::Reverse(start));
        for (start, end, tag, capture) in accepted {
            family.replace_range(start..end, &tag);
            captures.push(capture);
        }
    }

    // More than three dates cannot be interpreted
    if captures.is_empty() || captures.len() > 3 {
        return Ok((basename.to_string(), Vec::new()));
    }

    captures.sort_by_key(|c| c.index);

    // A single contiguous YYDOY below the minimum is probably a version number
    let yydoy_count = captures.iter().filter(|c| c.tag == "YYDOY").count();
    if yydoy_count == 1 {
        captures.retain(|c| c.tag != "YYDOY" || c.text.as_str() >= YYDOY_MINIMUM);
    }
    if captures.is_empty() {
        return Ok((basename.to_string(), Vec::new()));
    }

    let mut dates = Vec::new();
    for capture in &captures {
        let iso = match &capture.month {
            Some(m) => {
                let month = match month_number(m) {
                    Some(n) => n,
                    None => m.parse().expect("two-digit month"),
                };
                iso_date(capture.year, month, capture.day)
            }
            None => {
                let (y, m, d) = ymd_from_doy(capture.year, capture.day)?;
                iso_date(y, m as u32, d as u32)
            }
        };
        dates.push(iso);
    }

    Ok((family, dates))
}

/// Extract a trailing `_vNN` / `_versionNN` version number, replacing its digits with
/// `N`s in the returned family name.
fn version_from_basename(basename: &str) -> (String, Option<Version>) {
    for pattern in [&*V_PATTERN, &*VERSION_PATTERN] {
        if let Some(caps) = pattern.captures(basename) {
            let digits = caps.get(1).expect("version digits");
            let version: u64 = digits.as_str().parse().expect("digits parse");
            let mut family = basename.to_string();
            family.replace_range(digits.start()..digits.end(), &"N".repeat(digits.len()));
            return (family, Some(Version::parse(&version.to_string())));
        }
    }
    (basename.to_string(), None)
}

/// True if the span is immediately preceded or followed by another digit, which makes a
/// date interpretation implausible.
fn bounded_by_digits(text: &str, start: usize, end: usize) -> bool {
    let bytes = text.as_bytes();
    let before = start > 0 && bytes[start - 1].is_ascii_digit();
    let after = end < bytes.len() && bytes[end].is_ascii_digit();
    before || after
}

#[cfg(test)]
mod default_rule_test {
    use super::*;
    use crate::values::Scalar;

    #[test]
    fn trailing_version_suffix() {
        let info = DefaultRule::apply("de421_v03.bsp").unwrap();
        assert_eq!(info.version.unwrap().single(), Some(&Scalar::Int(3)));
        assert_eq!(info.family.as_deref(), Some("de421_vNN.bsp"));
    }

    #[test]
    fn single_embedded_date_is_a_release_date() {
        let info = DefaultRule::apply("cas_status_v04_220101.tf").unwrap();
        assert_eq!(info.release_date.as_deref(), Some("2022-01-01"));
        assert!(info.time.is_none());
    }

    #[test]
    fn two_dates_are_a_time_range() {
        let info = DefaultRule::apply("080101_080301ra.bc").unwrap();
        assert!(info.release_date.is_none());
        let (t0, t1) = info.time.unwrap();
        assert_eq!(crate::time::iso_from_tdb(t0), "2008-01-01");
        assert_eq!(crate::time::iso_from_tdb(t1), "2008-03-01");
        assert_eq!(info.family.as_deref(), Some("YYMMDD_YYMMDDra.bc"));
    }

    #[test]
    fn day_of_year_dates() {
        let info = DefaultRule::apply("scpse_08045_08067.bsp").unwrap();
        let (t0, t1) = info.time.unwrap();
        assert_eq!(crate::time::iso_from_tdb(t0), "2008-02-14");
        assert_eq!(crate::time::iso_from_tdb(t1), "2008-03-07");
        assert_eq!(info.family.as_deref(), Some("scpse_YYDOY_YYDOY.bsp"));
    }

    #[test]
    fn suspicious_five_digit_token_is_not_a_date() {
        // 00012 parses as year 2000, day 012, but is far more likely a version number
        let info = DefaultRule::apply("star_00012.bdb").unwrap();
        assert!(info.release_date.is_none());
        assert!(info.time.is_none());
    }

    #[test]
    fn separated_dates() {
        let info = DefaultRule::apply("ops_2022-06-30.tf").unwrap();
        assert_eq!(info.release_date.as_deref(), Some("2022-06-30"));
        assert_eq!(info.family.as_deref(), Some("ops_YYYY-MM-DD.tf"));
    }

    #[test]
    fn month_name_dates() {
        let info = DefaultRule::apply("report_01_Dec_2022.txt").unwrap();
        assert_eq!(info.release_date.as_deref(), Some("2022-12-01"));
        assert_eq!(info.family.as_deref(), Some("report_DD_MON_YYYY.txt"));
    }

    #[test]
    fn plain_names_yield_nothing() {
        let info = DefaultRule::apply("naif0012.tls").unwrap();
        assert!(info.is_empty());
    }
}
