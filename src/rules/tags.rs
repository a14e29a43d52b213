//! # Symbolic tag compiler
//!
//! Rule patterns embed symbolic tags such as `(YYMMDD)`, `(NNN)`, or `(X+)` where a file
//! basename carries a date, a version number, or a version name. Compiling a pattern
//! replaces each tag with its real regular expression while recording which capture group
//! holds which tag, so that a later match can interpret the captured text.
//!
//! Recognized tag families:
//!
//! - **date**: a 4- or 2-digit year, a month name or 2-digit month, and a 2-digit day or
//!   3-digit day-of-year, joined by `_`, `-`, or nothing, in either year-first or
//!   day-first order — e.g. `(YYYY_MON_DD)`, `(DD-MM-YY)`, `(YYDOY)`.
//! - **version number**: a fixed run of `N` for fixed width, or `N+` for variable width.
//! - **version name**: a fixed run of `X` or `X+`; names must start and end alphanumeric.
//!
//! Named captures `(?P<name>…)` pass through untouched, with their group index counted.

/// Regular expression for a four-digit year, 1970–2099.
pub(crate) const YYYY: &str = r"(?:19[7-9]\d|20\d\d)";

/// Regular expression for a two-digit year.
pub(crate) const YY: &str = r"\d\d";

/// Regular expression for a three-letter month name.
pub(crate) const MON: &str = "(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec\
|JAN|FEB|MAR|APR|MAY|JUN|JUL|AUG|SEP|OCT|NOV|DEC\
|jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)";

/// Regular expression for a two-digit month.
pub(crate) const MM: &str = r"(?:0[1-9]|1[0-2])";

/// Regular expression for a two-digit day of month.
pub(crate) const DD: &str = r"(?:0[1-9]|[12]\d|3[01])";

/// Regular expression for a three-digit day of year.
pub(crate) const DOY: &str = r"(?:00[1-9]|0[1-9]\d|[12]\d\d|3[0-5]\d|36[0-6])";

/// One compiled tag: the capture group index it landed in and the tag text itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TagSite {
    pub group: usize,
    pub tag: String,
}

/// Split a pattern into parts that alternate between being outside and inside balanced
/// parentheses. Parenthesized expressions always start with `(`; `\(` and `\)` are
/// treated as literals, not parentheses.
pub(crate) fn split_balanced_parens(pattern: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut chars = String::new();
    let mut depth = 0usize;
    let mut slashed = false;

    for c in pattern.chars() {
        chars.push(c);
        if c == '\\' {
            slashed = !slashed;
            continue;
        }
        if slashed {
            slashed = false;
        } else if c == '(' {
            if depth == 0 {
                chars.pop();
                parts.push(std::mem::take(&mut chars));
                chars.push('(');
            }
            depth += 1;
        } else if c == ')' {
            if depth == 1 {
                parts.push(std::mem::take(&mut chars));
            }
            depth = depth.saturating_sub(1);
        }
    }

    parts.push(chars);
    parts
}

/// The regular expression for a date tag, or `None` if the text is not one.
pub(crate) fn date_regex(tag: &str) -> Option<String> {
    // Normalize to check the overall shape
    let test = tag.replace("YYYY", "YY");
    if test.contains("DOY") {
        if !matches!(test.as_str(), "YYDOY" | "YY_DOY" | "YY-DOY") {
            return None;
        }
    } else {
        let test = test.replace("MON", "MM");
        if !matches!(
            test.as_str(),
            "YYMMDD" | "YY_MM_DD" | "YY-MM-DD" | "DDMMYY" | "DD_MM_YY" | "DD-MM-YY"
        ) {
            return None;
        }
    }

    // Substitution order matters: the longer symbols go first
    let pattern = tag
        .replace("YYYY", YYYY)
        .replace("YY", YY)
        .replace("MON", MON)
        .replace("MM", MM)
        .replace("DOY", DOY)
        .replace("DD", DD);
    Some(pattern)
}

/// The regular expression for a version number tag, or `None` if the text is not one.
pub(crate) fn number_regex(tag: &str) -> Option<String> {
    if tag == "N+" {
        return Some(r"\d+".to_string());
    }
    if !tag.is_empty() && tag.chars().all(|c| c == 'N') {
        return Some(tag.replace('N', r"\d"));
    }
    None
}

/// The regular expression for a version name tag, or `None` if the text is not one.
pub(crate) fn name_regex(tag: &str) -> Option<String> {
    if tag == "X+" {
        return Some(r"[a-zA-Z0-9](?:|[\w-]*[a-zA-Z0-9])".to_string());
    }
    if tag.is_empty() || !tag.chars().all(|c| c == 'X') {
        return None;
    }
    match tag.len() {
        1 => Some("[a-zA-Z0-9]".to_string()),
        2 => Some("[a-zA-Z0-9]{2}".to_string()),
        n => Some(format!(r"[a-zA-Z0-9][\w-]{{{}}}[a-zA-Z0-9]", n - 2)),
    }
}

/// Replace every symbolic tag in a pattern with its regular expression.
///
/// Returns the revised pattern and the list of [`TagSite`]s, ordered by capture group
/// index. Group indices count every capturing group, so tags interleaved with ordinary
/// captures keep their correct positions.
pub(crate) fn interpret_tags(pattern: &str) -> (String, Vec<TagSite>) {
    let parts = split_balanced_parens(pattern);
    let mut new_parts: Vec<String> = Vec::new();
    let mut tags: Vec<TagSite> = Vec::new();

    let mut group_index = 0usize;
    for part in parts {
        // Only parenthesized, capturing groups are candidates
        if !part.starts_with('(') {
            new_parts.push(part);
            continue;
        }
        if part.starts_with("(?") && !part.starts_with("(?P<") {
            new_parts.push(part);
            continue;
        }

        group_index += 1;

        if part.starts_with("(?P<") {
            new_parts.push(part);
            continue;
        }

        let interior = &part[1..part.len() - 1];
        let translated = date_regex(interior)
            .or_else(|| number_regex(interior))
            .or_else(|| name_regex(interior));

        match translated {
            Some(regex) => {
                new_parts.push(format!("({regex})"));
                tags.push(TagSite {
                    group: group_index,
                    tag: interior.to_string(),
                });
            }
            None => new_parts.push(part),
        }
    }

    tags.sort_by_key(|site| site.group);
    (new_parts.concat(), tags)
}

/// Replace any symbolic tags in a pattern with their regular expressions, discarding the
/// bookkeeping. Useful for building plain match patterns from tagged templates.
pub fn remove_tags(pattern: &str) -> String {
    interpret_tags(pattern).0
}

#[cfg(test)]
mod tags_test {
    use super::*;

    #[test]
    fn balanced_paren_split() {
        let parts = split_balanced_parens(r"sat(NNN)\(x\).bsp");
        assert_eq!(parts, vec![r"sat", "(NNN)", r"\(x\).bsp"]);

        let parts = split_balanced_parens("a(b(c)d)e");
        assert_eq!(parts, vec!["a", "(b(c)d)", "e"]);
    }

    #[test]
    fn date_tags() {
        assert!(date_regex("YYMMDD").is_some());
        assert!(date_regex("YYYY_MON_DD").is_some());
        assert!(date_regex("DD-MM-YY").is_some());
        assert!(date_regex("YYDOY").is_some());
        assert!(date_regex("YYYYDOY").is_some());
        assert!(date_regex("MMDDYY").is_none());
        assert!(date_regex("DOYYY").is_none());
        assert!(date_regex("NNN").is_none());
    }

    #[test]
    fn version_tags() {
        assert_eq!(number_regex("NN"), Some(r"\d\d".to_string()));
        assert_eq!(number_regex("N+"), Some(r"\d+".to_string()));
        assert!(number_regex("NX").is_none());

        assert!(name_regex("X").is_some());
        assert!(name_regex("XXX").is_some());
        assert!(name_regex("X+").is_some());
        assert!(name_regex("XN").is_none());
    }

    #[test]
    fn tag_interpretation_tracks_groups() {
        let (pattern, tags) = interpret_tags(r"sat(NNN)_(YYMMDD)\.bsp");
        assert!(pattern.starts_with("sat("));
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0], TagSite { group: 1, tag: "NNN".to_string() });
        assert_eq!(tags[1], TagSite { group: 2, tag: "YYMMDD".to_string() });
    }

    #[test]
    fn non_capturing_and_named_groups_pass_through() {
        let (pattern, tags) = interpret_tags(r"(?:cas|van)(?P<phase>\w+)_(NN)\.tf");
        assert!(pattern.contains("(?:cas|van)"));
        assert!(pattern.contains("(?P<phase>"));
        assert_eq!(tags.len(), 1);
        // group 1 is the named capture, so the tag lands in group 2
        assert_eq!(tags[0].group, 2);
    }

    #[test]
    fn untagged_captures_are_left_alone() {
        let (pattern, tags) = interpret_tags(r"naif(\d\d\d\d)\.tls");
        assert_eq!(pattern, r"naif(\d\d\d\d)\.tls");
        assert!(tags.is_empty());
    }
}
