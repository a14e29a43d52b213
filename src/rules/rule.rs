//! # Basename rules
//!
//! A [`Rule`] describes how to interpret one family of kernel file basenames: which
//! substrings carry a release date, a time range, a version, or a custom property, and how
//! to turn the captured text into typed values. Rules are registered into a [`RuleSet`]
//! bucketed by file extension and **specificity** (the number of semantic fields a rule
//! captures); [`RuleSet::apply_all`] merges every matching rule from the least to the most
//! specific, so specific rules override generic ones on overlapping fields, and among
//! rules of equal specificity the later-registered one wins.
//!
//! ## Typical usage
//!
//! ```rust
//! use spicerack::rules::{Rule, RuleBuilder};
//!
//! // sat337.bsp, sat095.bsp, ... : a three-digit version number
//! let rule = Rule::new(r"sat(NNN)\.bsp").unwrap();
//!
//! // 030115.bc : a release date embedded in the basename
//! let dated = RuleBuilder::new(r"(YYMMDD)\.bc")
//!     .family("kernel_YYMMDD.bc")
//!     .build()
//!     .unwrap();
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use camino::Utf8PathBuf;
use regex::RegexBuilder;

use crate::constants::{IdSet, SECONDS_PER_DAY};
use crate::kinds::extension_of;
use crate::rules::tags::{interpret_tags, TagSite};
use crate::spicerack_errors::{Result, SpiceRackError};
use crate::time::{tdb_from_iso, window_year, ymd_from_doy};
use crate::values::{Properties, PropertyValue, Scalar, Version};

// -------------------------------------------------------------------------------------------------
// Field specifications
// -------------------------------------------------------------------------------------------------

/// How a rule derives the version of a matching basename.
#[derive(Clone)]
pub enum VersionSpec {
    /// Assign this version to every matching basename, useful when file names are
    /// inconsistent and different versions match different patterns.
    Literal(Version),
    /// Look the lowercased captured text up in a table; a missing key omits the field.
    Map(HashMap<String, Version>),
    /// Derive the version from the captured text; returning `None` omits the field.
    With(Arc<dyn Fn(&str) -> Option<Version> + Send + Sync>),
}

/// How a rule derives the NAIF ID set of a matching basename.
#[derive(Clone)]
pub enum IdsSpec {
    /// Assign this ID set to every matching basename.
    Literal(IdSet),
    /// Parse the `(?P<naif_ids>…)` capture as a single integer ID.
    Parse,
    /// Look the lowercased `(?P<naif_ids>…)` capture up in a table.
    Map(HashMap<String, IdSet>),
}

/// How a rule derives a custom property of a matching basename.
#[derive(Clone)]
pub enum PropertySpec {
    /// Assign this value to every matching basename.
    Literal(PropertyValue),
    /// Use the raw `(?P<name>…)` capture as a text value.
    Capture,
    /// Look the lowercased capture up in a table; a missing key omits the property.
    Map(HashMap<String, Scalar>),
    /// Derive the value from the captured text; returning `None` omits the property.
    With(Arc<dyn Fn(&str) -> Option<Scalar> + Send + Sync>),
}

impl PropertySpec {
    fn needs_capture(&self) -> bool {
        !matches!(self, PropertySpec::Literal(_))
    }
}

// -------------------------------------------------------------------------------------------------
// Match results
// -------------------------------------------------------------------------------------------------

/// The information one or more rules extracted from a basename. Fields left `None` were
/// not determined; `update` merges a higher-precedence result over this one.
#[derive(Clone, Debug, Default)]
pub struct RuleInfo {
    /// Release date in `YYYY-MM-DD` format.
    pub release_date: Option<String>,
    /// Start and stop times in seconds TDB.
    pub time: Option<(f64, f64)>,
    pub version: Option<Version>,
    pub family: Option<String>,
    pub naif_ids: Option<IdSet>,
    /// Remote directories that might hold a file of this family.
    pub source: Option<Vec<String>>,
    /// Local sub-path where a downloaded file should be stored.
    pub dest: Option<Utf8PathBuf>,
    pub properties: Properties,
}

impl RuleInfo {
    /// Overlay `other` onto this result: every field `other` defines wins, and properties
    /// replace per key.
    pub fn update(&mut self, other: RuleInfo) {
        if other.release_date.is_some() {
            self.release_date = other.release_date;
        }
        if other.time.is_some() {
            self.time = other.time;
        }
        if other.version.is_some() {
            self.version = other.version;
        }
        if other.family.is_some() {
            self.family = other.family;
        }
        if other.naif_ids.is_some() {
            self.naif_ids = other.naif_ids;
        }
        if other.source.is_some() {
            self.source = other.source;
        }
        if other.dest.is_some() {
            self.dest = other.dest;
        }
        for (name, value) in other.properties {
            self.properties.insert(name, value);
        }
    }

    /// True if no field at all was determined.
    pub fn is_empty(&self) -> bool {
        self.release_date.is_none()
            && self.time.is_none()
            && self.version.is_none()
            && self.family.is_none()
            && self.naif_ids.is_none()
            && self.source.is_none()
            && self.dest.is_none()
            && self.properties.is_empty()
    }
}

// -------------------------------------------------------------------------------------------------
// Rule construction
// -------------------------------------------------------------------------------------------------

/// Builder collecting the optional pieces of a [`Rule`] before compilation.
#[derive(Clone)]
pub struct RuleBuilder {
    pattern: String,
    family: Option<String>,
    case_insensitive: bool,
    datefirst: bool,
    inclusive: bool,
    version: Option<VersionSpec>,
    naif_ids: Option<IdsSpec>,
    source: Vec<String>,
    dest: Option<Utf8PathBuf>,
    properties: Vec<(String, PropertySpec)>,
}

impl RuleBuilder {
    pub fn new(pattern: &str) -> Self {
        RuleBuilder {
            pattern: pattern.to_string(),
            family: None,
            case_insensitive: true,
            datefirst: true,
            inclusive: true,
            version: None,
            naif_ids: None,
            source: Vec::new(),
            dest: None,
            properties: Vec::new(),
        }
    }

    /// Override the derived family name. The template may reference capture groups with
    /// `$1`, `$2`, … or `${name}`.
    pub fn family(mut self, template: &str) -> Self {
        self.family = Some(template.to_string());
        self
    }

    /// Compile the pattern case-sensitively; the default is case-insensitive.
    pub fn case_sensitive(mut self) -> Self {
        self.case_insensitive = false;
        self
    }

    /// With three date tags, declare that the release date appears *after* the
    /// start/stop times rather than before them.
    pub fn date_last(mut self) -> Self {
        self.datefirst = false;
        self
    }

    /// Treat the second embedded date as an exclusive stop time rather than including
    /// its entire 24 hours.
    pub fn exclusive_end(mut self) -> Self {
        self.inclusive = false;
        self
    }

    pub fn version(mut self, spec: VersionSpec) -> Self {
        self.version = Some(spec);
        self
    }

    pub fn naif_ids(mut self, spec: IdsSpec) -> Self {
        self.naif_ids = Some(spec);
        self
    }

    /// Add a remote directory URL that might contain files matching this rule.
    pub fn source(mut self, url: &str) -> Self {
        self.source.push(url.to_string());
        self
    }

    /// Local directory where a downloaded file of this family should be stored.
    pub fn dest(mut self, dir: &str) -> Self {
        self.dest = Some(Utf8PathBuf::from(dir));
        self
    }

    pub fn property(mut self, name: &str, spec: PropertySpec) -> Self {
        self.properties.push((name.to_string(), spec));
        self
    }

    /// Compile the rule, validating tag usage.
    ///
    /// Construction fails on more than three date tags, on mixing name and number
    /// version tags, on more than one name-version tag, and on any capture-based field
    /// specification whose named group is missing from the pattern.
    pub fn build(self) -> Result<Rule> {
        let (compiled, tags) = interpret_tags(&self.pattern);

        let bad = |msg: &str| {
            SpiceRackError::Construction(format!("{msg}: {:?}", self.pattern))
        };

        let mut date_sites: Vec<TagSite> = Vec::new();
        let mut number_sites: Vec<TagSite> = Vec::new();
        let mut name_sites: Vec<TagSite> = Vec::new();
        for site in tags {
            if site.tag.contains('Y') {
                date_sites.push(site);
            } else if site.tag.starts_with('N') {
                number_sites.push(site);
            } else {
                name_sites.push(site);
            }
        }

        if date_sites.len() > 3 {
            return Err(bad("more than three embedded date tags"));
        }
        if date_sites.len() == 3 && !self.datefirst {
            date_sites.rotate_left(2); // move the trailing release date to the front
        }

        let (date_site, time_sites) = match date_sites.len() {
            0 => (None, Vec::new()),
            1 => (Some(date_sites[0].clone()), Vec::new()),
            2 => (None, date_sites),
            _ => (Some(date_sites[0].clone()), date_sites[1..].to_vec()),
        };

        // At most one way of stating the version
        let version_named = compiled.contains("(?P<version>");
        let version_slots =
            name_sites.len() + usize::from(!number_sites.is_empty()) + usize::from(version_named);
        if version_slots > 1 {
            return Err(bad("duplicate version tags"));
        }
        if version_slots == 0 {
            if matches!(self.version, Some(VersionSpec::Map(_)) | Some(VersionSpec::With(_))) {
                return Err(bad("missing version tags"));
            }
        }

        let version_sites = if !name_sites.is_empty() {
            vec![name_sites[0].clone()]
        } else {
            number_sites
        };

        // Capture-based field specifications need their named group
        for (name, spec) in &self.properties {
            if spec.needs_capture() && !compiled.contains(&format!("(?P<{name}>")) {
                return Err(bad(&format!("expression \"(?P<{name}>\" missing from pattern")));
            }
        }
        if matches!(self.naif_ids, Some(IdsSpec::Parse) | Some(IdsSpec::Map(_)))
            && !compiled.contains("(?P<naif_ids>")
        {
            return Err(bad("expression \"(?P<naif_ids>\" missing from pattern"));
        }

        let regex = RegexBuilder::new(&format!("^(?:{compiled})$"))
            .case_insensitive(self.case_insensitive)
            .build()?;

        // Specificity counts captured fields only; literal assignments are free
        let has_version = !version_sites.is_empty() || version_named;
        let has_property_captures = self
            .properties
            .iter()
            .any(|(_, spec)| spec.needs_capture())
            || matches!(self.naif_ids, Some(IdsSpec::Parse) | Some(IdsSpec::Map(_)));

        let specificity = (if date_site.is_some() { 1 } else { 0 })
            + time_sites.len()
            + usize::from(has_version)
            + usize::from(has_property_captures);

        let ext = match extension_of(&self.pattern) {
            ext if ext.len() > 1 => Some(ext),
            _ => None,
        };

        Ok(Rule {
            regex,
            pattern: compiled,
            ext,
            specificity,
            date_site,
            time_sites,
            inclusive: self.inclusive,
            version_sites,
            version_named,
            version_spec: self.version,
            family: self.family,
            naif_ids: self.naif_ids,
            source: self.source,
            dest: self.dest,
            properties: self.properties,
        })
    }
}

// -------------------------------------------------------------------------------------------------
// Rule
// -------------------------------------------------------------------------------------------------

/// One compiled rule for interpreting kernel file basenames.
#[derive(Clone)]
pub struct Rule {
    regex: regex::Regex,
    pattern: String,
    ext: Option<String>,
    specificity: usize,
    date_site: Option<TagSite>,
    time_sites: Vec<TagSite>,
    inclusive: bool,
    version_sites: Vec<TagSite>,
    version_named: bool,
    version_spec: Option<VersionSpec>,
    family: Option<String>,
    naif_ids: Option<IdsSpec>,
    source: Vec<String>,
    dest: Option<Utf8PathBuf>,
    properties: Vec<(String, PropertySpec)>,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("pattern", &self.pattern)
            .field("specificity", &self.specificity)
            .finish()
    }
}

impl Rule {
    /// Compile a rule from a pattern alone, with every option at its default.
    pub fn new(pattern: &str) -> Result<Rule> {
        RuleBuilder::new(pattern).build()
    }

    /// The tag-compiled pattern text.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The number of semantic fields this rule captures.
    pub fn specificity(&self) -> usize {
        self.specificity
    }

    /// Apply this rule to a basename. Matching is against the full string only.
    ///
    /// Returns `None` when the basename does not match; otherwise the extracted
    /// information, which may be empty for a matching pattern with no tagged fields.
    pub fn match_basename(&self, basename: &str) -> Result<Option<RuleInfo>> {
        let caps = match self.regex.captures(basename) {
            Some(caps) => caps,
            None => return Ok(None),
        };

        let mut info = RuleInfo::default();

        // Release date
        if let Some(site) = &self.date_site {
            if let Some(text) = caps.get(site.group).map(|m| m.as_str()) {
                info.release_date = Some(date_iso(text, &site.tag)?);
            }
        }

        // Time limits
        if self.time_sites.len() == 2 {
            let mut times = [0.0f64; 2];
            for (slot, site) in times.iter_mut().zip(&self.time_sites) {
                let text = caps
                    .get(site.group)
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                *slot = tdb_from_iso(&date_iso(text, &site.tag)?)?;
            }
            if self.inclusive {
                times[1] += SECONDS_PER_DAY;
            }
            info.time = Some((times[0], times[1]));
        }

        // Version
        info.version = self.derive_version(&caps)?;

        // Family
        if let Some(template) = &self.family {
            let mut family = String::new();
            caps.expand(template, &mut family);
            info.family = Some(family);
        } else {
            info.family = self.default_family(basename, &caps);
        }

        // NAIF IDs
        if let Some(spec) = &self.naif_ids {
            info.naif_ids = match spec {
                IdsSpec::Literal(ids) => Some(ids.clone()),
                IdsSpec::Parse => caps
                    .name("naif_ids")
                    .and_then(|m| m.as_str().parse().ok())
                    .map(|id| IdSet::from([id])),
                IdsSpec::Map(table) => caps
                    .name("naif_ids")
                    .and_then(|m| table.get(&m.as_str().to_lowercase()))
                    .cloned(),
            };
        }

        if !self.source.is_empty() {
            info.source = Some(self.source.clone());
        }
        if self.dest.is_some() {
            info.dest = self.dest.clone();
        }

        // Custom properties
        for (name, spec) in &self.properties {
            let value = match spec {
                PropertySpec::Literal(value) => Some(value.clone()),
                PropertySpec::Capture => caps
                    .name(name)
                    .map(|m| PropertyValue::from_scalar(Scalar::Text(m.as_str().to_string()))),
                PropertySpec::Map(table) => caps
                    .name(name)
                    .and_then(|m| table.get(&m.as_str().to_lowercase()))
                    .map(|scalar| PropertyValue::from_scalar(scalar.clone())),
                PropertySpec::With(func) => caps
                    .name(name)
                    .and_then(|m| func(m.as_str()))
                    .map(PropertyValue::from_scalar),
            };
            if let Some(value) = value {
                info.properties.insert(name.clone(), value);
            }
        }

        Ok(Some(info))
    }

    fn derive_version(&self, caps: &regex::Captures<'_>) -> Result<Option<Version>> {
        // Text of the implicit or explicit version capture, groups joined with "."
        let captured: Option<String> = if self.version_named {
            caps.name("version").map(|m| m.as_str().to_string())
        } else if !self.version_sites.is_empty() {
            let parts: Option<Vec<&str>> = self
                .version_sites
                .iter()
                .map(|site| caps.get(site.group).map(|m| m.as_str()))
                .collect();
            parts.map(|p| p.join("."))
        } else {
            None
        };

        match (&self.version_spec, captured) {
            (Some(VersionSpec::Literal(version)), _) => Ok(Some(version.clone())),
            (Some(VersionSpec::Map(table)), Some(text)) => {
                Ok(table.get(&text.to_lowercase()).cloned())
            }
            (Some(VersionSpec::With(func)), Some(text)) => Ok(func(&text)),
            (_, Some(text)) => Ok(Some(Version::parse(&text))),
            (_, None) => Ok(None),
        }
    }

    /// The default family name: the basename with each matched date/time/version tag
    /// span replaced by its symbolic tag text, working backwards from the end.
    fn default_family(&self, basename: &str, caps: &regex::Captures<'_>) -> Option<String> {
        let mut sites: Vec<&TagSite> = Vec::new();
        if let Some(site) = &self.date_site {
            sites.push(site);
        }
        sites.extend(&self.time_sites);
        sites.extend(&self.version_sites);

        if sites.is_empty() {
            return None;
        }

        let mut spans: Vec<(usize, usize, &str)> = sites
            .iter()
            .filter_map(|site| {
                caps.get(site.group)
                    .map(|m| (m.start(), m.end(), site.tag.as_str()))
            })
            .collect();
        spans.sort_by_key(|&(start, _, _)| std::cmp::Reverse(start));

        let mut family = basename.to_string();
        for (start, end, tag) in spans {
            family.replace_range(start..end, tag);
        }
        Some(family)
    }
}

/// Convert a matched date substring into `YYYY-MM-DD` format, using the tag text to
/// locate the year, month, and day fields.
fn date_iso(text: &str, tag: &str) -> Result<String> {
    let bad = || SpiceRackError::TimeFormat(format!("{text} ({tag})"));

    let year = if let Some(i) = tag.find("YYYY") {
        text.get(i..i + 4).ok_or_else(bad)?.parse().map_err(|_| bad())?
    } else {
        let i = tag.find("YY").ok_or_else(bad)?;
        let two: i32 = text.get(i..i + 2).ok_or_else(bad)?.parse().map_err(|_| bad())?;
        window_year(two)
    };

    if let Some(i) = tag.find("DOY") {
        let doy: u32 = text.get(i..i + 3).ok_or_else(bad)?.parse().map_err(|_| bad())?;
        let (y, m, d) = ymd_from_doy(year, doy)?;
        return Ok(crate::time::iso_date(y, m as u32, d as u32));
    }

    let month = if let Some(i) = tag.find("MON") {
        month_number(text.get(i..i + 3).ok_or_else(bad)?).ok_or_else(bad)?
    } else {
        let i = tag.find("MM").ok_or_else(bad)?;
        text.get(i..i + 2).ok_or_else(bad)?.parse().map_err(|_| bad())?
    };

    let i = tag.find("DD").ok_or_else(bad)?;
    let day: u32 = text.get(i..i + 2).ok_or_else(bad)?.parse().map_err(|_| bad())?;

    Ok(crate::time::iso_date(year, month, day))
}

/// The month number of a three-letter month name, any case.
pub(crate) fn month_number(name: &str) -> Option<u32> {
    match name.to_ascii_lowercase().as_str() {
        "jan" => Some(1),
        "feb" => Some(2),
        "mar" => Some(3),
        "apr" => Some(4),
        "may" => Some(5),
        "jun" => Some(6),
        "jul" => Some(7),
        "aug" => Some(8),
        "sep" => Some(9),
        "oct" => Some(10),
        "nov" => Some(11),
        "dec" => Some(12),
        _ => None,
    }
}

// -------------------------------------------------------------------------------------------------
// RuleSet
// -------------------------------------------------------------------------------------------------

const SPECIFICITY_LEVELS: usize = 6;

/// The registry of every defined rule, bucketed by file extension and specificity.
#[derive(Debug, Default)]
pub struct RuleSet {
    buckets: HashMap<String, Vec<Vec<Rule>>>,
}

impl RuleSet {
    pub fn new() -> Self {
        RuleSet::default()
    }

    /// Register a rule. Rules whose pattern carries no recognizable extension go into
    /// the generic bucket and are tried for every basename.
    pub fn add(&mut self, rule: Rule) {
        let key = rule.ext.clone().unwrap_or_default();
        let level = rule.specificity.min(SPECIFICITY_LEVELS - 1);
        self.buckets
            .entry(key)
            .or_insert_with(|| vec![Vec::new(); SPECIFICITY_LEVELS])[level]
            .push(rule);
    }

    /// Extract the merged rule-based info for a basename.
    ///
    /// Buckets are visited from the lowest specificity to the highest, the generic
    /// bucket before the extension-specific one at each level, so higher-specificity
    /// rules always override lower-specificity ones on overlapping fields; within equal
    /// specificity, later-registered rules win.
    pub fn apply_all(&self, basename: &str) -> Result<RuleInfo> {
        let ext = extension_of(basename);
        let mut keys = vec![""];
        if !ext.is_empty() {
            keys.push(ext.as_str());
        }

        let mut result = RuleInfo::default();
        for level in 0..SPECIFICITY_LEVELS {
            for key in &keys {
                let Some(levels) = self.buckets.get(*key) else {
                    continue;
                };
                for rule in &levels[level] {
                    if let Some(info) = rule.match_basename(basename)? {
                        result.update(info);
                    }
                }
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod rule_test {
    use super::*;

    #[test]
    fn untagged_pattern_extracts_nothing() {
        // A plain capturing group is not a tag, so nothing is extracted
        let rule = Rule::new(r"naif(\d\d\d\d)\.tls").unwrap();
        let info = rule.match_basename("naif0012.tls").unwrap().unwrap();
        assert!(info.is_empty());
        assert!(rule.match_basename("naif12.tls").unwrap().is_none());
        assert_eq!(rule.specificity(), 0);
    }

    #[test]
    fn release_date_with_literal_family() {
        let rule = RuleBuilder::new(r"(YYMMDD)\.bc")
            .family("kernel_YYMMDD.bc")
            .build()
            .unwrap();
        let info = rule.match_basename("030115.bc").unwrap().unwrap();
        assert_eq!(info.release_date.as_deref(), Some("2003-01-15"));
        assert_eq!(info.family.as_deref(), Some("kernel_YYMMDD.bc"));
    }

    #[test]
    fn derived_family_is_version_invariant() {
        let rule = Rule::new(r"sat(NNN)\.bsp").unwrap();

        let a = rule.match_basename("sat337.bsp").unwrap().unwrap();
        let b = rule.match_basename("sat095.bsp").unwrap().unwrap();

        assert_eq!(a.family.as_deref(), Some("satNNN.bsp"));
        assert_eq!(a.family, b.family);
        assert_eq!(a.version.unwrap().single(), Some(&Scalar::Int(337)));
        assert_eq!(b.version.unwrap().single(), Some(&Scalar::Int(95)));
    }

    #[test]
    fn hierarchical_version_tuple() {
        let rule = Rule::new(r"kernel_v(N+)\.(N)\.(N)\.bc").unwrap();
        let info = rule.match_basename("kernel_v10.2.3.bc").unwrap().unwrap();
        assert_eq!(
            info.version.unwrap().single(),
            Some(&Scalar::Tuple(vec![10, 2, 3]))
        );
        assert_eq!(info.family.as_deref(), Some("kernel_vN+.N.N.bc"));
    }

    #[test]
    fn two_dates_become_a_time_range() {
        let rule = Rule::new(r"scpse_(YYDOY)_(YYDOY)\.bsp").unwrap();
        let info = rule.match_basename("scpse_08045_08067.bsp").unwrap().unwrap();
        let (t0, t1) = info.time.unwrap();

        // 22 days plus the inclusive end-of-day extension
        assert!((t1 - t0 - 23.0 * SECONDS_PER_DAY).abs() < 1.0e-6);
        assert_eq!(info.release_date, None);

        let exclusive = RuleBuilder::new(r"scpse_(YYDOY)_(YYDOY)\.bsp")
            .exclusive_end()
            .build()
            .unwrap();
        let info = exclusive
            .match_basename("scpse_08045_08067.bsp")
            .unwrap()
            .unwrap();
        let (t0, t1) = info.time.unwrap();
        assert!((t1 - t0 - 22.0 * SECONDS_PER_DAY).abs() < 1.0e-6);
    }

    #[test]
    fn three_dates_date_first_and_last() {
        let first = Rule::new(r"k_(YYMMDD)_(YYMMDD)_(YYMMDD)\.bc").unwrap();
        let info = first
            .match_basename("k_220301_220101_220201.bc")
            .unwrap()
            .unwrap();
        assert_eq!(info.release_date.as_deref(), Some("2022-03-01"));
        let (t0, _) = info.time.unwrap();
        assert_eq!(crate::time::iso_from_tdb(t0), "2022-01-01");

        let last = RuleBuilder::new(r"k_(YYMMDD)_(YYMMDD)_(YYMMDD)\.bc")
            .date_last()
            .build()
            .unwrap();
        let info = last
            .match_basename("k_220101_220201_220301.bc")
            .unwrap()
            .unwrap();
        assert_eq!(info.release_date.as_deref(), Some("2022-03-01"));
    }

    #[test]
    fn month_name_dates() {
        let rule = Rule::new(r"ork_(YYYY_MON_DD)\.ti").unwrap();
        let info = rule.match_basename("ork_2004_Jun_30.ti").unwrap().unwrap();
        assert_eq!(info.release_date.as_deref(), Some("2004-06-30"));
    }

    #[test]
    fn version_map_and_misses() {
        let table = HashMap::from([
            ("a".to_string(), Version::parse("1")),
            ("b".to_string(), Version::parse("2")),
        ]);
        let rule = RuleBuilder::new(r"jup100-(X)\.bsp")
            .version(VersionSpec::Map(table))
            .build()
            .unwrap();

        let hit = rule.match_basename("jup100-a.bsp").unwrap().unwrap();
        assert_eq!(hit.version.unwrap().single(), Some(&Scalar::Int(1)));

        // An unmapped capture silently omits the field
        let miss = rule.match_basename("jup100-c.bsp").unwrap().unwrap();
        assert!(miss.version.is_none());
    }

    #[test]
    fn property_capture_and_literal() {
        let rule = RuleBuilder::new(r"(?P<target>\w+)_v(NN)\.tf")
            .property("target", PropertySpec::Capture)
            .property("mission", PropertySpec::Literal(PropertyValue::from_scalar("cassini".into())))
            .build()
            .unwrap();

        let info = rule.match_basename("titan_v02.tf").unwrap().unwrap();
        assert_eq!(
            info.properties["target"],
            PropertyValue::from_scalar(Scalar::Text("titan".to_string()))
        );
        assert_eq!(
            info.properties["mission"],
            PropertyValue::from_scalar(Scalar::Text("cassini".to_string()))
        );
    }

    #[test]
    fn construction_errors() {
        // four date tags
        assert!(Rule::new(r"(YYMMDD)(YYMMDD)(YYMMDD)(YYMMDD)\.bc").is_err());
        // name and number version tags together
        assert!(Rule::new(r"k_(NN)_(XX)\.bsp").is_err());
        // two name-version tags
        assert!(Rule::new(r"k_(XX)_(XX)\.bsp").is_err());
        // a mapped version with no capture to feed it
        assert!(RuleBuilder::new(r"k\.bsp")
            .version(VersionSpec::Map(HashMap::new()))
            .build()
            .is_err());
        // a capture-based property without its named group
        assert!(RuleBuilder::new(r"k\.bsp")
            .property("target", PropertySpec::Capture)
            .build()
            .is_err());
    }

    #[test]
    fn specificity_overrides_registration_order() {
        for reversed in [false, true] {
            let generic = RuleBuilder::new(r"sat\d+\.bsp")
                .family("generic")
                .build()
                .unwrap();
            let specific = Rule::new(r"sat(NNN)\.bsp").unwrap();

            let mut rules = RuleSet::new();
            if reversed {
                rules.add(specific.clone());
                rules.add(generic.clone());
            } else {
                rules.add(generic.clone());
                rules.add(specific.clone());
            }

            let info = rules.apply_all("sat337.bsp").unwrap();
            assert_eq!(info.family.as_deref(), Some("satNNN.bsp"));
            assert_eq!(info.version.unwrap().single(), Some(&Scalar::Int(337)));
        }
    }

    #[test]
    fn equal_specificity_later_registration_wins() {
        let mut rules = RuleSet::new();
        rules.add(RuleBuilder::new(r"sat\d+\.bsp").family("first").build().unwrap());
        rules.add(RuleBuilder::new(r"sat\d+\.bsp").family("second").build().unwrap());

        let info = rules.apply_all("sat337.bsp").unwrap();
        assert_eq!(info.family.as_deref(), Some("second"));
    }

    #[test]
    fn case_insensitive_by_default() {
        let rule = Rule::new(r"sat(NNN)\.bsp").unwrap();
        assert!(rule.match_basename("SAT337.BSP").unwrap().is_some());

        let strict = RuleBuilder::new(r"sat(NNN)\.bsp").case_sensitive().build().unwrap();
        assert!(strict.match_basename("SAT337.BSP").unwrap().is_none());
    }
}
