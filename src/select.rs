//! # Filter, reduction, and expansion
//!
//! Candidate selection over lists of basenames. [`Filter`] applies independent
//! name/time/identifier/date/version/property predicates; `reduce` computes the minimal
//! subset whose coverage of the request equals the full list's, with **later candidates
//! taking precedence** (painter's algorithm); `expand` relaxes a too-strict filter in
//! four tiers until every required identifier's best-available coverage is reached.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use regex::{Regex, RegexBuilder};

use crate::constants::{IdSet, NaifId, Request};
use crate::intern::BasenameId;
use crate::kernel::{ids_overlap, time_envelope};
use crate::kinds::{is_basename, Kind};
use crate::spicerack::SpiceRack;
use crate::spicerack_errors::{Result, SpiceRackError};
use crate::time::TimeRange;
use crate::values::{PropertyValue, Scalar};

// -------------------------------------------------------------------------------------------------
// Filter
// -------------------------------------------------------------------------------------------------

/// One name constraint: a literal basename or a compiled match pattern.
#[derive(Debug, Clone)]
pub enum NameFilter {
    Literal(String),
    Pattern(Regex),
}

impl NameFilter {
    /// A string of plain word characters ending in a kernel extension is a literal
    /// basename; anything else compiles as a case-insensitive full-string pattern.
    pub fn parse(text: &str) -> Result<NameFilter> {
        if is_basename(text) {
            Ok(NameFilter::Literal(text.to_string()))
        } else {
            let regex = RegexBuilder::new(&format!("^(?:{text})$"))
                .case_insensitive(true)
                .build()?;
            Ok(NameFilter::Pattern(regex))
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            NameFilter::Literal(literal) => literal == name,
            NameFilter::Pattern(regex) => regex.is_match(name),
        }
    }
}

/// A multi-predicate candidate filter. Every constraint is optional; each applies
/// independently.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// Candidates must match at least one of these names or patterns.
    pub names: Vec<NameFilter>,
    /// Candidates must overlap this time window.
    pub time: TimeRange,
    /// Candidates must cover at least one of these identifiers.
    pub ids: IdSet,
    /// Inclusive release-date range; candidates without a release date fail a bound.
    pub dates: (Option<String>, Option<String>),
    /// Inclusive version range; undefined or type-incompatible versions fail a bound.
    pub versions: (Option<Scalar>, Option<Scalar>),
    /// Property constraints: an absent property never excludes a candidate, a present
    /// one must intersect the requested values.
    pub properties: Vec<(String, PropertyValue)>,
}

impl Filter {
    pub fn new() -> Self {
        Filter::default()
    }

    pub fn name(mut self, text: &str) -> Result<Self> {
        self.names.push(NameFilter::parse(text)?);
        Ok(self)
    }

    pub fn over(mut self, tmin: f64, tmax: f64) -> Self {
        self.time = TimeRange::between(tmin, tmax);
        self
    }

    pub fn for_ids<I: IntoIterator<Item = NaifId>>(mut self, ids: I) -> Self {
        self.ids = ids.into_iter().collect();
        self
    }

    pub fn released_within(mut self, earliest: Option<&str>, latest: Option<&str>) -> Self {
        self.dates = (
            earliest.map(|d| d.to_string()),
            latest.map(|d| d.to_string()),
        );
        self
    }

    pub fn versions_within(mut self, lowest: Option<Scalar>, highest: Option<Scalar>) -> Self {
        self.versions = (lowest, highest);
        self
    }

    pub fn property(mut self, name: &str, value: PropertyValue) -> Self {
        self.properties.push((name.to_string(), value));
        self
    }

    /// The request this filter's time and identifier constraints describe.
    pub fn request(&self) -> Request {
        Request {
            time: self.time,
            ids: self.ids.clone(),
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Coverage map
// -------------------------------------------------------------------------------------------------

/// A painter's-algorithm interval map: painting an interval overwrites whatever earlier
/// owners covered it, so the later (higher-precedence) candidate owns the overlap.
#[derive(Debug, Default)]
struct CoverageMap {
    segs: Vec<(f64, f64, BasenameId)>,
}

impl CoverageMap {
    fn paint(&mut self, t0: f64, t1: f64, owner: BasenameId) {
        if t1 < t0 {
            return;
        }
        let mut next = Vec::with_capacity(self.segs.len() + 1);
        for &(a, b, w) in &self.segs {
            if b < t0 || a > t1 {
                next.push((a, b, w));
                continue;
            }
            if a < t0 {
                next.push((a, t0, w));
            }
            if b > t1 {
                next.push((t1, b, w));
            }
        }
        next.push((t0, t1, owner));
        next.sort_by(|x, y| x.0.partial_cmp(&y.0).unwrap_or(Ordering::Equal));
        self.segs = next;
    }

    fn owners_within(&self, t0: f64, t1: f64) -> BTreeSet<BasenameId> {
        self.segs
            .iter()
            .filter(|&&(a, b, _)| b >= t0 && a <= t1)
            .map(|&(_, _, w)| w)
            .collect()
    }
}

// -------------------------------------------------------------------------------------------------
// Engine
// -------------------------------------------------------------------------------------------------

impl SpiceRack {
    /// Apply a [`Filter`] to a candidate list, preserving its order.
    ///
    /// A property constraint naming a property no candidate carries at all is an error,
    /// since it is almost certainly a misspelling.
    pub fn filter_basenames(
        &mut self,
        candidates: &[BasenameId],
        filter: &Filter,
    ) -> Result<Vec<BasenameId>> {
        let mut kept: Vec<BasenameId> = candidates.to_vec();

        // Name membership
        if !filter.names.is_empty() {
            kept.retain(|&h| {
                let name = self.basename_owned(h);
                filter.names.iter().any(|f| f.matches(&name))
            });
        }

        // Property constraints, each independently; absent properties are wildcards
        for (prop_name, wanted) in &filter.properties {
            let mut seen_anywhere = false;
            let mut passing = Vec::new();
            for &h in &kept {
                let properties = self.properties(h)?;
                match properties.get(prop_name) {
                    Some(value) => {
                        seen_anywhere = true;
                        if value.intersects(wanted) {
                            passing.push(h);
                        }
                    }
                    None => passing.push(h),
                }
            }
            if !seen_anywhere {
                return Err(SpiceRackError::UnknownProperty(prop_name.clone()));
            }
            kept = passing;
        }

        // Time overlap
        if !filter.time.is_all() {
            let mut passing = Vec::new();
            for &h in &kept {
                let window = TimeRange::from_window(self.time(h)?);
                if window
                    .overlap(&filter.time, crate::constants::DEFAULT_TIME_SLACK)
                    .is_some()
                {
                    passing.push(h);
                }
            }
            kept = passing;
        }

        // Identifier overlap
        if !filter.ids.is_empty() {
            let mut passing = Vec::new();
            for &h in &kept {
                let ids = self.naif_ids(h)?;
                if ids_overlap(&ids, &filter.ids) {
                    passing.push(h);
                }
            }
            kept = passing;
        }

        // Release-date range, inclusive; a missing date fails any stated bound
        if filter.dates.0.is_some() || filter.dates.1.is_some() {
            let mut passing = Vec::new();
            for &h in &kept {
                let date = self.release_date(h)?;
                let after = filter
                    .dates
                    .0
                    .as_ref()
                    .map(|earliest| !date.is_empty() && date >= *earliest)
                    .unwrap_or(true);
                let before = filter
                    .dates
                    .1
                    .as_ref()
                    .map(|latest| !date.is_empty() && date <= *latest)
                    .unwrap_or(true);
                if after && before {
                    passing.push(h);
                }
            }
            kept = passing;
        }

        // Version range, inclusive; comparisons across value families fail
        if filter.versions.0.is_some() || filter.versions.1.is_some() {
            let mut passing = Vec::new();
            for &h in &kept {
                let version = self.version(h)?;
                let lower_ok = filter
                    .versions
                    .0
                    .as_ref()
                    .map(|lowest| version.any_ge(lowest))
                    .unwrap_or(true);
                let upper_ok = filter
                    .versions
                    .1
                    .as_ref()
                    .map(|highest| version.any_le(highest))
                    .unwrap_or(true);
                if lower_ok && upper_ok {
                    passing.push(h);
                }
            }
            kept = passing;
        }

        Ok(kept)
    }

    /// Reduce a candidate list to the subset actually contributing coverage for the
    /// request, later-listed candidates taking precedence on overlap.
    ///
    /// With no identifier constraint, the identifiers found among the candidates are
    /// used; with no time constraint either, the selection degenerates to the single
    /// highest-precedence candidate.
    pub fn reduce(
        &mut self,
        candidates: &[BasenameId],
        req: &Request,
    ) -> Result<Vec<BasenameId>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut ids = req.ids.clone();
        if ids.is_empty() {
            for &h in candidates {
                ids.extend(self.naif_ids(h)?);
            }
        }

        if ids.is_empty() && req.time.is_all() {
            return Ok(vec![*candidates.last().expect("non-empty")]);
        }

        let (w0, w1) = req.time.bounds();
        let mut keep: BTreeSet<BasenameId> = BTreeSet::new();

        // With no identifier information anywhere, paint a single anonymous map
        let id_slots: Vec<Option<NaifId>> = if ids.is_empty() {
            vec![None]
        } else {
            ids.iter().copied().map(Some).collect()
        };

        for slot in id_slots {
            let mut map = CoverageMap::default();
            for &h in candidates {
                if let Some(id) = slot {
                    let candidate_ids = self.naif_ids(h)?;
                    if !candidate_ids.is_empty() && !candidate_ids.contains(&id) {
                        continue;
                    }
                }
                let (t0, t1) = match self.time(h)? {
                    Some(window) => window,
                    None => (crate::constants::TIME_FLOOR, crate::constants::TIME_CEILING),
                };
                map.paint(t0, t1, h);
            }
            keep.extend(map.owners_within(w0, w1));
        }

        Ok(candidates
            .iter()
            .copied()
            .filter(|h| keep.contains(h))
            .collect())
    }

    /// Expand a filtered candidate list when it leaves some required identifier's window
    /// only partially covered, relaxing constraints through four tiers:
    ///
    /// 1. earlier dates/versions, keeping the name filter;
    /// 2. any dates/versions, keeping the name filter;
    /// 3. earlier dates/versions without the name filter;
    /// 4. no constraints at all.
    ///
    /// The first tier whose reduced coverage reaches every identifier's best-available
    /// coverage (judged against the unfiltered pool) wins. Newly added candidates are
    /// ordered *before* the originally filtered ones, at lower precedence.
    pub fn expand(
        &mut self,
        filtered: &[BasenameId],
        pool: &[BasenameId],
        filter: &Filter,
    ) -> Result<Vec<BasenameId>> {
        // The identifiers whose coverage must be reached
        let mut ids = filter.ids.clone();
        if ids.is_empty() {
            for &h in filtered {
                ids.extend(self.naif_ids(h)?);
            }
        }
        let mut pool_ids = IdSet::new();
        for &h in pool {
            pool_ids.extend(self.naif_ids(h)?);
        }
        if !pool_ids.is_empty() {
            ids.retain(|id| pool_ids.contains(id));
        }
        if ids.is_empty() {
            return Ok(filtered.to_vec());
        }

        // Best-available and current coverage per identifier
        let window = filter.time;
        let mut targets: Vec<(NaifId, (f64, f64), (bool, bool))> = Vec::new();
        for &id in &ids {
            let id_set = IdSet::from([id]);
            let best = match time_envelope(self, pool, Some(&id_set))? {
                Some(Some(window)) => window,
                Some(None) => (crate::constants::TIME_FLOOR, crate::constants::TIME_CEILING),
                None => continue,
            };
            let (q0, q1) = window.bounds();
            let best = (best.0.max(q0), best.1.min(q1));
            if best.0 > best.1 {
                continue; // nothing available overlaps the requested window
            }

            let needed = match time_envelope(self, filtered, Some(&id_set))? {
                Some(Some((c0, c1))) => (c0 > best.0, c1 < best.1),
                Some(None) => (false, false),
                None => (true, true),
            };
            if needed != (false, false) {
                targets.push((id, best, needed));
            }
        }
        if targets.is_empty() {
            return Ok(filtered.to_vec());
        }

        // The four relaxation tiers
        let name_filtered: Vec<BasenameId> = if filter.names.is_empty() {
            pool.to_vec()
        } else {
            let mut kept = pool.to_vec();
            kept.retain(|&h| {
                let name = self.basename_owned(h);
                filter.names.iter().any(|f| f.matches(&name))
            });
            kept
        };

        let date_upper = filter.dates.1.clone();
        let version_upper = filter.versions.1.clone();
        let relaxed = date_upper.is_none() && version_upper.is_none();

        let pool_list = pool.to_vec();
        let mut tiers: Vec<(Vec<BasenameId>, Option<String>, Option<Scalar>)> = Vec::new();
        for list in [&name_filtered, &pool_list] {
            if !relaxed {
                tiers.push((list.clone(), date_upper.clone(), version_upper.clone()));
            }
            tiers.push((list.clone(), None, None));
        }

        let mut added: BTreeSet<BasenameId> = BTreeSet::new();
        for (list, tier_date, tier_version) in tiers {
            let mut tier_set: BTreeSet<BasenameId> = BTreeSet::new();
            let mut satisfied = true;

            for &(id, best, needed) in &targets {
                let tier_filter = Filter {
                    names: Vec::new(),
                    time: window,
                    ids: IdSet::from([id]),
                    dates: (None, tier_date.clone()),
                    versions: (None, tier_version.clone()),
                    properties: Vec::new(),
                };
                let for_id = self.filter_basenames(&list, &tier_filter)?;

                let coverage = time_envelope(self, &for_id, Some(&IdSet::from([id])))?;
                let (t0, t1) = match coverage {
                    Some(Some(window)) => window,
                    Some(None) => (crate::constants::TIME_FLOOR, crate::constants::TIME_CEILING),
                    None => (f64::INFINITY, f64::NEG_INFINITY),
                };

                tier_set.extend(for_id);

                let start_ok = !needed.0 || t0 <= best.0;
                let end_ok = !needed.1 || t1 >= best.1;
                if !(start_ok && end_ok) {
                    satisfied = false;
                    break;
                }
            }

            added = tier_set;
            if satisfied {
                break;
            }
        }

        // New candidates come first, at lower precedence, in pool order
        let mut result: Vec<BasenameId> = pool
            .iter()
            .copied()
            .filter(|h| added.contains(h) && !filtered.contains(h))
            .collect();
        result.extend_from_slice(filtered);
        Ok(result)
    }

    /// Filter, then optionally expand to restore identifier coverage, then optionally
    /// reduce to the minimal contributing subset.
    pub fn select_basenames(
        &mut self,
        candidates: &[BasenameId],
        filter: &Filter,
        expand: bool,
        reduce: bool,
    ) -> Result<Vec<BasenameId>> {
        let mut selected = self.filter_basenames(candidates, filter)?;
        if expand {
            selected = self.expand(&selected, candidates, filter)?;
        }
        if reduce {
            selected = self.reduce(&selected, &filter.request())?;
        }
        Ok(selected)
    }

    // ---------------------------------------------------------------------------------------------
    // Enumeration
    // ---------------------------------------------------------------------------------------------

    /// Every bound basename matching a query, sorted by the requested keys.
    pub fn find_all(&mut self, query: &FindQuery) -> Result<Vec<BasenameId>> {
        let sort_keys = if query.sort.is_empty() {
            vec![SortKey::Alpha]
        } else {
            query.sort.clone()
        };

        // Gather the candidate pool
        let mut handles: Vec<BasenameId> = if !query.patterns.is_empty() {
            let mut set: BTreeSet<BasenameId> = BTreeSet::new();
            for pattern in &query.patterns {
                let regex = RegexBuilder::new(&format!("^(?:{pattern})$"))
                    .case_insensitive(true)
                    .build()?;
                let source: Vec<BasenameId> = match Kind::from_pattern(pattern).or(query.kind) {
                    Some(kind) => self.bound_of_kind(kind),
                    None => self.bound_basenames(),
                };
                for h in source {
                    if regex.is_match(self.basename(h)) {
                        set.insert(h);
                    }
                }
            }
            set.into_iter().collect()
        } else if let Some(kind) = query.kind {
            self.bound_of_kind(kind)
        } else {
            self.bound_basenames()
        };

        if let Some(ref family) = query.family {
            let mut kept = Vec::new();
            for h in handles {
                if self.family(h)? == *family {
                    kept.push(h);
                }
            }
            handles = kept;
        }

        if let Some(ref version) = query.version {
            let mut kept = Vec::new();
            for h in handles {
                let candidate = self.version(h)?;
                if candidate
                    .as_set()
                    .intersection(version.as_set())
                    .next()
                    .is_some()
                {
                    kept.push(h);
                }
            }
            handles = kept;
        }

        // Sort by the requested key hierarchy
        let mut keyed: Vec<(Vec<SortPart>, BasenameId)> = Vec::new();
        for h in handles {
            keyed.push((self.sort_key(h, &sort_keys)?, h));
        }
        keyed.sort();
        let sorted: Vec<BasenameId> = keyed.iter().map(|(_, h)| *h).collect();

        // Merge with an explicit ordering when one is given
        if query.order.is_empty() {
            return Ok(sorted);
        }

        let mut merged: Vec<BasenameId> = Vec::new();
        for name in &query.order {
            if let Some(h) = self.lookup(name) {
                if sorted.contains(&h) && !merged.contains(&h) {
                    merged.push(h);
                }
            }
        }
        for (key, extra) in keyed {
            if merged.contains(&extra) {
                continue;
            }
            let mut insert_at = 0;
            for (i, &placed) in merged.iter().enumerate() {
                let placed_key = self.sort_key(placed, &sort_keys)?;
                if placed_key <= key {
                    insert_at = i + 1;
                }
            }
            merged.insert(insert_at, extra);
        }
        Ok(merged)
    }

    fn sort_key(&mut self, handle: BasenameId, keys: &[SortKey]) -> Result<Vec<SortPart>> {
        let mut parts = Vec::new();
        for key in keys {
            let part = match key {
                SortKey::Alpha => SortPart::Text(self.basename_owned(handle)),
                SortKey::Caseless => SortPart::Text(self.basename_owned(handle).to_lowercase()),
                SortKey::Date => SortPart::Text(self.release_date(handle)?),
                SortKey::Version => {
                    let version = self.version(handle)?;
                    match version.as_set().iter().next() {
                        Some(Scalar::Int(v)) => SortPart::Version(0, vec![*v], String::new()),
                        Some(Scalar::Tuple(parts)) => {
                            SortPart::Version(0, parts.clone(), String::new())
                        }
                        Some(Scalar::Text(t)) => SortPart::Version(1, Vec::new(), t.clone()),
                        None => SortPart::Version(2, Vec::new(), self.basename_owned(handle)),
                    }
                }
            };
            parts.push(part);
        }
        Ok(parts)
    }
}

/// A query for [`SpiceRack::find_all`].
#[derive(Debug, Clone, Default)]
pub struct FindQuery {
    /// Patterns the basename must match; empty means all.
    pub patterns: Vec<String>,
    /// Exact family name to require.
    pub family: Option<String>,
    /// Versions to require; a candidate matches when the sets intersect.
    pub version: Option<crate::values::Version>,
    /// Restrict to one kind. Unnecessary when a pattern's extension implies it.
    pub kind: Option<Kind>,
    /// Sort key hierarchy; empty sorts alphabetically.
    pub sort: Vec<SortKey>,
    /// Explicit basename ordering to merge the sorted result into.
    pub order: Vec<String>,
}

/// Sort keys for [`SpiceRack::find_all`]. Versions sort integers and tuples together,
/// strings above them, and undefined versions last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Alpha,
    Caseless,
    Version,
    Date,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SortPart {
    Text(String),
    Version(u8, Vec<u64>, String),
}
