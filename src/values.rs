//! # Version and property values
//!
//! Kernel attributes extracted from basenames are not free-form: a version is an integer,
//! a tuple of integers (hierarchical, e.g. `v10.2.3`), or a name string, and a file that is
//! usable as several versions at once carries a *set* of those. Custom properties follow
//! the same shape. This module defines the tagged-union [`Scalar`] and the set-backed
//! [`Version`] / [`PropertyValue`] wrappers, together with the comparison and merge rules
//! the filter and aggregation layers rely on:
//!
//! - integers and tuples order together (an integer is a one-element tuple);
//! - name strings order only against other name strings;
//! - merging versions across composite members takes the maximum, but a mixture of
//!   numeric and string versions yields the *undefined* version rather than an error;
//! - merging properties unions value sets and never silently drops a conflicting value.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use crate::spicerack_errors::{Result, SpiceRackError};

// -------------------------------------------------------------------------------------------------
// Scalar
// -------------------------------------------------------------------------------------------------

/// One version or property value: an integer, a tuple of integers, or a text string.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scalar {
    Int(u64),
    Tuple(Vec<u64>),
    Text(String),
}

impl Scalar {
    /// True for `Int` and `Tuple`, false for `Text`.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Scalar::Text(_))
    }

    fn numeric_parts(&self) -> Option<&[u64]> {
        match self {
            Scalar::Int(v) => Some(std::slice::from_ref(v)),
            Scalar::Tuple(parts) => Some(parts),
            Scalar::Text(_) => None,
        }
    }

    /// Compare two scalars when they belong to the same family.
    ///
    /// Numeric scalars compare as integer tuples, text scalars lexicographically; a
    /// numeric/text mix is incomparable and returns `None`.
    pub fn compatible_cmp(&self, other: &Scalar) -> Option<Ordering> {
        match (self.numeric_parts(), other.numeric_parts()) {
            (Some(a), Some(b)) => Some(a.cmp(b)),
            (None, None) => match (self, other) {
                (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(b)),
                _ => unreachable!("non-numeric scalars are text"),
            },
            _ => None,
        }
    }
}

// Total order for set storage: numeric values first (tuple-extended), then text.
impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric_parts(), other.numeric_parts()) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => match (self, other) {
                (Scalar::Text(a), Scalar::Text(b)) => a.cmp(b),
                _ => unreachable!("non-numeric scalars are text"),
            },
        }
    }
}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Tuple(parts) => {
                let text: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
                write!(f, "{}", text.join("."))
            }
            Scalar::Text(t) => write!(f, "{t}"),
        }
    }
}

impl From<u64> for Scalar {
    fn from(v: u64) -> Self {
        Scalar::Int(v)
    }
}

impl From<&str> for Scalar {
    fn from(t: &str) -> Self {
        Scalar::Text(t.to_string())
    }
}

// -------------------------------------------------------------------------------------------------
// Version
// -------------------------------------------------------------------------------------------------

/// A version identification: empty (undefined) or a set of [`Scalar`] values. A file that
/// is usable as multiple versions carries more than one element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Version(BTreeSet<Scalar>);

impl Version {
    /// The undefined version.
    pub fn undefined() -> Self {
        Version::default()
    }

    /// A single-valued version, normalized (a one-element tuple collapses to an integer).
    pub fn from_scalar(scalar: Scalar) -> Result<Self> {
        Ok(Version(BTreeSet::from([normalize_scalar(scalar)?])))
    }

    /// Interpret a captured string: a dot-separated run of integers becomes a tuple (or a
    /// plain integer), anything else is a name string.
    pub fn parse(text: &str) -> Self {
        let parts: Option<Vec<u64>> = text.split('.').map(|p| p.parse().ok()).collect();
        let scalar = match parts {
            Some(nums) if !nums.is_empty() => {
                if nums.len() == 1 {
                    Scalar::Int(nums[0])
                } else {
                    Scalar::Tuple(nums)
                }
            }
            _ => Scalar::Text(text.to_string()),
        };
        Version(BTreeSet::from([scalar]))
    }

    /// Build a multi-valued version from several scalars.
    pub fn from_set<I: IntoIterator<Item = Scalar>>(scalars: I) -> Result<Self> {
        let mut set = BTreeSet::new();
        for scalar in scalars {
            set.insert(normalize_scalar(scalar)?);
        }
        Ok(Version(set))
    }

    pub fn is_undefined(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_defined(&self) -> bool {
        !self.0.is_empty()
    }

    /// The underlying set of values.
    pub fn as_set(&self) -> &BTreeSet<Scalar> {
        &self.0
    }

    /// The single value, when this version holds exactly one.
    pub fn single(&self) -> Option<&Scalar> {
        if self.0.len() == 1 {
            self.0.iter().next()
        } else {
            None
        }
    }

    /// True if any value in this version satisfies `lower <= value` under compatible
    /// comparison. An undefined version never satisfies a bound.
    pub fn any_ge(&self, lower: &Scalar) -> bool {
        self.0
            .iter()
            .any(|v| matches!(v.compatible_cmp(lower), Some(Ordering::Greater | Ordering::Equal)))
    }

    /// True if any value in this version satisfies `value <= upper` under compatible
    /// comparison. An undefined version never satisfies a bound.
    pub fn any_le(&self, upper: &Scalar) -> bool {
        self.0
            .iter()
            .any(|v| matches!(v.compatible_cmp(upper), Some(Ordering::Less | Ordering::Equal)))
    }

    /// Merge versions across the members of a composite kernel.
    ///
    /// The result is the maximum among defined versions. A mixture of numeric and string
    /// versions across members is ambiguous, and the aggregate is defined as the
    /// undefined version; this occurs routinely in composite queries and is not an error.
    pub fn merge_max<'a, I: IntoIterator<Item = &'a Version>>(versions: I) -> Version {
        let mut numeric: Option<Scalar> = None;
        let mut text: Option<Scalar> = None;

        for version in versions {
            for scalar in &version.0 {
                let slot = if scalar.is_numeric() {
                    &mut numeric
                } else {
                    &mut text
                };
                let replace = match slot {
                    Some(current) => scalar.cmp(current) == Ordering::Greater,
                    None => true,
                };
                if replace {
                    *slot = Some(scalar.clone());
                }
            }
        }

        match (numeric, text) {
            (Some(_), Some(_)) => Version::undefined(),
            (Some(v), None) | (None, Some(v)) => Version(BTreeSet::from([v])),
            (None, None) => Version::undefined(),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for scalar in &self.0 {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{scalar}")?;
            first = false;
        }
        Ok(())
    }
}

fn normalize_scalar(scalar: Scalar) -> Result<Scalar> {
    match scalar {
        Scalar::Tuple(parts) if parts.is_empty() => Err(SpiceRackError::InvalidVersion(
            "version tuple is empty".to_string(),
        )),
        Scalar::Tuple(parts) if parts.len() == 1 => Ok(Scalar::Int(parts[0])),
        other => Ok(other),
    }
}

// -------------------------------------------------------------------------------------------------
// Properties
// -------------------------------------------------------------------------------------------------

/// The value of a custom property: a non-empty set of scalars, a plain scalar being a
/// one-element set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropertyValue(BTreeSet<Scalar>);

impl PropertyValue {
    pub fn from_scalar(scalar: Scalar) -> Self {
        PropertyValue(BTreeSet::from([scalar]))
    }

    pub fn from_set<I: IntoIterator<Item = Scalar>>(scalars: I) -> Self {
        PropertyValue(scalars.into_iter().collect())
    }

    pub fn as_set(&self) -> &BTreeSet<Scalar> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Union another value into this one. Conflicting scalars accumulate rather than
    /// being dropped, so composite members never lose property information.
    pub fn union(&mut self, other: &PropertyValue) {
        self.0.extend(other.0.iter().cloned());
    }

    /// True if the two value sets share at least one scalar.
    pub fn intersects(&self, other: &PropertyValue) -> bool {
        self.0.intersection(&other.0).next().is_some()
    }
}

impl From<Scalar> for PropertyValue {
    fn from(scalar: Scalar) -> Self {
        PropertyValue::from_scalar(scalar)
    }
}

/// The open string-keyed property map carried by every metadata record.
pub type Properties = std::collections::HashMap<String, PropertyValue>;

/// Merge `from` into `into`, unioning value sets on key collisions.
pub fn merge_properties(into: &mut Properties, from: &Properties) {
    for (name, value) in from {
        into.entry(name.clone())
            .and_modify(|existing| existing.union(value))
            .or_insert_with(|| value.clone());
    }
}

#[cfg(test)]
mod values_test {
    use super::*;

    #[test]
    fn numeric_scalars_order_together() {
        let a = Scalar::Int(10);
        let b = Scalar::Tuple(vec![10, 2]);
        let c = Scalar::Tuple(vec![11]);

        assert_eq!(a.compatible_cmp(&b), Some(Ordering::Less));
        assert_eq!(b.compatible_cmp(&c), Some(Ordering::Less));
        assert_eq!(a.compatible_cmp(&Scalar::Int(10)), Some(Ordering::Equal));
    }

    #[test]
    fn text_and_numeric_are_incomparable() {
        let num = Scalar::Int(3);
        let text = Scalar::Text("a".to_string());
        assert_eq!(num.compatible_cmp(&text), None);
        assert_eq!(
            text.compatible_cmp(&Scalar::Text("b".to_string())),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn version_parsing() {
        assert_eq!(Version::parse("12").single(), Some(&Scalar::Int(12)));
        assert_eq!(
            Version::parse("10.2.3").single(),
            Some(&Scalar::Tuple(vec![10, 2, 3]))
        );
        assert_eq!(
            Version::parse("a61").single(),
            Some(&Scalar::Text("a61".to_string()))
        );
    }

    #[test]
    fn version_normalization() {
        let v = Version::from_scalar(Scalar::Tuple(vec![7])).unwrap();
        assert_eq!(v.single(), Some(&Scalar::Int(7)));
        assert!(Version::from_scalar(Scalar::Tuple(vec![])).is_err());
    }

    #[test]
    fn merge_takes_maximum() {
        let a = Version::from_scalar(Scalar::Int(90)).unwrap();
        let b = Version::from_scalar(Scalar::Int(120)).unwrap();
        let merged = Version::merge_max([&a, &b]);
        assert_eq!(merged.single(), Some(&Scalar::Int(120)));
    }

    #[test]
    fn mixed_families_merge_to_undefined() {
        let num = Version::from_scalar(Scalar::Int(3)).unwrap();
        let text = Version::from_scalar(Scalar::Text("a".to_string())).unwrap();
        assert!(Version::merge_max([&num, &text]).is_undefined());
    }

    #[test]
    fn range_bounds() {
        let v = Version::parse("10.2");
        assert!(v.any_ge(&Scalar::Int(10)));
        assert!(v.any_le(&Scalar::Tuple(vec![10, 3])));
        assert!(!v.any_le(&Scalar::Int(10)));
        assert!(!Version::undefined().any_ge(&Scalar::Int(0)));
    }

    #[test]
    fn property_union_never_drops() {
        let mut merged = Properties::new();
        let mut a = Properties::new();
        a.insert("mission".to_string(), PropertyValue::from_scalar("cassini".into()));
        let mut b = Properties::new();
        b.insert("mission".to_string(), PropertyValue::from_scalar("voyager".into()));

        merge_properties(&mut merged, &a);
        merge_properties(&mut merged, &b);

        assert_eq!(merged["mission"].as_set().len(), 2);
    }
}
