//! # Rule engine
//!
//! Declarative rules deriving semantic attributes — time coverage, release date, version,
//! identifier set, family, and arbitrary properties — from kernel file basenames.
//!
//! See [`tags`] for the symbolic tag language, [`rule`] for rule construction and the
//! specificity-ordered registry, and [`default_rule`] for the heuristics that fill fields
//! no explicit rule provides.

pub mod default_rule;
pub mod rule;
pub mod tags;

pub use default_rule::DefaultRule;
pub use rule::{IdsSpec, PropertySpec, Rule, RuleBuilder, RuleInfo, RuleSet, VersionSpec};
pub use tags::remove_tags;

pub(crate) use rule::month_number;
