//! # Constants and type definitions for SpiceRack
//!
//! This module centralizes the **time constants**, **identifier types**, and **common type
//! definitions** used throughout the `spicerack` library.
//!
//! ## Overview
//!
//! - Time-scale constants (seconds per day, the default overlap slack)
//! - The [`NaifId`] / [`IdSet`] identifier types
//! - The [`Request`] structure describing a time-range / identifier query
//!
//! These definitions are used by all main modules, including the metadata store, the
//! furnishing engine, and the filter/reduction engine.

use std::collections::BTreeSet;

use crate::time::TimeRange;

// -------------------------------------------------------------------------------------------------
// Time constants
// -------------------------------------------------------------------------------------------------

/// Number of seconds in a Julian day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Default slack applied when comparing time coverage windows, in seconds TDB.
///
/// Two windows separated by less than this amount are treated as contiguous, so that
/// kernels with near-adjacent coverage still count as overlapping a request.
pub const DEFAULT_TIME_SLACK: f64 = 1.5 * SECONDS_PER_DAY;

/// Lower bound used when an all-time coverage window must be made concrete, seconds TDB.
pub const TIME_FLOOR: f64 = -1.0e30;

/// Upper bound used when an all-time coverage window must be made concrete, seconds TDB.
pub const TIME_CEILING: f64 = 1.0e30;

/// Earliest release date considered plausible when scanning embedded comments,
/// as an ISO date string. Dates before this are noise from template text.
pub const EARLIEST_RELEASE_DATE: &str = "1995-01-01";

// -------------------------------------------------------------------------------------------------
// Identifier types
// -------------------------------------------------------------------------------------------------

/// A NAIF integer identifier for a body, frame, instrument, or clock.
pub type NaifId = i32;

/// A set of NAIF IDs. An **empty set means "applies to every identifier"**, so the
/// overlap of an empty set with any other set is never empty.
pub type IdSet = BTreeSet<NaifId>;

// -------------------------------------------------------------------------------------------------
// Query descriptor
// -------------------------------------------------------------------------------------------------

/// A time-range / identifier query passed to the furnishing and selection engines.
///
/// The default request is unconstrained: all times, all identifiers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Request {
    /// Time window in seconds TDB; open bounds mean "unconstrained on that side".
    pub time: TimeRange,
    /// NAIF IDs of interest; an empty set means "any identifier".
    pub ids: IdSet,
}

impl Request {
    /// An unconstrained request covering all times and all identifiers.
    pub fn all() -> Self {
        Request::default()
    }

    /// A request restricted to a closed time window.
    pub fn over(tmin: f64, tmax: f64) -> Self {
        Request {
            time: TimeRange::between(tmin, tmax),
            ids: IdSet::new(),
        }
    }

    /// A request restricted to a set of NAIF IDs.
    pub fn for_ids<I: IntoIterator<Item = NaifId>>(ids: I) -> Self {
        Request {
            time: TimeRange::all(),
            ids: ids.into_iter().collect(),
        }
    }

    /// Restrict this request to a closed time window, consuming self.
    pub fn with_time(mut self, tmin: f64, tmax: f64) -> Self {
        self.time = TimeRange::between(tmin, tmax);
        self
    }

    /// Restrict this request to a set of NAIF IDs, consuming self.
    pub fn with_ids<I: IntoIterator<Item = NaifId>>(mut self, ids: I) -> Self {
        self.ids = ids.into_iter().collect();
        self
    }
}
