//! # Coverage oracle
//!
//! The numerical toolkit that actually parses binary kernel containers and performs the
//! load/unload side effect on the external session sits **outside** this crate. The
//! [`CoverageOracle`] trait is the seam: the metadata store asks it which object IDs a
//! located file contains and what time window it covers, and the furnishing engine drives
//! its `load`/`unload` primitives as the leaf action of every furnish.
//!
//! Two implementations ship here:
//!
//! - [`NoopOracle`] — performs no side effects and supports no content inspection. With
//!   it, every attribute must come from rules, catalogs, or manual definitions; this is
//!   the debug mode in which furnish sequences can be exercised without a toolkit.
//! - [`TableOracle`] — canned per-basename coverage tables, for catalogs whose file
//!   content is known ahead of time and for tests.

use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};

use crate::constants::IdSet;
use crate::kinds::Kind;
use crate::spicerack_errors::{Result, SpiceRackError};

/// One value from a parsed text kernel keyword table.
#[derive(Clone, Debug, PartialEq)]
pub enum TkValue {
    Integer(i64),
    Real(f64),
    Text(String),
    IntArray(Vec<i64>),
    TextArray(Vec<String>),
}

/// A flat keyword table parsed from a text kernel.
pub type KeywordTable = HashMap<String, TkValue>;

/// Interface to the external toolkit that inspects kernel content and mutates the
/// external session.
pub trait CoverageOracle {
    /// The set of object IDs a located file describes.
    fn object_ids(&self, path: &Utf8Path, kind: Kind) -> Result<IdSet>;

    /// The overall time coverage of a located file, restricted to the given IDs, in
    /// seconds TDB.
    ///
    /// For pointing and clock files this may fail with a `Coverage` error when a
    /// required companion clock kernel is not currently furnished; the error propagates
    /// to the caller and is not retried here.
    fn time_coverage(&self, path: &Utf8Path, kind: Kind, ids: &IdSet) -> Result<(f64, f64)>;

    /// The parsed keyword table of a text kernel, when the toolkit has one available.
    /// Implementations may return `Unsupported`, in which case the metadata store falls
    /// back to brute-force scanning.
    fn text_keyword_table(&self, path: &Utf8Path) -> Result<KeywordTable>;

    /// Load the file into the external session.
    fn load(&mut self, path: &Utf8Path) -> Result<()>;

    /// Unload the file from the external session.
    fn unload(&mut self, path: &Utf8Path) -> Result<()>;
}

/// An oracle with no toolkit behind it: inspection is unsupported and load/unload do
/// nothing.
#[derive(Debug, Default, Clone)]
pub struct NoopOracle;

impl CoverageOracle for NoopOracle {
    fn object_ids(&self, path: &Utf8Path, _kind: Kind) -> Result<IdSet> {
        Err(SpiceRackError::Unsupported(path.to_string()))
    }

    fn time_coverage(&self, path: &Utf8Path, _kind: Kind, _ids: &IdSet) -> Result<(f64, f64)> {
        Err(SpiceRackError::Unsupported(path.to_string()))
    }

    fn text_keyword_table(&self, path: &Utf8Path) -> Result<KeywordTable> {
        Err(SpiceRackError::Unsupported(path.to_string()))
    }

    fn load(&mut self, _path: &Utf8Path) -> Result<()> {
        Ok(())
    }

    fn unload(&mut self, _path: &Utf8Path) -> Result<()> {
        Ok(())
    }
}

/// An oracle answering from canned per-basename tables, recording the load order it was
/// driven through.
#[derive(Debug, Default, Clone)]
pub struct TableOracle {
    ids: HashMap<String, IdSet>,
    coverage: HashMap<String, (f64, f64)>,
    keywords: HashMap<String, KeywordTable>,
    /// Paths currently loaded, in load order.
    pub loaded: Vec<Utf8PathBuf>,
}

impl TableOracle {
    pub fn new() -> Self {
        TableOracle::default()
    }

    /// Define the object IDs and coverage window for a basename.
    pub fn insert_coverage<I: IntoIterator<Item = i32>>(
        &mut self,
        basename: &str,
        ids: I,
        window: (f64, f64),
    ) {
        self.ids
            .insert(basename.to_string(), ids.into_iter().collect());
        self.coverage.insert(basename.to_string(), window);
    }

    /// Define the parsed keyword table for a text kernel basename.
    pub fn insert_keywords(&mut self, basename: &str, table: KeywordTable) {
        self.keywords.insert(basename.to_string(), table);
    }

    fn key(path: &Utf8Path) -> &str {
        path.file_name().unwrap_or(path.as_str())
    }
}

impl CoverageOracle for TableOracle {
    fn object_ids(&self, path: &Utf8Path, _kind: Kind) -> Result<IdSet> {
        self.ids
            .get(Self::key(path))
            .cloned()
            .ok_or_else(|| SpiceRackError::Unsupported(path.to_string()))
    }

    fn time_coverage(&self, path: &Utf8Path, kind: Kind, _ids: &IdSet) -> Result<(f64, f64)> {
        match self.coverage.get(Self::key(path)) {
            Some(&window) => Ok(window),
            None if kind == Kind::Ck => Err(SpiceRackError::Coverage(format!(
                "{path}: no clock kernel furnished"
            ))),
            None => Err(SpiceRackError::Unsupported(path.to_string())),
        }
    }

    fn text_keyword_table(&self, path: &Utf8Path) -> Result<KeywordTable> {
        self.keywords
            .get(Self::key(path))
            .cloned()
            .ok_or_else(|| SpiceRackError::Unsupported(path.to_string()))
    }

    fn load(&mut self, path: &Utf8Path) -> Result<()> {
        self.loaded.push(path.to_owned());
        Ok(())
    }

    fn unload(&mut self, path: &Utf8Path) -> Result<()> {
        self.loaded.retain(|loaded| loaded != path);
        Ok(())
    }
}
