//! # SpiceRack: intern table, metadata store, and engine state
//!
//! This module defines the [`SpiceRack`] struct, the central façade that wires together:
//!
//! 1. **The intern table** — every basename is interned once into a stable
//!    [`BasenameId`](crate::intern::BasenameId) handle; kernels store handles, never
//!    re-wrapped strings.
//! 2. **The metadata store** — one lazily-derived
//!    [`KernelInfo`](crate::metadata::KernelInfo) record per basename, with manual
//!    overrides replayed across location rebinds.
//! 3. **The location registry** — basename → local path, with checksum-based duplicate
//!    handling.
//! 4. **The rule set and alias table** feeding attribute inference.
//! 5. **The furnishing state** — per-kind precedence lists plus the global veto and
//!    shadow rules — and the coverage oracle that performs the external load/unload.
//!
//! The design emphasizes *lazy derivation* and *explicit state*: nothing here is a
//! process-wide global, so tests construct isolated instances freely. All mutating
//! operations take `&mut self`; the exclusive borrow is what serializes furnish/unload
//! sequences against the single external session.
//!
//! ## Typical usage
//!
//! ```rust,no_run
//! use spicerack::spicerack::SpiceRack;
//! use spicerack::rules::Rule;
//! use spicerack::kernel::Kernel;
//! use spicerack::constants::Request;
//!
//! let mut rack = SpiceRack::new();
//! rack.add_rule(Rule::new(r"sat(NNN)\.bsp").unwrap());
//! rack.bind_path("/data/kernels/sat337.bsp").unwrap();
//!
//! let kernel = Kernel::file(&mut rack, "sat337.bsp").unwrap();
//! rack.furnish(&kernel, &Request::all()).unwrap();
//! ```
//!
//! ## See also
//! ------------
//! * [`Kernel`](crate::kernel::Kernel) – The polymorphic resource abstraction.
//! * [`Rule`](crate::rules::Rule) – Basename interpretation rules.
//! * [`CoverageOracle`](crate::oracle::CoverageOracle) – The external inspection and
//!   load/unload seam.
//! * [`Filter`](crate::select::Filter) – Candidate selection.

use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;

use crate::constants::IdSet;
use crate::fetch::Fetcher;
use crate::furnish::{FurnishedRegistry, ShadowRule, VetoRule};
use crate::intern::{BasenameId, Interner};
use crate::kernel::{time_envelope, Kernel, KernelFile, Relations};
use crate::kinds::{extension_of, Kind};
use crate::metadata::aliases::AliasTable;
use crate::metadata::text;
use crate::metadata::{FileCtx, KernelInfo, ManualDef, Switches};
use crate::oracle::{CoverageOracle, NoopOracle};
use crate::registry::{BindOutcome, LocationRegistry};
use crate::rules::{Rule, RuleSet};
use crate::spicerack_errors::{Result, SpiceRackError};
use crate::values::{Properties, PropertyValue, Version};

/// A catalog record describing one kernel file whose coverage is known ahead of time:
/// basename, time limits in seconds TDB, NAIF IDs, and release date.
#[derive(Clone, Debug, PartialEq)]
pub struct KTuple {
    pub basename: String,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub naif_ids: IdSet,
    pub release_date: String,
}

/// The engine state: intern table, metadata store, location registry, rule set, alias
/// table, furnished lists, global veto/shadow rules, and the external collaborators.
pub struct SpiceRack {
    pub(crate) interner: Interner,
    pub(crate) infos: Vec<KernelInfo>,
    pub(crate) registry: LocationRegistry,
    pub(crate) rules: RuleSet,
    pub(crate) aliases: AliasTable,
    pub(crate) switches: Switches,
    pub(crate) furnished: FurnishedRegistry,
    pub(crate) vetoes: Vec<VetoRule>,
    pub(crate) shadows: Vec<ShadowRule>,
    pub(crate) oracle: Box<dyn CoverageOracle>,
    pub(crate) fetcher: Option<Box<dyn Fetcher>>,
    pub(crate) download_root: Option<Utf8PathBuf>,
}

impl Default for SpiceRack {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SpiceRack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpiceRack")
            .field("basenames", &self.interner.len())
            .finish()
    }
}

impl SpiceRack {
    /// A rack with no toolkit behind it: content inspection is unavailable and
    /// load/unload are no-ops. Attributes come from rules, catalogs, and manual
    /// definitions.
    pub fn new() -> Self {
        Self::with_oracle(Box::new(NoopOracle))
    }

    /// A rack driving the given coverage oracle.
    pub fn with_oracle(oracle: Box<dyn CoverageOracle>) -> Self {
        SpiceRack {
            interner: Interner::new(),
            infos: Vec::new(),
            registry: LocationRegistry::new(),
            rules: RuleSet::new(),
            aliases: AliasTable::new(),
            switches: Switches::default(),
            furnished: FurnishedRegistry::default(),
            vetoes: Vec::new(),
            shadows: Vec::new(),
            oracle,
            fetcher: None,
            download_root: None,
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Configuration
    // ---------------------------------------------------------------------------------------------

    /// Register a basename interpretation rule.
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.add(rule);
    }

    /// The behavioral switches controlling attribute inference.
    pub fn switches_mut(&mut self) -> &mut Switches {
        &mut self.switches
    }

    /// The NAIF identifier alias table.
    pub fn aliases_mut(&mut self) -> &mut AliasTable {
        &mut self.aliases
    }

    /// Install a fetcher for basenames with remote sources but no local binding, and
    /// the local directory downloads land in.
    pub fn set_fetcher(&mut self, fetcher: Box<dyn Fetcher>, download_root: Utf8PathBuf) {
        self.fetcher = Some(fetcher);
        self.download_root = Some(download_root);
    }

    // ---------------------------------------------------------------------------------------------
    // Intern table
    // ---------------------------------------------------------------------------------------------

    /// Intern a basename, creating its metadata record on first sight. The extension
    /// must map to a known kind.
    pub fn intern(&mut self, basename: &str) -> Result<BasenameId> {
        if let Some(handle) = self.interner.get(basename) {
            return Ok(handle);
        }
        let info = KernelInfo::new(basename)?;
        let handle = self.interner.intern(basename);
        self.infos.push(info);
        Ok(handle)
    }

    /// The handle of an already-interned basename.
    pub fn lookup(&self, basename: &str) -> Option<BasenameId> {
        self.interner.get(basename)
    }

    /// The basename behind a handle.
    pub fn basename(&self, handle: BasenameId) -> &str {
        self.interner.resolve(handle)
    }

    pub(crate) fn basename_owned(&self, handle: BasenameId) -> String {
        self.basename(handle).to_string()
    }

    /// The kind of an interned basename.
    pub fn kind_of(&self, handle: BasenameId) -> Kind {
        self.infos[handle.index()].kind()
    }

    pub(crate) fn file_kernel(&self, handle: BasenameId) -> Kernel {
        Kernel::File(KernelFile {
            handle,
            kind: self.kind_of(handle),
            relations: Relations::default(),
        })
    }

    // ---------------------------------------------------------------------------------------------
    // Location registry
    // ---------------------------------------------------------------------------------------------

    /// Bind a local file to its basename.
    pub fn bind_path<P: AsRef<Utf8Path>>(&mut self, path: P) -> Result<BasenameId> {
        self.bind_path_as(path.as_ref(), None, false)
    }

    /// Bind a local file under an alternate basename and/or with override of a prior
    /// conflicting binding.
    ///
    /// A `.txt` file must prove itself a metakernel through its content; any other
    /// `.txt` is rejected as an unrecognized kernel. Replacing an existing binding
    /// rebuilds the metadata record and replays its manual definitions.
    pub fn bind_path_as(
        &mut self,
        path: &Utf8Path,
        newname: Option<&str>,
        force: bool,
    ) -> Result<BasenameId> {
        let basename = match newname {
            Some(name) => name.to_string(),
            None => path
                .file_name()
                .ok_or_else(|| SpiceRackError::NotFound(path.to_string()))?
                .to_string(),
        };
        let kind = Kind::from_basename(&basename)?;

        if extension_of(&basename) == ".txt" {
            let lines = text::read_lines(path)?;
            if !text::is_metakernel(&lines) {
                return Err(SpiceRackError::UnknownExtension(basename));
            }
        }

        let handle = self.intern(&basename)?;
        let outcome = self
            .registry
            .bind(handle, &basename, kind, path.to_owned(), force)?;

        if outcome == BindOutcome::Replaced {
            let defs = self.infos[handle.index()].take_manual_defs();
            let mut fresh = KernelInfo::new(&basename)?;
            fresh.replay(defs, &self.aliases);
            self.infos[handle.index()] = fresh;
        }
        Ok(handle)
    }

    /// The local path bound to a basename, if any.
    pub fn locate(&self, handle: BasenameId) -> Option<&Utf8Path> {
        self.registry.locate(handle)
    }

    pub(crate) fn registry_contains(&self, handle: BasenameId) -> bool {
        self.registry.contains(handle)
    }

    /// Every bound basename of a kind.
    pub fn bound_of_kind(&self, kind: Kind) -> Vec<BasenameId> {
        self.registry.of_kind(kind)
    }

    /// Every bound basename.
    pub fn bound_basenames(&self) -> Vec<BasenameId> {
        self.registry.all().sorted().collect()
    }

    /// Every bound basename whose name fully matches a case-insensitive pattern.
    pub fn matching(&self, pattern: &str) -> Result<Vec<BasenameId>> {
        let regex = regex::RegexBuilder::new(&format!("^(?:{pattern})$"))
            .case_insensitive(true)
            .build()?;
        Ok(self
            .registry
            .all()
            .filter(|&h| regex.is_match(self.basename(h)))
            .sorted()
            .collect())
    }

    // ---------------------------------------------------------------------------------------------
    // Attribute queries
    // ---------------------------------------------------------------------------------------------

    /// The NAIF IDs of a basename, aliases included; empty means "applies to every
    /// identifier". A metakernel unions the IDs of the files it lists.
    pub fn naif_ids(&mut self, handle: BasenameId) -> Result<IdSet> {
        if self.kind_of(handle) == Kind::Meta {
            let mut ids = IdSet::new();
            for child in self.meta_handles(handle)? {
                ids.extend(self.naif_ids(child)?);
            }
            return Ok(ids);
        }
        let path = self.registry.locate(handle).map(|p| p.to_owned());
        let info = &mut self.infos[handle.index()];
        let ctx = FileCtx {
            rules: &self.rules,
            aliases: &self.aliases,
            switches: self.switches,
            oracle: &*self.oracle,
            path: path.as_deref(),
        };
        info.naif_ids(&ctx)
    }

    /// The NAIF IDs reduced to primary identifiers.
    pub fn naif_ids_wo_aliases(&mut self, handle: BasenameId) -> Result<IdSet> {
        if self.kind_of(handle) == Kind::Meta {
            let mut ids = IdSet::new();
            for child in self.meta_handles(handle)? {
                ids.extend(self.naif_ids_wo_aliases(child)?);
            }
            return Ok(ids);
        }
        let path = self.registry.locate(handle).map(|p| p.to_owned());
        let info = &mut self.infos[handle.index()];
        let ctx = FileCtx {
            rules: &self.rules,
            aliases: &self.aliases,
            switches: self.switches,
            oracle: &*self.oracle,
            path: path.as_deref(),
        };
        info.naif_ids_wo_aliases(&ctx)
    }

    /// The NAIF IDs exactly as found, before alias handling.
    pub fn naif_ids_as_found(&mut self, handle: BasenameId) -> Result<IdSet> {
        let path = self.registry.locate(handle).map(|p| p.to_owned());
        let info = &mut self.infos[handle.index()];
        let ctx = FileCtx {
            rules: &self.rules,
            aliases: &self.aliases,
            switches: self.switches,
            oracle: &*self.oracle,
            path: path.as_deref(),
        };
        info.naif_ids_as_found(&ctx)
    }

    /// Time limits in seconds TDB; `None` when the basename applies to all times. A
    /// metakernel reports the envelope of the files it lists.
    pub fn time(&mut self, handle: BasenameId) -> Result<Option<(f64, f64)>> {
        if self.kind_of(handle) == Kind::Meta {
            let children = self.meta_handles(handle)?;
            return Ok(time_envelope(self, &children, None)?.flatten());
        }
        let path = self.registry.locate(handle).map(|p| p.to_owned());
        let info = &mut self.infos[handle.index()];
        let ctx = FileCtx {
            rules: &self.rules,
            aliases: &self.aliases,
            switches: self.switches,
            oracle: &*self.oracle,
            path: path.as_deref(),
        };
        info.time(&ctx)
    }

    /// Release date as `YYYY-MM-DD`; empty when unknown.
    pub fn release_date(&mut self, handle: BasenameId) -> Result<String> {
        let path = self.registry.locate(handle).map(|p| p.to_owned());
        let info = &mut self.infos[handle.index()];
        let ctx = FileCtx {
            rules: &self.rules,
            aliases: &self.aliases,
            switches: self.switches,
            oracle: &*self.oracle,
            path: path.as_deref(),
        };
        info.release_date(&ctx)
    }

    /// Version of a basename; undefined when nothing is known.
    pub fn version(&mut self, handle: BasenameId) -> Result<Version> {
        let path = self.registry.locate(handle).map(|p| p.to_owned());
        let info = &mut self.infos[handle.index()];
        let ctx = FileCtx {
            rules: &self.rules,
            aliases: &self.aliases,
            switches: self.switches,
            oracle: &*self.oracle,
            path: path.as_deref(),
        };
        info.version(&ctx)
    }

    /// Family name of a basename; the basename itself when nothing more specific is
    /// known.
    pub fn family(&mut self, handle: BasenameId) -> Result<String> {
        let path = self.registry.locate(handle).map(|p| p.to_owned());
        let info = &mut self.infos[handle.index()];
        let ctx = FileCtx {
            rules: &self.rules,
            aliases: &self.aliases,
            switches: self.switches,
            oracle: &*self.oracle,
            path: path.as_deref(),
        };
        info.family(&ctx)
    }

    /// Custom properties of a basename.
    pub fn properties(&mut self, handle: BasenameId) -> Result<Properties> {
        let path = self.registry.locate(handle).map(|p| p.to_owned());
        let info = &mut self.infos[handle.index()];
        let ctx = FileCtx {
            rules: &self.rules,
            aliases: &self.aliases,
            switches: self.switches,
            oracle: &*self.oracle,
            path: path.as_deref(),
        };
        info.properties(&ctx)
    }

    /// Remote source directories known for a basename.
    pub fn source(&mut self, handle: BasenameId) -> Result<Vec<String>> {
        let path = self.registry.locate(handle).map(|p| p.to_owned());
        let info = &mut self.infos[handle.index()];
        let ctx = FileCtx {
            rules: &self.rules,
            aliases: &self.aliases,
            switches: self.switches,
            oracle: &*self.oracle,
            path: path.as_deref(),
        };
        info.source(&ctx)
    }

    /// The basenames a metakernel lists, in load order.
    pub fn meta_basenames(&mut self, handle: BasenameId) -> Result<Vec<String>> {
        let path = self.registry.locate(handle).map(|p| p.to_owned());
        let info = &mut self.infos[handle.index()];
        let ctx = FileCtx {
            rules: &self.rules,
            aliases: &self.aliases,
            switches: self.switches,
            oracle: &*self.oracle,
            path: path.as_deref(),
        };
        info.meta_basenames(&ctx)
    }

    fn meta_handles(&mut self, handle: BasenameId) -> Result<Vec<BasenameId>> {
        let mut handles = Vec::new();
        for child in self.meta_basenames(handle)? {
            handles.push(self.intern(&child)?);
        }
        Ok(handles)
    }

    // ---------------------------------------------------------------------------------------------
    // Manual definitions
    // ---------------------------------------------------------------------------------------------

    /// Define the NAIF IDs of a basename explicitly.
    pub fn set_naif_ids(&mut self, handle: BasenameId, ids: IdSet) {
        self.infos[handle.index()].set_naif_ids(ids, &self.aliases);
    }

    /// Add NAIF IDs to a basename.
    pub fn add_naif_ids(&mut self, handle: BasenameId, ids: IdSet) {
        self.infos[handle.index()].add_naif_ids(ids, &self.aliases);
    }

    /// Remove NAIF IDs from a basename.
    pub fn remove_naif_ids(&mut self, handle: BasenameId, ids: IdSet) {
        self.infos[handle.index()].remove_naif_ids(ids, &self.aliases);
    }

    /// Define the time window of a basename; `None` means all times.
    pub fn set_time(&mut self, handle: BasenameId, window: Option<(f64, f64)>) -> Result<()> {
        self.infos[handle.index()].set_time(window, &self.aliases)
    }

    /// Define the release date of a basename.
    pub fn set_release_date(&mut self, handle: BasenameId, date: &str) -> Result<()> {
        self.infos[handle.index()].set_release_date(date, &self.aliases)
    }

    /// Define the version of a basename.
    pub fn set_version(&mut self, handle: BasenameId, version: Version) {
        self.infos[handle.index()].set_version(version, &self.aliases);
    }

    /// Define the family of a basename.
    pub fn set_family(&mut self, handle: BasenameId, family: &str) {
        self.infos[handle.index()].set_family(family, &self.aliases);
    }

    /// Define or replace a custom property of a basename.
    pub fn set_property(&mut self, handle: BasenameId, name: &str, value: PropertyValue) {
        self.infos[handle.index()].set_property(name, value, &self.aliases);
    }

    /// Remove a custom property of a basename.
    pub fn remove_property(&mut self, handle: BasenameId, name: &str) {
        self.infos[handle.index()].remove_property(name, &self.aliases);
    }

    /// The manual definition log of a basename.
    pub fn manual_defs(&self, handle: BasenameId) -> &[ManualDef] {
        self.infos[handle.index()].manual_defs()
    }

    /// Seed a record from a catalog tuple: time limits, NAIF IDs, and release date.
    pub fn set_info(&mut self, tuple: &KTuple) -> Result<BasenameId> {
        let handle = self.intern(&tuple.basename)?;
        let window = match (tuple.start_time, tuple.end_time) {
            (Some(t0), Some(t1)) => Some((t0, t1)),
            _ => None,
        };
        self.set_time(handle, window)?;
        self.set_naif_ids(handle, tuple.naif_ids.clone());
        if !tuple.release_date.is_empty() {
            self.set_release_date(handle, &tuple.release_date)?;
        }
        Ok(handle)
    }

    // ---------------------------------------------------------------------------------------------
    // Fetch plumbing
    // ---------------------------------------------------------------------------------------------

    pub(crate) fn fetcher_configured(&self) -> bool {
        self.fetcher.is_some() && self.download_root.is_some()
    }

    pub(crate) fn fetch_destination(&mut self, handle: BasenameId) -> Result<Utf8PathBuf> {
        let root = self
            .download_root
            .clone()
            .ok_or_else(|| SpiceRackError::Fetch("no download root configured".to_string()))?;

        let path = self.registry.locate(handle).map(|p| p.to_owned());
        let info = &mut self.infos[handle.index()];
        let ctx = FileCtx {
            rules: &self.rules,
            aliases: &self.aliases,
            switches: self.switches,
            oracle: &*self.oracle,
            path: path.as_deref(),
        };
        Ok(match info.dest(&ctx)? {
            Some(sub) => root.join(sub),
            None => root,
        })
    }

    pub(crate) fn run_fetcher(
        &self,
        sources: &[String],
        basename: &str,
        dest: &Utf8Path,
    ) -> Result<Utf8PathBuf> {
        let fetcher = self
            .fetcher
            .as_deref()
            .ok_or_else(|| SpiceRackError::Fetch("no fetcher configured".to_string()))?;
        fetcher.fetch(sources, basename, dest)
    }

    pub(crate) fn bind_fetched(&mut self, handle: BasenameId, path: Utf8PathBuf) -> Result<()> {
        let basename = self.basename_owned(handle);
        let kind = self.kind_of(handle);
        self.registry.bind(handle, &basename, kind, path, false)?;
        Ok(())
    }
}
