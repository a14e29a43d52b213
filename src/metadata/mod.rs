//! # Metadata store
//!
//! One lazily-derived, cached record of semantic attributes per kernel basename. For each
//! attribute the resolution order is:
//!
//! 1. the explicit rule-engine result, with no fallback;
//! 2. direct content inspection — the coverage oracle for binary files, the parsed
//!    keyword table or a brute-force scan of data-section lines for text files;
//! 3. the default basename heuristics;
//! 4. for the release date only, a secondary scan of embedded comments and labels for the
//!    most plausible date; and finally
//! 5. the file's own filesystem timestamp.
//!
//! Each of those behavioral steps can be switched off independently through [`Switches`]
//! for testing and debugging.
//!
//! Manual overrides are recorded as typed [`ManualDef`] commands. When a basename's
//! underlying location changes, the record is rebuilt from scratch and the command log is
//! replayed in order, so explicit definitions survive a rebind.

pub mod aliases;
pub mod dates;
pub mod text;

use camino::Utf8Path;

use crate::constants::{IdSet, EARLIEST_RELEASE_DATE};
use crate::kinds::{extension_is_text, extension_of, Kind};
use crate::metadata::aliases::AliasTable;
use crate::oracle::CoverageOracle;
use crate::rules::{RuleInfo, RuleSet};
use crate::rules::default_rule::DefaultRule;
use crate::spicerack_errors::{Result, SpiceRackError};
use crate::time::{iso_from_tdb, iso_from_timestamp, tdb_from_iso};
use crate::values::{Properties, PropertyValue, Scalar, Version};

/// Behavioral switches for attribute inference, each independently toggleable.
#[derive(Clone, Copy, Debug)]
pub struct Switches {
    /// Consult explicitly registered rules.
    pub use_rules: bool,
    /// Consult the default basename heuristics.
    pub use_default_rules: bool,
    /// Scan embedded comments and labels for plausible release dates.
    pub use_internal_dates: bool,
    /// Fall back to the filesystem timestamp for the release date.
    pub use_timestamp_dates: bool,
}

impl Default for Switches {
    fn default() -> Self {
        Switches {
            use_rules: true,
            use_default_rules: true,
            use_internal_dates: true,
            use_timestamp_dates: true,
        }
    }
}

/// One manual attribute mutation, replayed onto a rebuilt record after a location rebind.
#[derive(Clone, Debug, PartialEq)]
pub enum ManualDef {
    SetIds(IdSet),
    AddIds(IdSet),
    RemoveIds(IdSet),
    SetTime(Option<(f64, f64)>),
    SetReleaseDate(String),
    SetVersion(Version),
    SetFamily(String),
    SetProperty(String, PropertyValue),
    RemoveProperty(String),
}

/// Everything attribute derivation needs besides the record itself.
pub(crate) struct FileCtx<'a> {
    pub rules: &'a RuleSet,
    pub aliases: &'a AliasTable,
    pub switches: Switches,
    pub oracle: &'a dyn CoverageOracle,
    pub path: Option<&'a Utf8Path>,
}

/// The per-basename metadata record. Every attribute is computed at most once and
/// memoized; manual setters overwrite the cached value and append to the command log.
#[derive(Debug, Default)]
pub struct KernelInfo {
    basename: String,
    ext: String,
    kind: Option<Kind>,

    rule_values: Option<RuleInfo>,
    default_values: Option<RuleInfo>,

    ids_as_found: Option<IdSet>,
    ids_with_aliases: Option<IdSet>,
    ids_wo_aliases: Option<IdSet>,
    time: Option<Option<(f64, f64)>>,
    release_date: Option<String>,
    version: Option<Version>,
    family: Option<String>,
    properties: Option<Properties>,
    meta_basenames: Option<Vec<String>>,

    text: Option<Vec<String>>,
    text_content: Option<Vec<String>>,
    text_comments: Option<Vec<String>>,
    label: Option<Vec<String>>,
    comments: Option<Vec<String>>,

    manual_defs: Vec<ManualDef>,
}

impl KernelInfo {
    pub fn new(basename: &str) -> Result<Self> {
        let ext = extension_of(basename);
        let kind = Kind::from_basename(basename)?;
        Ok(KernelInfo {
            basename: basename.to_string(),
            ext,
            kind: Some(kind),
            ..KernelInfo::default()
        })
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    pub fn kind(&self) -> Kind {
        self.kind.unwrap_or(Kind::Meta)
    }

    pub fn is_text(&self) -> bool {
        extension_is_text(&self.ext)
    }

    pub fn is_binary(&self) -> bool {
        !self.is_text()
    }

    pub fn manual_defs(&self) -> &[ManualDef] {
        &self.manual_defs
    }

    // ---------------------------------------------------------------------------------------------
    // Rule and default-rule results
    // ---------------------------------------------------------------------------------------------

    fn ensure_rule_values(&mut self, ctx: &FileCtx<'_>) -> Result<()> {
        if self.rule_values.is_none() {
            let mut info = ctx.rules.apply_all(&self.basename)?;
            if !ctx.switches.use_rules {
                info.release_date = None;
                info.time = None;
                info.version = None;
                info.family = None;
            }
            self.rule_values = Some(info);
        }
        Ok(())
    }

    fn ensure_default_values(&mut self, ctx: &FileCtx<'_>) -> Result<()> {
        if self.default_values.is_none() {
            self.default_values = Some(if ctx.switches.use_default_rules {
                DefaultRule::apply(&self.basename)?
            } else {
                RuleInfo::default()
            });
        }
        Ok(())
    }

    /// Remote source directories for this basename, as inferred by rules.
    pub(crate) fn source(&mut self, ctx: &FileCtx<'_>) -> Result<Vec<String>> {
        self.ensure_rule_values(ctx)?;
        Ok(self
            .rule_values
            .as_ref()
            .and_then(|info| info.source.clone())
            .unwrap_or_default())
    }

    /// Local destination directory for a downloaded file, as inferred by rules.
    pub(crate) fn dest(&mut self, ctx: &FileCtx<'_>) -> Result<Option<camino::Utf8PathBuf>> {
        self.ensure_rule_values(ctx)?;
        Ok(self.rule_values.as_ref().and_then(|info| info.dest.clone()))
    }

    // ---------------------------------------------------------------------------------------------
    // NAIF IDs
    // ---------------------------------------------------------------------------------------------

    /// The set of NAIF IDs this file applies to, aliases included. An empty set means
    /// the file applies to every identifier.
    pub(crate) fn naif_ids(&mut self, ctx: &FileCtx<'_>) -> Result<IdSet> {
        self.derive_ids(ctx)?;
        Ok(self.ids_with_aliases.clone().unwrap_or_default())
    }

    /// The NAIF IDs reduced to primary identifiers.
    pub(crate) fn naif_ids_wo_aliases(&mut self, ctx: &FileCtx<'_>) -> Result<IdSet> {
        self.derive_ids(ctx)?;
        Ok(self.ids_wo_aliases.clone().unwrap_or_default())
    }

    /// The NAIF IDs exactly as found in the file or rules, before alias handling.
    pub(crate) fn naif_ids_as_found(&mut self, ctx: &FileCtx<'_>) -> Result<IdSet> {
        self.derive_ids(ctx)?;
        Ok(self.ids_as_found.clone().unwrap_or_default())
    }

    fn derive_ids(&mut self, ctx: &FileCtx<'_>) -> Result<()> {
        if self.ids_with_aliases.is_some() {
            return Ok(());
        }

        // Leapseconds kernels apply to every identifier
        let as_found: IdSet = if self.kind() == Kind::Lsk {
            IdSet::new()
        } else {
            self.ensure_rule_values(ctx)?;
            let rule_ids = self
                .rule_values
                .as_ref()
                .and_then(|info| info.naif_ids.clone());

            match rule_ids {
                Some(ids) => ids,
                None => {
                    let path = ctx
                        .path
                        .ok_or_else(|| SpiceRackError::NotFound(self.basename.clone()))?;
                    if self.is_text() {
                        let mut ids = match ctx.oracle.text_keyword_table(path) {
                            Ok(table) => text::ids_from_table(&table),
                            Err(SpiceRackError::Unsupported(_)) => {
                                self.ensure_text_split(ctx)?;
                                let content =
                                    self.text_content.as_deref().unwrap_or_default();
                                text::ids_from_content(content)
                            }
                            Err(error) => return Err(error),
                        };
                        // A text kernel that names no identifier still applies to
                        // something specific, not to everything
                        if ids.is_empty() {
                            ids.insert(0);
                        }
                        ids
                    } else {
                        ctx.oracle.object_ids(path, self.kind())?
                    }
                }
            }
        };

        self.ids_with_aliases = Some(ctx.aliases.expand(&as_found));
        self.ids_wo_aliases = Some(ctx.aliases.normalize(&as_found));
        self.ids_as_found = Some(as_found);
        Ok(())
    }

    // ---------------------------------------------------------------------------------------------
    // Time coverage
    // ---------------------------------------------------------------------------------------------

    /// Time limits in seconds TDB; `None` when the file applies to all times.
    ///
    /// The file may have coverage gaps inside the window, but nothing applies outside
    /// it.
    pub(crate) fn time(&mut self, ctx: &FileCtx<'_>) -> Result<Option<(f64, f64)>> {
        if let Some(window) = self.time {
            return Ok(window);
        }

        // Leapseconds, shape, and clock kernels, and text constants, apply to all times
        if matches!(self.kind(), Kind::Lsk | Kind::Dsk | Kind::Sclk) || self.ext == ".tpc" {
            self.time = Some(None);
            return Ok(None);
        }

        self.ensure_rule_values(ctx)?;
        if let Some(window) = self.rule_values.as_ref().and_then(|info| info.time) {
            self.time = Some(Some(window));
            return Ok(Some(window));
        }

        if self.is_binary() {
            let path = ctx
                .path
                .ok_or_else(|| SpiceRackError::NotFound(self.basename.clone()))?;
            let ids = self.naif_ids_wo_aliases(ctx)?;
            let window = ctx.oracle.time_coverage(path, self.kind(), &ids)?;
            self.time = Some(Some(window));
            return Ok(Some(window));
        }

        self.ensure_default_values(ctx)?;
        if let Some(window) = self.default_values.as_ref().and_then(|info| info.time) {
            self.time = Some(Some(window));
            return Ok(Some(window));
        }

        self.time = Some(None);
        Ok(None)
    }

    // ---------------------------------------------------------------------------------------------
    // Release date
    // ---------------------------------------------------------------------------------------------

    /// Release date as `YYYY-MM-DD`; an empty string when nothing can be determined.
    pub(crate) fn release_date(&mut self, ctx: &FileCtx<'_>) -> Result<String> {
        if let Some(ref date) = self.release_date {
            return Ok(date.clone());
        }

        // 1. Explicit rules
        self.ensure_rule_values(ctx)?;
        if let Some(date) = self
            .rule_values
            .as_ref()
            .and_then(|info| info.release_date.clone())
        {
            self.release_date = Some(date.clone());
            return Ok(date);
        }

        // 2. The most reliable creation markers in comments and labels
        if ctx.path.is_some() {
            self.ensure_comments(ctx)?;
            self.ensure_label(ctx)?;
            let mut lines = self.comments.clone().unwrap_or_default();
            lines.extend(self.label.clone().unwrap_or_default());

            let mut found = dates::creation_dates(&lines);
            found.retain(|date| date.as_str() > EARLIEST_RELEASE_DATE);
            if let Some(date) = found.into_iter().min() {
                self.release_date = Some(date.clone());
                return Ok(date);
            }

            // 3. Clock kernels state their identification date reliably
            if self.kind() == Kind::Sclk {
                self.ensure_text_split(ctx)?;
                let content = self.text_content.clone().unwrap_or_default();
                for line in &content {
                    if line.to_uppercase().contains("SCLK_KERNEL_ID") {
                        if let Some(date) = dates::dates_in_string(line).into_iter().next() {
                            self.release_date = Some(date.clone());
                            return Ok(date);
                        }
                    }
                }
            }
        }

        // 4. Default basename heuristics
        self.ensure_default_values(ctx)?;
        if let Some(date) = self
            .default_values
            .as_ref()
            .and_then(|info| info.release_date.clone())
        {
            self.release_date = Some(date.clone());
            return Ok(date);
        }

        // 5. Latest embedded date that is not a coverage marker and not later than the
        //    file's own timestamp
        let timestamp_date = ctx.path.and_then(file_timestamp_date);
        if ctx.switches.use_internal_dates {
            if let Some(ref cap) = timestamp_date {
                for source in ["label", "comments"] {
                    let lines = match source {
                        "label" => self.label.clone().unwrap_or_default(),
                        _ => self.comments.clone().unwrap_or_default(),
                    };
                    if let Some(date) = dates::latest_plausible_date(&lines, cap) {
                        self.release_date = Some(date.clone());
                        return Ok(date);
                    }
                }
            }
        }

        // 6. The timestamp itself
        if ctx.switches.use_timestamp_dates {
            if let Some(date) = timestamp_date {
                self.release_date = Some(date.clone());
                return Ok(date);
            }
        }

        self.release_date = Some(String::new());
        Ok(String::new())
    }

    // ---------------------------------------------------------------------------------------------
    // Version, family, properties
    // ---------------------------------------------------------------------------------------------

    /// Version of this file; falls back to the release date, and is undefined when
    /// neither is available.
    pub(crate) fn version(&mut self, ctx: &FileCtx<'_>) -> Result<Version> {
        if let Some(ref version) = self.version {
            return Ok(version.clone());
        }

        self.ensure_rule_values(ctx)?;
        let mut version = self
            .rule_values
            .as_ref()
            .and_then(|info| info.version.clone());

        if version.is_none() {
            self.ensure_default_values(ctx)?;
            version = self
                .default_values
                .as_ref()
                .and_then(|info| info.version.clone());
        }

        let version = match version {
            Some(version) => version,
            None => {
                let date = self.release_date(ctx)?;
                if date.is_empty() {
                    Version::undefined()
                } else {
                    Version::from_scalar(Scalar::Text(date))?
                }
            }
        };

        self.version = Some(version.clone());
        Ok(version)
    }

    /// Family name; defaults to the basename itself when no rule tags anything.
    pub(crate) fn family(&mut self, ctx: &FileCtx<'_>) -> Result<String> {
        if let Some(ref family) = self.family {
            return Ok(family.clone());
        }

        self.ensure_rule_values(ctx)?;
        let mut family = self
            .rule_values
            .as_ref()
            .and_then(|info| info.family.clone());

        if family.is_none() {
            self.ensure_default_values(ctx)?;
            family = self
                .default_values
                .as_ref()
                .and_then(|info| info.family.clone());
        }

        let family = family.unwrap_or_else(|| self.basename.clone());
        self.family = Some(family.clone());
        Ok(family)
    }

    /// The custom property map, rules first, manual definitions applied on top in order.
    pub(crate) fn properties(&mut self, ctx: &FileCtx<'_>) -> Result<Properties> {
        if let Some(ref properties) = self.properties {
            return Ok(properties.clone());
        }

        self.ensure_rule_values(ctx)?;
        let mut properties = self
            .rule_values
            .as_ref()
            .map(|info| info.properties.clone())
            .unwrap_or_default();

        for def in &self.manual_defs {
            match def {
                ManualDef::SetProperty(name, value) => {
                    properties.insert(name.clone(), value.clone());
                }
                ManualDef::RemoveProperty(name) => {
                    properties.remove(name);
                }
                _ => {}
            }
        }

        self.properties = Some(properties.clone());
        Ok(properties)
    }

    // ---------------------------------------------------------------------------------------------
    // Metakernel support
    // ---------------------------------------------------------------------------------------------

    /// The basenames a metakernel loads, in order; empty for any other kind.
    pub(crate) fn meta_basenames(&mut self, ctx: &FileCtx<'_>) -> Result<Vec<String>> {
        if let Some(ref basenames) = self.meta_basenames {
            return Ok(basenames.clone());
        }

        let basenames = if self.kind() == Kind::Meta {
            self.ensure_text_split(ctx)?;
            text::meta_basenames(self.text_content.as_deref().unwrap_or_default())
        } else {
            Vec::new()
        };

        self.meta_basenames = Some(basenames.clone());
        Ok(basenames)
    }

    // ---------------------------------------------------------------------------------------------
    // File content
    // ---------------------------------------------------------------------------------------------

    fn ensure_text(&mut self, ctx: &FileCtx<'_>) -> Result<()> {
        if self.text.is_some() {
            return Ok(());
        }
        let path = ctx
            .path
            .ok_or_else(|| SpiceRackError::NotFound(self.basename.clone()))?;
        self.text = Some(if self.is_text() {
            text::read_lines(path)?
        } else {
            Vec::new()
        });
        Ok(())
    }

    fn ensure_text_split(&mut self, ctx: &FileCtx<'_>) -> Result<()> {
        if self.text_content.is_some() {
            return Ok(());
        }
        self.ensure_text(ctx)?;
        let (content, comments) = text::split_text(self.text.as_deref().unwrap_or_default());
        self.text_content = Some(content);
        self.text_comments = Some(comments);
        Ok(())
    }

    fn ensure_label(&mut self, ctx: &FileCtx<'_>) -> Result<()> {
        if self.label.is_some() {
            return Ok(());
        }
        let path = ctx
            .path
            .ok_or_else(|| SpiceRackError::NotFound(self.basename.clone()))?;

        let mut label = Vec::new();
        for candidate in companion_paths(path, "lbl") {
            if candidate.exists() {
                label = text::read_lines(&candidate)?;
                break;
            }
        }
        self.label = Some(label);
        Ok(())
    }

    /// Comments come from a `.cmt` companion file when present, otherwise from the
    /// non-data content of a text kernel. Binary kernels without a companion have none
    /// available here.
    fn ensure_comments(&mut self, ctx: &FileCtx<'_>) -> Result<()> {
        if self.comments.is_some() {
            return Ok(());
        }
        let path = ctx
            .path
            .ok_or_else(|| SpiceRackError::NotFound(self.basename.clone()))?;

        for candidate in companion_paths(path, "cmt") {
            if candidate.exists() {
                self.comments = Some(text::read_lines(&candidate)?);
                return Ok(());
            }
        }

        if self.is_text() {
            self.ensure_text_split(ctx)?;
            self.comments = self.text_comments.clone();
        } else {
            self.comments = Some(Vec::new());
        }
        Ok(())
    }

    // ---------------------------------------------------------------------------------------------
    // Manual definitions
    // ---------------------------------------------------------------------------------------------

    pub fn set_naif_ids(&mut self, ids: IdSet, aliases: &AliasTable) {
        let def = ManualDef::SetIds(ids);
        self.apply_manual(&def, aliases);
        self.manual_defs.push(def);
    }

    pub fn add_naif_ids(&mut self, ids: IdSet, aliases: &AliasTable) {
        let def = ManualDef::AddIds(ids);
        self.apply_manual(&def, aliases);
        self.manual_defs.push(def);
    }

    pub fn remove_naif_ids(&mut self, ids: IdSet, aliases: &AliasTable) {
        let def = ManualDef::RemoveIds(ids);
        self.apply_manual(&def, aliases);
        self.manual_defs.push(def);
    }

    /// Define the time window; `None` means all times. The window must satisfy
    /// start ≤ end.
    pub fn set_time(&mut self, window: Option<(f64, f64)>, aliases: &AliasTable) -> Result<()> {
        if let Some((t0, t1)) = window {
            if t0 > t1 {
                return Err(SpiceRackError::TimeFormat(format!(
                    "time range start after end: {t0} > {t1}"
                )));
            }
        }
        let def = ManualDef::SetTime(window);
        self.apply_manual(&def, aliases);
        self.manual_defs.push(def);
        Ok(())
    }

    pub fn set_release_date(&mut self, date: &str, aliases: &AliasTable) -> Result<()> {
        let def = ManualDef::SetReleaseDate(validate_release_date(date)?);
        self.apply_manual(&def, aliases);
        self.manual_defs.push(def);
        Ok(())
    }

    pub fn set_version(&mut self, version: Version, aliases: &AliasTable) {
        let def = ManualDef::SetVersion(version);
        self.apply_manual(&def, aliases);
        self.manual_defs.push(def);
    }

    pub fn set_family(&mut self, family: &str, aliases: &AliasTable) {
        let def = ManualDef::SetFamily(family.to_string());
        self.apply_manual(&def, aliases);
        self.manual_defs.push(def);
    }

    pub fn set_property(&mut self, name: &str, value: PropertyValue, aliases: &AliasTable) {
        let def = ManualDef::SetProperty(name.to_string(), value);
        self.apply_manual(&def, aliases);
        self.manual_defs.push(def);
    }

    pub fn remove_property(&mut self, name: &str, aliases: &AliasTable) {
        let def = ManualDef::RemoveProperty(name.to_string());
        self.apply_manual(&def, aliases);
        self.manual_defs.push(def);
    }

    /// Replay a command log onto this record, typically after a location rebind rebuilt
    /// it from scratch.
    pub fn replay(&mut self, defs: Vec<ManualDef>, aliases: &AliasTable) {
        for def in &defs {
            self.apply_manual(def, aliases);
        }
        self.manual_defs = defs;
    }

    /// Take the command log out of this record, leaving it empty.
    pub fn take_manual_defs(&mut self) -> Vec<ManualDef> {
        std::mem::take(&mut self.manual_defs)
    }

    fn apply_manual(&mut self, def: &ManualDef, aliases: &AliasTable) {
        match def {
            ManualDef::SetIds(ids) => {
                self.ids_as_found = Some(ids.clone());
                self.ids_with_aliases = Some(aliases.expand(ids));
                self.ids_wo_aliases = Some(aliases.normalize(ids));
            }
            ManualDef::AddIds(ids) => {
                let expanded = aliases.expand(ids);
                match self.ids_with_aliases {
                    Some(ref mut current) => current.extend(expanded),
                    None => self.ids_with_aliases = Some(expanded),
                }
                match self.ids_as_found {
                    Some(ref mut current) => current.extend(ids.iter().copied()),
                    None => self.ids_as_found = Some(ids.clone()),
                }
                let normalized = aliases.normalize(ids);
                match self.ids_wo_aliases {
                    Some(ref mut current) => current.extend(normalized),
                    None => self.ids_wo_aliases = Some(normalized),
                }
            }
            ManualDef::RemoveIds(ids) => {
                let expanded = aliases.expand(ids);
                if let Some(ref mut current) = self.ids_with_aliases {
                    current.retain(|id| !expanded.contains(id));
                }
                if let Some(ref mut current) = self.ids_as_found {
                    current.retain(|id| !expanded.contains(id));
                }
                let normalized = aliases.normalize(&expanded);
                if let Some(ref mut current) = self.ids_wo_aliases {
                    current.retain(|id| !normalized.contains(id));
                }
            }
            ManualDef::SetTime(window) => self.time = Some(*window),
            ManualDef::SetReleaseDate(date) => self.release_date = Some(date.clone()),
            ManualDef::SetVersion(version) => self.version = Some(version.clone()),
            ManualDef::SetFamily(family) => self.family = Some(family.clone()),
            ManualDef::SetProperty(_, _) | ManualDef::RemoveProperty(_) => {
                // Applied on top of the rule-derived map at derivation time
                self.properties = None;
            }
        }
    }
}

/// Normalize a release date string to `YYYY-MM-DD`; an empty input stays empty.
pub fn validate_release_date(date: &str) -> Result<String> {
    if date.is_empty() {
        return Ok(String::new());
    }
    Ok(iso_from_tdb(tdb_from_iso(date)?))
}

/// Companion paths `<stem>.<ext>` and `<fullname>.<ext>` next to a kernel file.
fn companion_paths(path: &Utf8Path, ext: &str) -> [camino::Utf8PathBuf; 2] {
    let stem = path.with_extension(ext);
    let full = camino::Utf8PathBuf::from(format!("{path}.{ext}"));
    [stem, full]
}

/// The ISO date of the file's timestamp, taking the earlier of creation and
/// modification when both are known.
fn file_timestamp_date(path: &Utf8Path) -> Option<String> {
    let meta = std::fs::metadata(path).ok()?;
    let stamps = [meta.created().ok(), meta.modified().ok()];
    stamps
        .into_iter()
        .flatten()
        .filter_map(iso_from_timestamp)
        .min()
}

#[cfg(test)]
mod metadata_test {
    use super::*;
    use crate::oracle::{NoopOracle, TableOracle};
    use crate::rules::Rule;
    use std::io::Write;

    fn write_file(dir: &Utf8Path, name: &str, content: &str) -> camino::Utf8PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{content}").unwrap();
        path
    }

    #[test]
    fn rules_take_priority_over_content() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp.path()).unwrap();
        let path = write_file(dir, "sat337.bsp", "binary stand-in");

        let mut rules = RuleSet::new();
        rules.add(Rule::new(r"sat(NNN)\.bsp").unwrap());

        let mut oracle = TableOracle::new();
        oracle.insert_coverage("sat337.bsp", [699], (0.0, 100.0));

        let aliases = AliasTable::new();
        let mut info = KernelInfo::new("sat337.bsp").unwrap();
        let ctx = FileCtx {
            rules: &rules,
            aliases: &aliases,
            switches: Switches::default(),
            oracle: &oracle,
            path: Some(&path),
        };

        // Version from the rule, IDs and time from the oracle
        assert_eq!(
            info.version(&ctx).unwrap().single(),
            Some(&Scalar::Int(337))
        );
        assert_eq!(info.family(&ctx).unwrap(), "satNNN.bsp");
        assert_eq!(info.naif_ids(&ctx).unwrap(), IdSet::from([699]));
        assert_eq!(info.time(&ctx).unwrap(), Some((0.0, 100.0)));
    }

    #[test]
    fn text_kernel_brute_force_scan() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp.path()).unwrap();
        let path = write_file(
            dir,
            "cas_rocks_v18.tf",
            "Frame definitions\n\\begindata\nFRAME_-82905_NAME = 'X'\nBODY65035_POLE_RA = ( 40. )\n",
        );

        let rules = RuleSet::new();
        let aliases = AliasTable::new();
        let oracle = NoopOracle;
        let mut info = KernelInfo::new("cas_rocks_v18.tf").unwrap();
        let ctx = FileCtx {
            rules: &rules,
            aliases: &aliases,
            switches: Switches::default(),
            oracle: &oracle,
            path: Some(&path),
        };

        let ids = info.naif_ids(&ctx).unwrap();
        assert!(ids.contains(&-82905));
        assert!(ids.contains(&65035));
        assert!(ids.contains(&-82)); // spacecraft alias of the frame ID

        // A frames kernel with no embedded dates still gets a version from its name
        assert_eq!(info.version(&ctx).unwrap().single(), Some(&Scalar::Int(18)));
    }

    #[test]
    fn family_falls_back_to_the_basename() {
        let rules = RuleSet::new();
        let aliases = AliasTable::new();
        let oracle = NoopOracle;
        let mut info = KernelInfo::new("naif0012.tls").unwrap();
        let ctx = FileCtx {
            rules: &rules,
            aliases: &aliases,
            switches: Switches::default(),
            oracle: &oracle,
            path: None,
        };

        assert_eq!(info.family(&ctx).unwrap(), "naif0012.tls");
        // Leapseconds kernels apply to everything and all time
        assert!(info.naif_ids(&ctx).unwrap().is_empty());
        assert_eq!(info.time(&ctx).unwrap(), None);
    }

    #[test]
    fn release_date_from_creation_comments() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp.path()).unwrap();
        let path = write_file(
            dir,
            "sat337.bsp",
            "stand-in; metadata comes from the companion file",
        );
        write_file(
            dir,
            "sat337.cmt",
            "SATEPHMERGE run of 2011-06-03\nSTOP_TIME = 2030-01-01\n",
        );

        let rules = RuleSet::new();
        let aliases = AliasTable::new();
        let oracle = NoopOracle;
        let mut info = KernelInfo::new("sat337.bsp").unwrap();
        let ctx = FileCtx {
            rules: &rules,
            aliases: &aliases,
            switches: Switches::default(),
            oracle: &oracle,
            path: Some(&path),
        };

        assert_eq!(info.release_date(&ctx).unwrap(), "2011-06-03");
    }

    #[test]
    fn timestamp_fallback_obeys_switches() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp.path()).unwrap();
        let path = write_file(dir, "jup.bsp", "no dates anywhere");

        let rules = RuleSet::new();
        let aliases = AliasTable::new();
        let oracle = NoopOracle;

        let mut info = KernelInfo::new("jup.bsp").unwrap();
        let ctx = FileCtx {
            rules: &rules,
            aliases: &aliases,
            switches: Switches::default(),
            oracle: &oracle,
            path: Some(&path),
        };
        let today = info.release_date(&ctx).unwrap();
        assert!(!today.is_empty());

        let mut info = KernelInfo::new("jup.bsp").unwrap();
        let ctx = FileCtx {
            rules: &rules,
            aliases: &aliases,
            switches: Switches {
                use_timestamp_dates: false,
                ..Switches::default()
            },
            oracle: &oracle,
            path: Some(&path),
        };
        assert_eq!(info.release_date(&ctx).unwrap(), "");
    }

    #[test]
    fn manual_defs_replay_after_rebind() {
        let aliases = AliasTable::new();
        let mut info = KernelInfo::new("sat337.bsp").unwrap();

        info.set_naif_ids(IdSet::from([699]), &aliases);
        info.add_naif_ids(IdSet::from([610]), &aliases);
        info.set_time(Some((0.0, 100.0)), &aliases).unwrap();
        info.set_release_date("2011-06-03", &aliases).unwrap();
        info.set_property(
            "mission",
            PropertyValue::from_scalar("cassini".into()),
            &aliases,
        );

        // Rebuild as the registry would after a rebind, replaying the log
        let defs = info.take_manual_defs();
        let mut rebuilt = KernelInfo::new("sat337.bsp").unwrap();
        rebuilt.replay(defs, &aliases);

        let rules = RuleSet::new();
        let oracle = NoopOracle;
        let ctx = FileCtx {
            rules: &rules,
            aliases: &aliases,
            switches: Switches::default(),
            oracle: &oracle,
            path: None,
        };

        assert_eq!(rebuilt.naif_ids(&ctx).unwrap(), IdSet::from([699, 610]));
        assert_eq!(rebuilt.time(&ctx).unwrap(), Some((0.0, 100.0)));
        assert_eq!(rebuilt.release_date(&ctx).unwrap(), "2011-06-03");
        assert!(rebuilt.properties(&ctx).unwrap().contains_key("mission"));
    }

    #[test]
    fn invalid_manual_time_is_rejected() {
        let aliases = AliasTable::new();
        let mut info = KernelInfo::new("sat337.bsp").unwrap();
        assert!(info.set_time(Some((100.0, 0.0)), &aliases).is_err());
    }
}
