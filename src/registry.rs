//! # Location registry
//!
//! The mapping from kernel basename to local file path. The walkers and downloaders that
//! *populate* this registry live outside the core; what lives here is the bookkeeping they
//! feed: per-kind enumeration, duplicate handling, and the checksum comparison that
//! decides whether two files claiming the same basename actually differ.
//!
//! A duplicate basename with different content is a **warning**, not an error: the first
//! binding stays addressable and keeps winning unless the caller forces an override.

use std::collections::{BTreeSet, HashMap};
use std::io::Read;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::warn;

use crate::intern::BasenameId;
use crate::kinds::Kind;
use crate::spicerack_errors::{Result, SpiceRackError};

/// What happened when a path was offered for a basename.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindOutcome {
    /// First binding for this basename.
    New,
    /// Same path, or different path with identical content.
    Unchanged,
    /// Different content; the previous binding was kept and a warning issued.
    DuplicateKept,
    /// Different content; the new binding replaced the previous one on request.
    Replaced,
}

/// basename → local path mapping, with per-kind enumeration.
#[derive(Debug, Default, Clone)]
pub struct LocationRegistry {
    paths: HashMap<BasenameId, Utf8PathBuf>,
    by_kind: HashMap<Kind, BTreeSet<BasenameId>>,
}

impl LocationRegistry {
    pub fn new() -> Self {
        LocationRegistry::default()
    }

    /// Offer a path for a basename. The file must exist.
    ///
    /// With `force`, a conflicting binding is replaced; otherwise the previous binding
    /// is kept, and content is compared by checksum so that a bit-identical copy under
    /// another directory is accepted silently.
    pub fn bind(
        &mut self,
        id: BasenameId,
        name: &str,
        kind: Kind,
        path: Utf8PathBuf,
        force: bool,
    ) -> Result<BindOutcome> {
        if !path.exists() {
            return Err(SpiceRackError::NotFound(path.to_string()));
        }

        if let Some(old) = self.paths.get(&id) {
            if *old == path {
                return Ok(BindOutcome::Unchanged);
            }
            if force {
                self.paths.insert(id, path);
                return Ok(BindOutcome::Replaced);
            }
            if file_checksum(old)? == file_checksum(&path)? {
                return Ok(BindOutcome::Unchanged);
            }
            warn!(
                basename = name,
                kept = %old,
                offered = %path,
                "duplicate basename with different content; keeping the first binding"
            );
            return Ok(BindOutcome::DuplicateKept);
        }

        self.paths.insert(id, path);
        self.by_kind.entry(kind).or_default().insert(id);
        Ok(BindOutcome::New)
    }

    /// The local path bound to this basename, if any.
    pub fn locate(&self, id: BasenameId) -> Option<&Utf8Path> {
        self.paths.get(&id).map(|p| p.as_path())
    }

    pub fn contains(&self, id: BasenameId) -> bool {
        self.paths.contains_key(&id)
    }

    /// Every bound basename of a kind, in handle order.
    pub fn of_kind(&self, kind: Kind) -> Vec<BasenameId> {
        self.by_kind
            .get(&kind)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every bound basename.
    pub fn all(&self) -> impl Iterator<Item = BasenameId> + '_ {
        self.paths.keys().copied()
    }

}

/// CRC-32 checksum of a file, streamed in blocks.
pub fn file_checksum(path: &Utf8Path) -> Result<u32> {
    const BLOCK: usize = 65_536;

    let mut file = std::fs::File::open(path)?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buffer = vec![0u8; BLOCK];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize())
}

#[cfg(test)]
mod registry_test {
    use super::*;
    use crate::intern::Interner;
    use std::io::Write;

    fn touch(dir: &Utf8Path, name: &str, content: &str) -> Utf8PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{content}").unwrap();
        path
    }

    #[test]
    fn duplicate_handling() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp.path()).unwrap();
        let sub = dir.join("copy");
        std::fs::create_dir(&sub).unwrap();

        let mut interner = Interner::new();
        let id = interner.intern("sat337.bsp");
        let mut registry = LocationRegistry::new();

        let first = touch(dir, "sat337.bsp", "content-a");
        let same = touch(&sub, "sat337.bsp", "content-a");
        let different = touch(&sub, "sat337-other.bsp", "content-b");

        assert_eq!(
            registry
                .bind(id, "sat337.bsp", Kind::Spk, first.clone(), false)
                .unwrap(),
            BindOutcome::New
        );
        assert_eq!(
            registry
                .bind(id, "sat337.bsp", Kind::Spk, same, false)
                .unwrap(),
            BindOutcome::Unchanged
        );
        assert_eq!(
            registry
                .bind(id, "sat337.bsp", Kind::Spk, different.clone(), false)
                .unwrap(),
            BindOutcome::DuplicateKept
        );
        assert_eq!(registry.locate(id).unwrap(), first);

        assert_eq!(
            registry
                .bind(id, "sat337.bsp", Kind::Spk, different.clone(), true)
                .unwrap(),
            BindOutcome::Replaced
        );
        assert_eq!(registry.locate(id).unwrap(), different);

        assert_eq!(registry.of_kind(Kind::Spk), vec![id]);
        assert!(registry.of_kind(Kind::Ck).is_empty());
    }

    #[test]
    fn missing_files_are_rejected() {
        let mut interner = Interner::new();
        let id = interner.intern("sat337.bsp");
        let mut registry = LocationRegistry::new();
        let outcome = registry.bind(
            id,
            "sat337.bsp",
            Kind::Spk,
            Utf8PathBuf::from("/no/such/file.bsp"),
            false,
        );
        assert!(matches!(outcome, Err(SpiceRackError::NotFound(_))));
    }
}
