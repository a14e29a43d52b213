//! # Furnishing engine
//!
//! The stateful precedence-ordered load/unload algorithm. Per kind, the engine keeps one
//! ordered list of currently furnished basenames — position 0 is the *lowest* precedence —
//! and mutates the external session through the coverage oracle's `load`/`unload`
//! primitives as files enter and leave that list.
//!
//! A furnish honors, in order: the kernel's exclusions (unloaded over the requested
//! range), its prerequisites (furnished below), the global veto rules (matching furnished
//! files evicted) and shadow rules (the triggering file reinserted on top when it sits
//! below a file it must shadow), then its postrequisites (furnished above) and
//! corequisites (furnished independently, their kind making relative position
//! irrelevant). When a veto and a shadow apply to the same pair at once, the veto wins:
//! eviction subsumes reordering.
//!
//! Every eviction is a silent side effect reported through `tracing`, never an error.

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::constants::Request;
use crate::intern::BasenameId;
use crate::kernel::{ids_overlap, Kernel, KernelRef};
use crate::kinds::Kind;
use crate::spicerack::SpiceRack;
use crate::spicerack_errors::{Result, SpiceRackError};
use crate::time::TimeRange;

/// A global rule evicting matching furnished files whenever a triggering basename is
/// furnished.
#[derive(Debug, Clone)]
pub struct VetoRule {
    pub(crate) trigger: Regex,
    pub(crate) companions: Vec<Regex>,
}

/// A global rule forcing a triggering basename to sit above matching furnished files,
/// without evicting them.
#[derive(Debug, Clone)]
pub struct ShadowRule {
    pub(crate) front: Regex,
    pub(crate) behind: Vec<Regex>,
}

/// Per-kind ordered lists of currently furnished basenames; position 0 is the lowest
/// precedence. Created empty at process start and never persisted.
#[derive(Debug, Default)]
pub struct FurnishedRegistry {
    lists: HashMap<Kind, Vec<BasenameId>>,
}

impl FurnishedRegistry {
    pub fn list(&self, kind: Kind) -> &[BasenameId] {
        self.lists.get(&kind).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn position(&self, kind: Kind, handle: BasenameId) -> Option<usize> {
        self.list(kind).iter().position(|&h| h == handle)
    }

    pub fn len(&self, kind: Kind) -> usize {
        self.list(kind).len()
    }

    pub fn is_empty(&self, kind: Kind) -> bool {
        self.list(kind).is_empty()
    }

    fn push(&mut self, kind: Kind, handle: BasenameId) {
        self.lists.entry(kind).or_default().push(handle);
    }

    fn remove_at(&mut self, kind: Kind, loc: usize) {
        if let Some(list) = self.lists.get_mut(&kind) {
            list.remove(loc);
        }
    }
}

fn compile_anchored(pattern: &str) -> Result<Regex> {
    Ok(RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(true)
        .build()?)
}

impl SpiceRack {
    // ---------------------------------------------------------------------------------------------
    // Global veto and shadow rules
    // ---------------------------------------------------------------------------------------------

    /// Register a veto: whenever a basename matching `trigger` is furnished, every
    /// overlapping furnished basename matching one of the `companions` is evicted.
    pub fn add_veto(&mut self, trigger: &str, companions: &[&str]) -> Result<()> {
        let rule = VetoRule {
            trigger: compile_anchored(trigger)?,
            companions: companions
                .iter()
                .map(|p| compile_anchored(p))
                .collect::<Result<_>>()?,
        };
        self.vetoes.push(rule);
        Ok(())
    }

    /// Register a shadow: a furnished basename matching `front` is kept above every
    /// furnished basename matching one of the `behind` patterns, by reinsertion on top
    /// when necessary.
    pub fn add_shadow(&mut self, front: &str, behind: &[&str]) -> Result<()> {
        let rule = ShadowRule {
            front: compile_anchored(front)?,
            behind: behind
                .iter()
                .map(|p| compile_anchored(p))
                .collect::<Result<_>>()?,
        };
        self.shadows.push(rule);
        Ok(())
    }

    /// The currently furnished basenames of a kind, lowest precedence first.
    pub fn furnished(&self, kind: Kind) -> Vec<&str> {
        self.furnished
            .list(kind)
            .iter()
            .map(|&h| self.basename(h))
            .collect()
    }

    // ---------------------------------------------------------------------------------------------
    // Furnish
    // ---------------------------------------------------------------------------------------------

    /// Furnish this kernel at highest precedence for the requested times and IDs,
    /// returning the index of the highest furnished basename.
    ///
    /// Overlapping excluded kernels are unloaded; pre-, post-, and corequisites are
    /// furnished as needed.
    pub fn furnish(&mut self, kernel: &Kernel, req: &Request) -> Result<usize> {
        self.furnish_from(kernel, req, 0)
    }

    /// Furnish with every basename forced to land at or above `minloc` in the per-kind
    /// list. This is the mechanism by which composite furnish calls chain precedence.
    pub fn furnish_from(&mut self, kernel: &Kernel, req: &Request, minloc: usize) -> Result<usize> {
        let (top, _) = self.furnish_inner(kernel, req, minloc, minloc)?;
        Ok(top)
    }

    fn furnish_inner(
        &mut self,
        kernel: &Kernel,
        req: &Request,
        minloc: usize,
        refloc: usize,
    ) -> Result<(usize, usize)> {
        // A meta kernel furnishes one sub-kernel per kind; the kinds' precedence lists
        // are independent, so positions do not chain across them.
        if let Kernel::Meta(_) = kernel {
            let mut top = 0;
            for sub in kernel.subkernels() {
                let (t, _) = self.furnish_inner(sub, req, 0, 0)?;
                top = top.max(t);
            }
            return Ok((top, refloc));
        }

        let relations = kernel.relations();
        let mut minloc = minloc;
        let mut refloc = refloc;

        // 1. Unload exclusions over the requested range, tracking removals below minloc
        for entry in &relations.exclusions {
            let tmp;
            let target = match entry {
                KernelRef::Kernel(k) => &**k,
                KernelRef::Basename(h) => {
                    tmp = self.file_kernel(*h);
                    &tmp
                }
            };
            minloc = self.unload_inner(target, req, minloc)?;
        }

        // 2. Furnish prerequisites below this kernel, raising the floor to the highest
        //    position they occupy
        for entry in &relations.prerequisites {
            let tmp;
            let target = match entry {
                KernelRef::Kernel(k) => &**k,
                KernelRef::Basename(h) => {
                    tmp = self.file_kernel(*h);
                    &tmp
                }
            };
            let (loc, tracked) = self.furnish_inner(target, req, 0, minloc)?;
            minloc = tracked.max(loc);
        }

        // 3. This kernel's own members
        let (mut top, _, new_refloc) = self.furnish_members(kernel, req, minloc, refloc)?;
        refloc = new_refloc;

        // 4. Postrequisites above this kernel's topmost position
        for entry in &relations.postrequisites {
            let tmp;
            let target = match entry {
                KernelRef::Kernel(k) => &**k,
                KernelRef::Basename(h) => {
                    tmp = self.file_kernel(*h);
                    &tmp
                }
            };
            let (t, _) = self.furnish_inner(target, req, top, top)?;
            top = top.max(t);
        }

        // 5. Corequisites of a different kind, furnished independently
        for entry in &relations.corequisites {
            let tmp;
            let target = match entry {
                KernelRef::Kernel(k) => &**k,
                KernelRef::Basename(h) => {
                    tmp = self.file_kernel(*h);
                    &tmp
                }
            };
            self.furnish_inner(target, req, 0, 0)?;
        }

        Ok((top, refloc))
    }

    /// Furnish the kernel's own members, honoring vetoes, shadows, and order
    /// preservation. Returns `(maxloc, minloc, refloc)` with the tracked positions
    /// adjusted for any evictions beneath them.
    fn furnish_members(
        &mut self,
        kernel: &Kernel,
        req: &Request,
        minloc: usize,
        refloc: usize,
    ) -> Result<(usize, usize, usize)> {
        if let Kernel::Stack(stack) = kernel {
            // Members furnish in order, each forced above the previous member's top;
            // their relations were aggregated into the stack's own at construction
            let mut floor = minloc;
            let mut refloc = refloc;
            let mut top = minloc;
            for member in &stack.members {
                let (t, _, r) = self.furnish_members(member, req, floor, refloc)?;
                refloc = r;
                floor = t;
                top = top.max(t);
            }
            return Ok((top, floor, refloc));
        }

        let kind = kernel.kind();
        let ordered = kernel.is_ordered();
        let mut minloc = minloc;
        let mut refloc = refloc;
        let mut maxloc = minloc;

        for handle in kernel.basenames() {
            // Members that do not overlap the request are left alone
            if !self.record_overlaps(handle, req)? {
                continue;
            }
            let path = self.locate_or_fetch(handle)?;
            let name = self.basename(handle).to_string();

            // Veto rules triggered by this basename evict overlapping furnished files
            let companions: Vec<Regex> = self
                .vetoes
                .iter()
                .filter(|rule| rule.trigger.is_match(&name))
                .flat_map(|rule| rule.companions.iter().cloned())
                .collect();
            if !companions.is_empty() {
                let victims: Vec<(usize, BasenameId)> = self
                    .furnished
                    .list(kind)
                    .iter()
                    .copied()
                    .enumerate()
                    .filter(|&(_, h)| {
                        let victim_name = self.basename(h);
                        companions.iter().any(|p| p.is_match(victim_name))
                    })
                    .collect();

                for (loc, victim) in victims.into_iter().rev() {
                    if !self.record_overlaps(victim, req)? {
                        continue;
                    }
                    self.evict(kind, loc, victim, "veto")?;
                    if loc <= minloc {
                        minloc = minloc.saturating_sub(1);
                    }
                    if loc <= maxloc {
                        maxloc = maxloc.saturating_sub(1);
                    }
                    if loc <= refloc {
                        refloc = refloc.saturating_sub(1);
                    }
                }
            }

            let loc = match self.furnished.position(kind, handle) {
                // Not yet furnished: load and insert at the top
                None => {
                    self.oracle.load(&path)?;
                    self.furnished.push(kind, handle);
                    debug!(basename = %name, kind = %kind, "furnished");
                    self.furnished.len(kind) - 1
                }
                // Already furnished: reinsert on top if it sits below the floor or
                // below a file it must shadow
                Some(current) => {
                    let mut floor = minloc;
                    let behind: Vec<Regex> = self
                        .shadows
                        .iter()
                        .filter(|rule| rule.front.is_match(&name))
                        .flat_map(|rule| rule.behind.iter().cloned())
                        .collect();
                    if !behind.is_empty() {
                        for (i, &h) in self.furnished.list(kind).iter().enumerate() {
                            let shadowed = self.basename(h);
                            if behind.iter().any(|p| p.is_match(shadowed)) {
                                floor = floor.max(i);
                            }
                        }
                    }

                    if current < floor {
                        self.oracle.unload(&path)?;
                        self.oracle.load(&path)?;
                        self.furnished.remove_at(kind, current);
                        self.furnished.push(kind, handle);
                        debug!(basename = %name, kind = %kind, "reloaded");
                        self.furnished.len(kind) - 1
                    } else {
                        current
                    }
                }
            };

            // An ordered kernel ratchets the floor so later members land strictly higher
            if ordered {
                minloc = loc;
            }
            maxloc = maxloc.max(loc);
        }

        Ok((maxloc, minloc, refloc))
    }

    // ---------------------------------------------------------------------------------------------
    // Unload
    // ---------------------------------------------------------------------------------------------

    /// Unload every basename of this kernel that overlaps the request.
    pub fn unload(&mut self, kernel: &Kernel, req: &Request) -> Result<()> {
        self.unload_inner(kernel, req, 0)?;
        Ok(())
    }

    /// Unload with a tracked reference position: each removal at or below `refloc`
    /// decrements it, so a caller's tracked position stays correct as entries are
    /// evicted beneath it. Returns the adjusted value.
    pub fn unload_from(&mut self, kernel: &Kernel, req: &Request, refloc: usize) -> Result<usize> {
        self.unload_inner(kernel, req, refloc)
    }

    fn unload_inner(&mut self, kernel: &Kernel, req: &Request, refloc: usize) -> Result<usize> {
        if let Kernel::Meta(_) = kernel {
            let mut refloc = refloc;
            for sub in kernel.subkernels() {
                refloc = self.unload_inner(sub, req, refloc)?;
            }
            return Ok(refloc);
        }

        let kind = kernel.kind();
        let mut refloc = refloc;
        for handle in kernel.basenames() {
            if !self.registry_contains(handle) {
                continue;
            }
            if !self.record_overlaps(handle, req)? {
                continue;
            }
            if let Some(loc) = self.furnished.position(kind, handle) {
                self.evict(kind, loc, handle, "request")?;
                if loc <= refloc {
                    refloc = refloc.saturating_sub(1);
                }
            }
        }
        Ok(refloc)
    }

    fn evict(&mut self, kind: Kind, loc: usize, victim: BasenameId, reason: &str) -> Result<()> {
        self.furnished.remove_at(kind, loc);
        if let Some(path) = self.locate(victim).map(|p| p.to_owned()) {
            self.oracle.unload(&path)?;
        }
        let name = self.basename(victim);
        debug!(basename = %name, kind = %kind, reason, "unloaded");
        Ok(())
    }

    // ---------------------------------------------------------------------------------------------
    // Pure query
    // ---------------------------------------------------------------------------------------------

    /// The ordered basenames `furnish` would produce for this request, without mutating
    /// anything: corequisites and prerequisites first, then the kernel's own overlapping
    /// members, then postrequisites. A duplicated basename keeps its last occurrence.
    pub fn used(&mut self, kernel: &Kernel, req: &Request) -> Result<Vec<BasenameId>> {
        let mut out = Vec::new();
        self.used_into(kernel, req, &mut out)?;

        let mut deduped: Vec<BasenameId> = Vec::new();
        for handle in out {
            deduped.retain(|&existing| existing != handle);
            deduped.push(handle);
        }
        Ok(deduped)
    }

    fn used_into(
        &mut self,
        kernel: &Kernel,
        req: &Request,
        out: &mut Vec<BasenameId>,
    ) -> Result<()> {
        if let Kernel::Meta(_) = kernel {
            for sub in kernel.subkernels() {
                self.used_into(sub, req, out)?;
            }
            return Ok(());
        }

        let relations = kernel.relations();
        for bucket in [&relations.corequisites, &relations.prerequisites] {
            for entry in bucket {
                let tmp;
                let target = match entry {
                    KernelRef::Kernel(k) => &**k,
                    KernelRef::Basename(h) => {
                        tmp = self.file_kernel(*h);
                        &tmp
                    }
                };
                self.used_into(target, req, out)?;
            }
        }

        for handle in kernel.basenames() {
            if self.record_overlaps(handle, req)? {
                out.push(handle);
            }
        }

        for entry in &relations.postrequisites {
            let tmp;
            let target = match entry {
                KernelRef::Kernel(k) => &**k,
                KernelRef::Basename(h) => {
                    tmp = self.file_kernel(*h);
                    &tmp
                }
            };
            self.used_into(target, req, out)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------------------------------
    // Record-level support
    // ---------------------------------------------------------------------------------------------

    /// True if a single record overlaps the request in both time and identifiers.
    pub(crate) fn record_overlaps(&mut self, handle: BasenameId, req: &Request) -> Result<bool> {
        let window = TimeRange::from_window(self.time(handle)?);
        if window.overlap(&req.time, crate::constants::DEFAULT_TIME_SLACK).is_none() {
            return Ok(false);
        }
        let ids = self.naif_ids(handle)?;
        Ok(ids_overlap(&ids, &req.ids))
    }

    /// The local path of a basename, fetching it from its known sources when a fetcher
    /// is configured and no local binding exists.
    fn locate_or_fetch(&mut self, handle: BasenameId) -> Result<camino::Utf8PathBuf> {
        if let Some(path) = self.locate(handle) {
            return Ok(path.to_owned());
        }

        let name = self.basename(handle).to_string();
        if self.fetcher_configured() {
            let sources = self.source(handle)?;
            if !sources.is_empty() {
                let dest = self.fetch_destination(handle)?;
                let path = self.run_fetcher(&sources, &name, &dest)?;
                self.bind_fetched(handle, path.clone())?;
                return Ok(path);
            }
        }

        Err(SpiceRackError::NotFound(name))
    }
}
