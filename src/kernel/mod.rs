//! # Kernel resource abstraction
//!
//! A [`Kernel`] describes one or more kernel files and the rules for how to furnish them.
//! Four variants cover the shapes that occur in practice:
//!
//! - **File** — a single basename; its attributes are the metadata record's.
//! - **Set** — basenames of one kind, optionally order-preserving; a duplicated basename
//!   keeps its *last* occurrence, so later entries override earlier ones in both content
//!   and position.
//! - **Stack** — an ordered list of same-kind kernels, always order-preserving; the
//!   members' own exclusions and requirements are aggregated.
//! - **Meta** — one sub-kernel per kind built from a flat mixed-kind member list. A meta
//!   kernel cannot contain another meta kernel and cannot carry exclusions or
//!   requirements.
//!
//! Every variant exposes the same aggregated attributes (identifier union, time envelope,
//! latest release date, merged version and properties) and the `exclude`/`require`
//! classification of related kernels.

pub mod relations;

use std::collections::BTreeMap;

use crate::constants::{IdSet, Request};
use crate::intern::BasenameId;
use crate::kinds::Kind;
use crate::spicerack::SpiceRack;
use crate::spicerack_errors::{Result, SpiceRackError};
use crate::time::TimeRange;
use crate::values::{merge_properties, Properties, Version};

pub use relations::{KernelRef, KernelTarget, Relations};

/// A single kernel file.
#[derive(Clone, Debug, PartialEq)]
pub struct KernelFile {
    pub(crate) handle: BasenameId,
    pub(crate) kind: Kind,
    pub(crate) relations: Relations,
}

/// A set of same-kind basenames furnished together.
#[derive(Clone, Debug, PartialEq)]
pub struct KernelSet {
    pub(crate) kind: Kind,
    pub(crate) members: Vec<BasenameId>,
    pub(crate) ordered: bool,
    pub(crate) name: Option<String>,
    pub(crate) relations: Relations,
}

/// An ordered list of same-kind kernels furnished in rising precedence.
#[derive(Clone, Debug, PartialEq)]
pub struct KernelStack {
    pub(crate) kind: Kind,
    pub(crate) members: Vec<Kernel>,
    pub(crate) name: Option<String>,
    pub(crate) relations: Relations,
}

/// A mixed-kind composite holding one sub-kernel per kind.
#[derive(Clone, Debug, PartialEq)]
pub struct Metakernel {
    pub(crate) per_kind: BTreeMap<Kind, Kernel>,
    pub(crate) name: Option<String>,
}

/// A polymorphic kernel resource; see the module documentation for the variants.
#[derive(Clone, Debug, PartialEq)]
pub enum Kernel {
    File(KernelFile),
    Set(KernelSet),
    Stack(KernelStack),
    Meta(Metakernel),
}

impl Kernel {
    // ---------------------------------------------------------------------------------------------
    // Construction
    // ---------------------------------------------------------------------------------------------

    /// A kernel for a single basename.
    pub fn file(rack: &mut SpiceRack, basename: &str) -> Result<Kernel> {
        let handle = rack.intern(basename)?;
        Ok(Kernel::File(KernelFile {
            handle,
            kind: rack.kind_of(handle),
            relations: Relations::default(),
        }))
    }

    /// A kernel for a list of basenames of one kind.
    ///
    /// A duplicated basename keeps its last occurrence. Mixing kinds or including a
    /// metakernel is an error.
    pub fn set<S: AsRef<str>>(
        rack: &mut SpiceRack,
        basenames: &[S],
        ordered: bool,
    ) -> Result<Kernel> {
        let first = basenames
            .first()
            .ok_or_else(|| SpiceRackError::InvalidState("empty kernel set".to_string()))?;
        let kind = Kind::from_basename(first.as_ref())?;
        if kind == Kind::Meta {
            return Err(SpiceRackError::InvalidState(
                "kernel sets cannot contain metakernels".to_string(),
            ));
        }

        let mut members: Vec<BasenameId> = Vec::new();
        for basename in basenames {
            let handle = rack.intern(basename.as_ref())?;
            if rack.kind_of(handle) != kind {
                return Err(SpiceRackError::InvalidState(format!(
                    "kernel sets can only contain a single kind: {} is not {kind}",
                    basename.as_ref()
                )));
            }
            members.retain(|&existing| existing != handle);
            members.push(handle);
        }

        Ok(Kernel::Set(KernelSet {
            kind,
            members,
            ordered,
            name: None,
            relations: Relations::default(),
        }))
    }

    /// An ordered stack of same-kind kernels. Stacks cannot nest and cannot contain
    /// metakernels.
    pub fn stack(members: Vec<Kernel>) -> Result<Kernel> {
        let first = members
            .first()
            .ok_or_else(|| SpiceRackError::InvalidState("empty kernel stack".to_string()))?;
        let kind = first.kind();

        let mut relations = Relations::default();
        for member in &members {
            match member {
                Kernel::Meta(_) => {
                    return Err(SpiceRackError::InvalidState(
                        "kernel stacks cannot contain metakernels".to_string(),
                    ))
                }
                Kernel::Stack(_) => {
                    return Err(SpiceRackError::InvalidState(
                        "kernel stacks cannot contain kernel stacks".to_string(),
                    ))
                }
                _ => {}
            }
            if member.kind() != kind {
                return Err(SpiceRackError::InvalidState(format!(
                    "kernel stacks can only contain a single kind: {} is not {kind}",
                    member.kind()
                )));
            }
            relations.absorb(member.relations());
        }

        Ok(Kernel::Stack(KernelStack {
            kind,
            members,
            name: None,
            relations,
        }))
    }

    /// A mixed-kind composite. Members are grouped by kind; a kind with several plain
    /// file members becomes an ordered set, anything richer becomes a stack.
    ///
    /// A single metakernel-file member is replaced by the files it lists; any other
    /// metakernel member is an error.
    pub fn meta(rack: &mut SpiceRack, members: Vec<Kernel>) -> Result<Kernel> {
        if members.is_empty() {
            return Err(SpiceRackError::InvalidState(
                "at least one kernel must be specified".to_string(),
            ));
        }

        // A lone metakernel file stands for its listed basenames
        let members = if members.len() == 1 && members[0].kind() == Kind::Meta {
            match &members[0] {
                Kernel::File(file) => {
                    let listed = rack.meta_basenames(file.handle)?;
                    let mut expanded = Vec::new();
                    for basename in listed {
                        expanded.push(Kernel::file(rack, &basename)?);
                    }
                    expanded
                }
                _ => {
                    return Err(SpiceRackError::InvalidState(
                        "metakernels cannot contain metakernels".to_string(),
                    ))
                }
            }
        } else {
            members
        };

        let mut grouped: BTreeMap<Kind, Vec<Kernel>> = BTreeMap::new();
        for member in members {
            if member.kind() == Kind::Meta {
                return Err(SpiceRackError::InvalidState(
                    "metakernels cannot contain metakernels".to_string(),
                ));
            }
            grouped.entry(member.kind()).or_default().push(member);
        }

        let mut per_kind = BTreeMap::new();
        for (kind, mut group) in grouped {
            let combined = if group.len() == 1 {
                group.pop().expect("one member")
            } else if group.iter().all(|k| matches!(k, Kernel::File(_))) {
                let handles: Vec<BasenameId> = group
                    .iter()
                    .map(|k| match k {
                        Kernel::File(file) => file.handle,
                        _ => unreachable!("checked above"),
                    })
                    .collect();
                let mut members: Vec<BasenameId> = Vec::new();
                for handle in handles {
                    members.retain(|&existing| existing != handle);
                    members.push(handle);
                }
                Kernel::Set(KernelSet {
                    kind,
                    members,
                    ordered: true,
                    name: None,
                    relations: Relations::default(),
                })
            } else {
                Kernel::stack(group)?
            };
            per_kind.insert(kind, combined);
        }

        Ok(Kernel::Meta(Metakernel {
            per_kind,
            name: None,
        }))
    }

    /// Attach an explicit name, for display and for composite family naming.
    pub fn with_name(mut self, name: &str) -> Self {
        match &mut self {
            Kernel::File(_) => {}
            Kernel::Set(set) => set.name = Some(name.to_string()),
            Kernel::Stack(stack) => stack.name = Some(name.to_string()),
            Kernel::Meta(meta) => meta.name = Some(name.to_string()),
        }
        self
    }

    // ---------------------------------------------------------------------------------------------
    // Shape
    // ---------------------------------------------------------------------------------------------

    /// The kind of this kernel; a meta kernel reports [`Kind::Meta`].
    pub fn kind(&self) -> Kind {
        match self {
            Kernel::File(file) => file.kind,
            Kernel::Set(set) => set.kind,
            Kernel::Stack(stack) => stack.kind,
            Kernel::Meta(_) => Kind::Meta,
        }
    }

    /// True if this kernel's members must keep their relative precedence order.
    pub fn is_ordered(&self) -> bool {
        match self {
            Kernel::File(_) => false,
            Kernel::Set(set) => set.ordered,
            Kernel::Stack(_) | Kernel::Meta(_) => true,
        }
    }

    /// The ordered basename handles this kernel manages directly, excluding
    /// requirements. Duplicates across stack members keep the last occurrence; meta
    /// kernels list their sub-kernels in canonical kind order.
    pub fn basenames(&self) -> Vec<BasenameId> {
        match self {
            Kernel::File(file) => vec![file.handle],
            Kernel::Set(set) => set.members.clone(),
            Kernel::Stack(stack) => {
                let mut handles: Vec<BasenameId> = Vec::new();
                for member in &stack.members {
                    for handle in member.basenames() {
                        handles.retain(|&existing| existing != handle);
                        handles.push(handle);
                    }
                }
                handles
            }
            Kernel::Meta(meta) => {
                let mut handles = Vec::new();
                for kind in Kind::ALL {
                    if let Some(sub) = meta.per_kind.get(&kind) {
                        handles.extend(sub.basenames());
                    }
                }
                handles
            }
        }
    }

    /// The per-kind sub-kernels of a meta kernel, in canonical kind order.
    pub fn subkernels(&self) -> Vec<&Kernel> {
        match self {
            Kernel::Meta(meta) => Kind::ALL
                .iter()
                .filter_map(|kind| meta.per_kind.get(kind))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The relation sets of this kernel. A meta kernel has none.
    pub fn relations(&self) -> &Relations {
        static EMPTY: Relations = Relations {
            exclusions: Vec::new(),
            prerequisites: Vec::new(),
            postrequisites: Vec::new(),
            corequisites: Vec::new(),
        };
        match self {
            Kernel::File(file) => &file.relations,
            Kernel::Set(set) => &set.relations,
            Kernel::Stack(stack) => &stack.relations,
            Kernel::Meta(_) => &EMPTY,
        }
    }

    fn relations_mut(&mut self) -> Result<&mut Relations> {
        match self {
            Kernel::File(file) => Ok(&mut file.relations),
            Kernel::Set(set) => Ok(&mut set.relations),
            Kernel::Stack(stack) => Ok(&mut stack.relations),
            Kernel::Meta(_) => Err(SpiceRackError::InvalidState(
                "a metakernel cannot have exclusions or requirements".to_string(),
            )),
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Aggregated attributes
    // ---------------------------------------------------------------------------------------------

    /// A display name: the explicit name when one was attached, the basename for a
    /// file, otherwise a summary of the member family names.
    pub fn name(&self, rack: &mut SpiceRack) -> Result<String> {
        let explicit = match self {
            Kernel::File(file) => return Ok(rack.basename(file.handle).to_string()),
            Kernel::Set(set) => &set.name,
            Kernel::Stack(stack) => &stack.name,
            Kernel::Meta(meta) => &meta.name,
        };
        if let Some(name) = explicit {
            return Ok(name.clone());
        }

        let mut families = Vec::new();
        for handle in self.basenames() {
            let family = rack.family(handle)?;
            families.push(if family.is_empty() {
                rack.basename(handle).to_string()
            } else {
                family
            });
        }
        Ok(common_name(&families))
    }

    /// The family name: the record's for a file, the member-family summary otherwise.
    pub fn family(&self, rack: &mut SpiceRack) -> Result<String> {
        match self {
            Kernel::File(file) => rack.family(file.handle),
            _ => self.name(rack),
        }
    }

    /// The union of the members' NAIF IDs, aliases included; empty means the kernel
    /// applies to every identifier.
    pub fn naif_ids(&self, rack: &mut SpiceRack) -> Result<IdSet> {
        let mut ids = IdSet::new();
        for handle in self.basenames() {
            ids.extend(rack.naif_ids(handle)?);
        }
        Ok(ids)
    }

    /// The union of the members' primary NAIF IDs.
    pub fn naif_ids_wo_aliases(&self, rack: &mut SpiceRack) -> Result<IdSet> {
        let mut ids = IdSet::new();
        for handle in self.basenames() {
            ids.extend(rack.naif_ids_wo_aliases(handle)?);
        }
        Ok(ids)
    }

    /// The envelope of the members' time windows; `None` when no member is
    /// time-dependent.
    pub fn time(&self, rack: &mut SpiceRack) -> Result<Option<(f64, f64)>> {
        Ok(time_envelope(rack, &self.basenames(), None)?.flatten())
    }

    /// The latest release date among the members; empty when none is known.
    pub fn release_date(&self, rack: &mut SpiceRack) -> Result<String> {
        let mut latest = String::new();
        for handle in self.basenames() {
            let date = rack.release_date(handle)?;
            if date > latest {
                latest = date;
            }
        }
        Ok(latest)
    }

    /// The merged member versions: the maximum, with a numeric/string mixture across
    /// members yielding the undefined version.
    pub fn version(&self, rack: &mut SpiceRack) -> Result<Version> {
        let mut versions = Vec::new();
        for handle in self.basenames() {
            versions.push(rack.version(handle)?);
        }
        Ok(Version::merge_max(versions.iter()))
    }

    /// The merged member properties; conflicting values accumulate into sets.
    pub fn properties(&self, rack: &mut SpiceRack) -> Result<Properties> {
        let mut merged = Properties::new();
        for handle in self.basenames() {
            merge_properties(&mut merged, &rack.properties(handle)?);
        }
        Ok(merged)
    }

    // ---------------------------------------------------------------------------------------------
    // Overlap predicates
    // ---------------------------------------------------------------------------------------------

    /// The portion of this kernel's time envelope overlapping a window, within the
    /// default slack; `None` when there is no overlap.
    pub fn time_overlap(
        &self,
        rack: &mut SpiceRack,
        window: &TimeRange,
    ) -> Result<Option<TimeRange>> {
        let own = TimeRange::from_window(self.time(rack)?);
        Ok(own.overlap(window, crate::constants::DEFAULT_TIME_SLACK))
    }

    /// The subset of this kernel's IDs overlapping a query set. An empty set on either
    /// side matches everything.
    pub fn id_overlap(&self, rack: &mut SpiceRack, ids: &IdSet) -> Result<IdSet> {
        let own = self.naif_ids(rack)?;
        if ids.is_empty() {
            return Ok(own);
        }
        if own.is_empty() {
            return Ok(ids.clone());
        }
        Ok(own.intersection(ids).copied().collect())
    }

    /// True if this kernel has content overlapping the request, in both time and
    /// identifiers.
    pub fn has_overlap(&self, rack: &mut SpiceRack, req: &Request) -> Result<bool> {
        if self.time_overlap(rack, &req.time)?.is_none() {
            return Ok(false);
        }
        let own = self.naif_ids(rack)?;
        Ok(ids_overlap(&own, &req.ids))
    }

    // ---------------------------------------------------------------------------------------------
    // Exclusions and requirements
    // ---------------------------------------------------------------------------------------------

    /// Exclude one or more kernels from being furnished at the same time as this one.
    /// Whenever this kernel is furnished, overlapping exclusions are unloaded first.
    pub fn exclude<T: Into<KernelTarget>>(
        &mut self,
        rack: &mut SpiceRack,
        targets: Vec<T>,
    ) -> Result<()> {
        self.classify_targets(rack, targets, Placement::Exclusion)
    }

    /// Declare requirement kernels. Same-kind targets become prerequisites (furnished
    /// below) or, with `above`, postrequisites (furnished on top); different-kind
    /// targets become corequisites, whose relative position is irrelevant.
    pub fn require<T: Into<KernelTarget>>(
        &mut self,
        rack: &mut SpiceRack,
        targets: Vec<T>,
        above: bool,
    ) -> Result<()> {
        let placement = if above {
            Placement::Above
        } else {
            Placement::Below
        };
        self.classify_targets(rack, targets, placement)
    }

    fn classify_targets<T: Into<KernelTarget>>(
        &mut self,
        rack: &mut SpiceRack,
        targets: Vec<T>,
        placement: Placement,
    ) -> Result<()> {
        let own_kind = self.kind();
        let own_basenames = self.basenames();
        self.relations_mut()?; // reject metakernels before doing any work

        for target in targets {
            match target.into() {
                KernelTarget::Name(name) => {
                    let handle = rack.intern(&name)?;
                    self.classify_handle(rack, handle, own_kind, &own_basenames, placement)?;
                }
                KernelTarget::Pattern(pattern) => {
                    for handle in rack.matching(&pattern)? {
                        if own_basenames.contains(&handle) {
                            continue;
                        }
                        self.classify_handle(rack, handle, own_kind, &own_basenames, placement)?;
                    }
                }
                KernelTarget::Kernel(kernel) => {
                    if kernel.kind() == Kind::Meta {
                        return Err(SpiceRackError::InvalidState(
                            "a metakernel cannot be part of an exclusion or requirement set"
                                .to_string(),
                        ));
                    }
                    // Overlapping basenames are classified individually
                    if kernel
                        .basenames()
                        .iter()
                        .any(|handle| own_basenames.contains(handle))
                    {
                        for handle in kernel.basenames() {
                            if own_basenames.contains(&handle) {
                                continue;
                            }
                            self.classify_handle(
                                rack,
                                handle,
                                own_kind,
                                &own_basenames,
                                placement,
                            )?;
                        }
                    } else {
                        let same_kind = kernel.kind() == own_kind;
                        let entry = KernelRef::Kernel(Box::new(kernel));
                        let relations = self.relations_mut()?;
                        Relations::push_unique(placement.bucket(relations, same_kind), entry);
                    }
                }
            }
        }
        Ok(())
    }

    fn classify_handle(
        &mut self,
        rack: &mut SpiceRack,
        handle: BasenameId,
        own_kind: Kind,
        own_basenames: &[BasenameId],
        placement: Placement,
    ) -> Result<()> {
        if own_basenames.contains(&handle) {
            return Ok(());
        }
        let kind = rack.kind_of(handle);
        if kind == Kind::Meta {
            return Err(SpiceRackError::InvalidState(
                "a metakernel cannot be part of an exclusion or requirement set".to_string(),
            ));
        }
        let entry = KernelRef::Basename(handle);
        let relations = self.relations_mut()?;
        Relations::push_unique(placement.bucket(relations, kind == own_kind), entry);
        Ok(())
    }
}

/// Which relation list a classified target lands in.
#[derive(Clone, Copy, Debug)]
enum Placement {
    Exclusion,
    Below,
    Above,
}

impl Placement {
    fn bucket<'a>(self, relations: &'a mut Relations, same_kind: bool) -> &'a mut Vec<KernelRef> {
        match (self, same_kind) {
            (Placement::Exclusion, _) => &mut relations.exclusions,
            (Placement::Below, true) => &mut relations.prerequisites,
            (Placement::Above, true) => &mut relations.postrequisites,
            (_, false) => &mut relations.corequisites,
        }
    }
}

/// True when two id sets overlap, an empty set on either side matching everything.
pub(crate) fn ids_overlap(a: &IdSet, b: &IdSet) -> bool {
    a.is_empty() || b.is_empty() || a.intersection(b).next().is_some()
}

/// The extreme time limits covered by these basenames, optionally restricted to members
/// covering one of the given IDs.
///
/// Returns `None` when an ID restriction was given and nothing covers it; `Some(None)`
/// when the members have no time dependence at all; `Some(Some(window))` otherwise.
pub(crate) fn time_envelope(
    rack: &mut SpiceRack,
    handles: &[BasenameId],
    ids: Option<&IdSet>,
) -> Result<Option<Option<(f64, f64)>>> {
    if handles.is_empty() {
        return Ok(None);
    }

    let mut tmin = f64::INFINITY;
    let mut tmax = f64::NEG_INFINITY;

    for &handle in handles {
        if let Some(ids) = ids {
            if !ids.is_empty() {
                let member_ids = rack.naif_ids(handle)?;
                if !ids_overlap(&member_ids, ids) {
                    continue;
                }
            }
        }
        if let Some((t0, t1)) = rack.time(handle)? {
            tmin = tmin.min(t0);
            tmax = tmax.max(t1);
        }
    }

    if tmin > tmax {
        if ids.map(|set| !set.is_empty()).unwrap_or(false) {
            return Ok(None);
        }
        return Ok(Some(None));
    }
    Ok(Some(Some((tmin, tmax))))
}

/// A summary name for a list of names: the longest common head and tail, runs of
/// differing digits collapsing to `N`, with the distinct middles bracketed.
pub(crate) fn common_name(names: &[String]) -> String {
    let mut distinct: Vec<Vec<char>> = Vec::new();
    for name in names {
        let chars: Vec<char> = name.chars().collect();
        if !distinct.contains(&chars) {
            distinct.push(chars);
        }
    }
    match distinct.len() {
        0 => return "UNNAMED".to_string(),
        1 => return distinct[0].iter().collect(),
        _ => {}
    }

    // Common characters from the beginning, collapsing digit columns to N
    let mut head = String::new();
    let mut offset = 0;
    loop {
        let column: Vec<Option<char>> = distinct.iter().map(|n| n.get(offset).copied()).collect();
        let first = column[0];
        if first.is_none() || column.iter().any(|c| c.is_none()) {
            break;
        }
        if column.iter().all(|&c| c == first) {
            head.push(first.expect("checked above"));
        } else if column
            .iter()
            .all(|c| c.map(|c| c.is_ascii_digit()).unwrap_or(false))
        {
            head.push('N');
        } else {
            break;
        }
        offset += 1;
    }

    // Common characters from the end
    let mut tail_rev = String::new();
    let mut back = 0;
    loop {
        let column: Vec<Option<char>> = distinct
            .iter()
            .map(|n| {
                if n.len() > offset + back {
                    n.get(n.len() - 1 - back).copied()
                } else {
                    None
                }
            })
            .collect();
        let first = column[0];
        if first.is_none() || column.iter().any(|c| c.is_none()) {
            break;
        }
        if column.iter().all(|&c| c == first) {
            tail_rev.push(first.expect("checked above"));
        } else if column
            .iter()
            .all(|c| c.map(|c| c.is_ascii_digit()).unwrap_or(false))
        {
            tail_rev.push('N');
        } else {
            break;
        }
        back += 1;
    }
    let tail: String = tail_rev.chars().rev().collect();

    // Bracket whatever distinct middles remain
    let mut middles: Vec<String> = distinct
        .iter()
        .map(|n| n[offset..n.len() - back].iter().collect())
        .collect();
    middles.sort();
    middles.dedup();

    if middles.iter().all(|m| m.is_empty()) {
        format!("{head}{tail}")
    } else {
        format!("{head}[{}]{tail}", middles.join("|"))
    }
}
