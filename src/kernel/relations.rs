//! Exclusion and requirement relations carried by a kernel.
//!
//! Each relation set holds either raw basename handles or whole kernel objects; patterns
//! passed to `exclude`/`require` are expanded against the known basenames at call time,
//! so only concrete targets are ever stored.

use crate::intern::BasenameId;
use crate::kernel::Kernel;

/// One entry in a relation set.
#[derive(Clone, Debug, PartialEq)]
pub enum KernelRef {
    Basename(BasenameId),
    Kernel(Box<Kernel>),
}

/// The relation sets of one kernel: exclusions (any kind), prerequisites and
/// postrequisites (same kind, below/above), and corequisites (different kind).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Relations {
    pub exclusions: Vec<KernelRef>,
    pub prerequisites: Vec<KernelRef>,
    pub postrequisites: Vec<KernelRef>,
    pub corequisites: Vec<KernelRef>,
}

impl Relations {
    pub fn is_empty(&self) -> bool {
        self.exclusions.is_empty()
            && self.prerequisites.is_empty()
            && self.postrequisites.is_empty()
            && self.corequisites.is_empty()
    }

    /// Add a reference to a list unless an equal one is already present.
    pub(crate) fn push_unique(list: &mut Vec<KernelRef>, entry: KernelRef) {
        if !list.contains(&entry) {
            list.push(entry);
        }
    }

    /// Union another relation set into this one, preserving order and dropping
    /// duplicates.
    pub(crate) fn absorb(&mut self, other: &Relations) {
        for entry in &other.exclusions {
            Self::push_unique(&mut self.exclusions, entry.clone());
        }
        for entry in &other.prerequisites {
            Self::push_unique(&mut self.prerequisites, entry.clone());
        }
        for entry in &other.postrequisites {
            Self::push_unique(&mut self.postrequisites, entry.clone());
        }
        for entry in &other.corequisites {
            Self::push_unique(&mut self.corequisites, entry.clone());
        }
    }
}

/// A target of `exclude` or `require`: a literal basename, a pattern to expand against
/// the known basenames, or a whole kernel.
#[derive(Clone, Debug)]
pub enum KernelTarget {
    Name(String),
    Pattern(String),
    Kernel(Kernel),
}

impl From<&str> for KernelTarget {
    /// A string of plain word characters ending in a kernel extension is a literal
    /// basename; anything else is a match pattern.
    fn from(text: &str) -> Self {
        if crate::kinds::is_basename(text) {
            KernelTarget::Name(text.to_string())
        } else {
            KernelTarget::Pattern(text.to_string())
        }
    }
}

impl From<Kernel> for KernelTarget {
    fn from(kernel: Kernel) -> Self {
        KernelTarget::Kernel(kernel)
    }
}
