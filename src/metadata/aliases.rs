//! NAIF identifier alias expansion.
//!
//! Bodies and frames can be known under several NAIF IDs at once (Pluto's system barycenter
//! and Pluto itself, re-numbered frames, and so on). Identifier matching is performed over
//! the alias-expanded sets, so a kernel indexed under one alias is still found when a
//! query uses another. The expansion is **monotonic** (only ever adds IDs) and
//! **idempotent** (expanding an expanded set changes nothing).

use std::collections::HashMap;

use crate::constants::{IdSet, NaifId};

/// Frame IDs in this band are re-numbered aliases of other frames.
const GENERIC_FRAME_BAND: std::ops::Range<NaifId> = 10_000..50_000;

/// Spacecraft-owned frame IDs lie below this threshold; dividing by 1000 recovers the
/// owning spacecraft ID.
const SPACECRAFT_FRAME_THRESHOLD: NaifId = -1000;

/// Table of body and frame alias groups, injected into the metadata store.
///
/// Each group is registered symmetrically: every member maps to the full group, with the
/// first member taken as the primary ID.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    bodies: HashMap<NaifId, Vec<NaifId>>,
    frames: HashMap<NaifId, Vec<NaifId>>,
}

impl AliasTable {
    pub fn new() -> Self {
        AliasTable::default()
    }

    /// Register a group of body IDs that all denote the same body. The first ID listed
    /// is the primary.
    pub fn add_body_group(&mut self, group: &[NaifId]) {
        for &id in group {
            self.bodies.insert(id, group.to_vec());
        }
    }

    /// Register a group of frame IDs that all denote the same frame.
    pub fn add_frame_group(&mut self, group: &[NaifId]) {
        for &id in group {
            self.frames.insert(id, group.to_vec());
        }
    }

    /// Every body ID aliased to this one, the ID itself included.
    pub fn body_aliases(&self, id: NaifId) -> Vec<NaifId> {
        self.bodies.get(&id).cloned().unwrap_or_else(|| vec![id])
    }

    /// Every frame ID aliased to this one, the ID itself included.
    pub fn frame_aliases(&self, id: NaifId) -> Vec<NaifId> {
        self.frames.get(&id).cloned().unwrap_or_else(|| vec![id])
    }

    /// The primary ID of an alias group; the ID itself when it has no aliases.
    pub fn primary(&self, id: NaifId) -> NaifId {
        self.bodies
            .get(&id)
            .and_then(|group| group.first().copied())
            .unwrap_or(id)
    }

    /// Alias-expand a set of IDs.
    ///
    /// The closure unions in every body alias, the owning spacecraft of any
    /// spacecraft-frame ID, and, when any resulting ID falls in the generic-frame band,
    /// every frame alias as well.
    pub fn expand(&self, ids: &IdSet) -> IdSet {
        let mut all: IdSet = ids.clone();
        for &id in ids {
            all.extend(self.body_aliases(id));
            if id < SPACECRAFT_FRAME_THRESHOLD {
                all.insert(-(-id / 1000));
            }
        }

        if all.iter().any(|id| GENERIC_FRAME_BAND.contains(id)) {
            for &id in ids {
                all.extend(self.frame_aliases(id));
            }
        }

        all
    }

    /// Reduce a set of IDs to primary IDs only.
    pub fn normalize(&self, ids: &IdSet) -> IdSet {
        ids.iter().map(|&id| self.primary(id)).collect()
    }
}

#[cfg(test)]
mod aliases_test {
    use super::*;

    fn table() -> AliasTable {
        let mut table = AliasTable::new();
        table.add_body_group(&[9, 999]); // Pluto barycenter / Pluto
        table.add_frame_group(&[13000, 13001]);
        table
    }

    #[test]
    fn expansion_is_monotonic() {
        let table = table();
        let ids = IdSet::from([999, -82905]);
        let expanded = table.expand(&ids);

        assert!(expanded.is_superset(&ids));
        assert!(expanded.contains(&9)); // body alias
        assert!(expanded.contains(&-82)); // owning spacecraft of frame -82905
    }

    #[test]
    fn expansion_is_idempotent() {
        let table = table();
        for seed in [
            IdSet::from([999]),
            IdSet::from([-82905]),
            IdSet::from([13000, 699]),
            IdSet::new(),
        ] {
            let once = table.expand(&seed);
            let twice = table.expand(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn frame_aliases_need_the_generic_band() {
        let table = table();

        // Nothing in the generic band: frame aliases are not pulled in
        let plain = table.expand(&IdSet::from([699]));
        assert_eq!(plain, IdSet::from([699]));

        // A generic-band frame ID pulls in the alias frames
        let framed = table.expand(&IdSet::from([13000]));
        assert!(framed.contains(&13001));
    }

    #[test]
    fn normalization_picks_primaries() {
        let table = table();
        assert_eq!(table.normalize(&IdSet::from([999, 699])), IdSet::from([9, 699]));
        assert_eq!(table.primary(999), 9);
        assert_eq!(table.primary(699), 699);
    }
}
