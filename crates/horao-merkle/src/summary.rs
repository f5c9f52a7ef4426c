//! `MerkleSummarize`: blanket merkle support for any [`horao_core::Crdt`].

use crate::hash::{Hash, Hasher};
use horao_core::Crdt;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A merkle root over a CRDT's history, the sorted leaf ids that produced
/// it, and the packed update bytes behind each leaf (needed to serve a
/// peer that asks for a leaf it's missing).
pub struct MerkleSummary {
    pub root: Hash,
    pub leaves: Vec<Hash>,
    pub packed: BTreeMap<Hash, Vec<u8>>,
}

/// Extension trait adding merkle sync primitives to every CRDT. Defined
/// here rather than on `horao_core::Crdt` itself so `horao-core` doesn't
/// need to depend on the hashing crate it's summarized by.
pub trait MerkleSummarize {
    fn merkle_summary(&self) -> MerkleSummary;

    /// Given a peer's root and leaf ids, return the leaves the peer has
    /// that this replica doesn't. Empty if the roots already match.
    fn resolve_merkle(&self, other_root: Hash, other_leaves: &[Hash]) -> Vec<Hash>;
}

impl<T> MerkleSummarize for T
where
    T: Crdt,
    T::Op: Serialize,
{
    fn merkle_summary(&self) -> MerkleSummary {
        let history = self.history(None, None);
        let mut packed = BTreeMap::new();
        for update in &history {
            let bytes = update.pack();
            let leaf = Hasher::hash(&bytes);
            packed.insert(leaf, bytes);
        }

        let leaves: Vec<Hash> = packed.keys().cloned().collect();
        let mut hasher = Hasher::new();
        for leaf in &leaves {
            hasher.update(leaf.as_bytes());
        }
        let root = hasher.finalize();

        MerkleSummary {
            root,
            leaves,
            packed,
        }
    }

    fn resolve_merkle(&self, other_root: Hash, other_leaves: &[Hash]) -> Vec<Hash> {
        let summary = self.merkle_summary();
        if summary.root == other_root {
            return Vec::new();
        }
        let local: BTreeSet<Hash> = summary.leaves.into_iter().collect();
        other_leaves
            .iter()
            .filter(|leaf| !local.contains(leaf))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horao_core::orset::ORSet;
    use horao_core::ScalarClock;

    #[test]
    fn matching_roots_yield_no_missing_leaves() {
        let mut a: ORSet<i32> = ORSet::new();
        a.observe(1);
        a.observe(2);

        let mut b = ORSet::with_clock(ScalarClock::with_replica_id(a.clock_uuid()));
        for u in a.history(None, None) {
            b.apply(u).unwrap();
        }

        let sa = a.merkle_summary();
        let sb = b.merkle_summary();
        assert_eq!(sa.root, sb.root);
        assert!(a.resolve_merkle(sb.root, &sb.leaves).is_empty());
    }

    #[test]
    fn divergent_histories_surface_missing_leaves() {
        let mut a: ORSet<i32> = ORSet::new();
        a.observe(1);

        let mut b: ORSet<i32> = ORSet::new();
        b.observe(2);

        let sb = b.merkle_summary();
        let missing = a.resolve_merkle(sb.root, &sb.leaves);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0], sb.leaves[0]);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn merkle_summary_is_deterministic_and_self_resolves_to_nothing(
            members in prop::collection::vec(0i32..100, 0..20),
        ) {
            let mut set: ORSet<i32> = ORSet::new();
            for m in &members {
                set.observe(*m);
            }
            let first = set.merkle_summary();
            let second = set.merkle_summary();
            prop_assert_eq!(first.root, second.root);
            prop_assert_eq!(first.leaves, second.leaves);
            prop_assert!(set.resolve_merkle(second.root, &second.leaves).is_empty());
        }
    }
}
