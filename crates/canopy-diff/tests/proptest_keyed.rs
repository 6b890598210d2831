//! Property-based invariant tests for the differ and the keyed reconciler.
//!
//! 1. Diffing a tree against itself yields no patches.
//! 2. With unique keys, a key is `Removed` exactly when it left, `Inserted`
//!    exactly when it arrived, and `Moved` only when it is on both sides.
//! 3. Removing one key touches nothing but that key.
//! 4. Reconciling lists with duplicate keys is deterministic.
//! 5. Local patch addresses never decrease.

use std::collections::BTreeSet;

use canopy_core::VNode;
use canopy_diff::{EntryState, KeyedReorder, Patch, PatchKind, diff, diff_keyed};
use proptest::prelude::*;

type N = VNode<()>;

// ── Helpers ─────────────────────────────────────────────────────────────

fn item(key: u8, version: u8) -> (String, N) {
    (
        format!("k{key}"),
        N::element("li", [], vec![N::text(format!("{key}.{version}"))]),
    )
}

fn unique_keys() -> impl Strategy<Value = Vec<u8>> {
    prop::sample::subsequence((0u8..12).collect::<Vec<_>>(), 0..=12).prop_shuffle()
}

/// New list sharing nodes with `old` for keys it already had.
fn rebuild(old: &[(String, N)], keys: &[u8], versions: &[u8]) -> Vec<(String, N)> {
    keys.iter()
        .zip(versions.iter().cycle())
        .map(|(&key, &version)| {
            let name = format!("k{key}");
            match old.iter().find(|(k, _)| *k == name) {
                Some(pair) if version % 3 != 0 => pair.clone(),
                _ => item(key, version),
            }
        })
        .collect()
}

fn reorder(patch: &Patch<()>) -> &KeyedReorder<()> {
    match &patch.kind {
        PatchKind::ReorderKeyedChildren(r) => r,
        other => panic!("expected reorder, got {other:?}"),
    }
}

fn addresses_non_decreasing(patches: &[Patch<()>]) -> bool {
    patches.windows(2).all(|w| w[0].address <= w[1].address)
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Idempotence
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn keyed_list_against_itself_is_empty(keys in unique_keys()) {
        let list: Vec<_> = keys.iter().map(|&k| item(k, 0)).collect();
        prop_assert!(diff_keyed(&list, &list, 0).is_none());
        let tree = N::keyed("ul", [], list);
        prop_assert!(diff(&tree, &tree).is_empty());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Entry states agree with key membership
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn entry_states_match_membership(
        old_keys in unique_keys(),
        new_keys in unique_keys(),
        versions in prop::collection::vec(any::<u8>(), 1..8),
    ) {
        let old: Vec<_> = old_keys.iter().map(|&k| item(k, 0)).collect();
        let new = rebuild(&old, &new_keys, &versions);
        let before: BTreeSet<String> = old.iter().map(|(k, _)| k.clone()).collect();
        let after: BTreeSet<String> = new.iter().map(|(k, _)| k.clone()).collect();

        if let Some(patch) = diff_keyed(&old, &new, 0) {
            let r = reorder(&patch);
            for entry in &r.entries {
                match entry.state {
                    EntryState::Removed => {
                        prop_assert!(before.contains(&entry.key) && !after.contains(&entry.key));
                    }
                    EntryState::Inserted => {
                        prop_assert!(after.contains(&entry.key) && !before.contains(&entry.key));
                    }
                    EntryState::Moved => {
                        prop_assert!(before.contains(&entry.key) && after.contains(&entry.key));
                    }
                }
            }
            let departed = before.difference(&after).count();
            let removed = r.entries.iter().filter(|e| e.state == EntryState::Removed).count();
            prop_assert_eq!(departed, removed);
        } else {
            prop_assert_eq!(before, after);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Single removal stability
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn single_removal_is_one_patch(keys in unique_keys(), pick in any::<prop::sample::Index>()) {
        prop_assume!(!keys.is_empty());
        let old: Vec<_> = keys.iter().map(|&k| item(k, 0)).collect();
        let gone = pick.index(old.len());
        let mut new = old.clone();
        new.remove(gone);

        let patch = diff_keyed(&old, &new, 0).expect("one key removed");
        let r = reorder(&patch);
        prop_assert_eq!(r.patches.len(), 1);
        prop_assert!(matches!(r.patches[0].kind, PatchKind::RemoveKeyedChild(None)));
        prop_assert!(r.inserts.is_empty());
        prop_assert!(r.trailing_inserts.is_empty());
        prop_assert_eq!(r.entries.len(), 1);
        prop_assert_eq!(&r.entries[0].key, &old[gone].0);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Duplicate keys are deterministic
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn duplicate_keys_are_deterministic(
        old_keys in prop::collection::vec(0u8..4, 0..10),
        new_keys in prop::collection::vec(0u8..4, 0..10),
    ) {
        let old: Vec<_> = old_keys.iter().map(|&k| item(k, 0)).collect();
        let new: Vec<_> = new_keys.iter().map(|&k| item(k, 1)).collect();
        let first = format!("{:?}", diff_keyed(&old, &new, 0));
        let second = format!("{:?}", diff_keyed(&old, &new, 0));
        prop_assert_eq!(first, second);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Local patches stay in address order
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn local_patch_addresses_ascend(
        old_keys in unique_keys(),
        new_keys in unique_keys(),
        versions in prop::collection::vec(any::<u8>(), 1..8),
    ) {
        let old: Vec<_> = old_keys.iter().map(|&k| item(k, 0)).collect();
        let new = rebuild(&old, &new_keys, &versions);
        if let Some(patch) = diff_keyed(&old, &new, 3) {
            let r = reorder(&patch);
            prop_assert!(addresses_non_decreasing(&r.patches));
            prop_assert!(r.patches.iter().all(|p| p.address > 3));
        }
    }
}
