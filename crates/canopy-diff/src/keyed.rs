#![forbid(unsafe_code)]

//! Keyed child-list reconciler.
//!
//! One forward pass with a cursor on each side. Matching keys are diffed in
//! place. On a mismatch the reconciler looks one entry ahead on both sides to
//! tell the cases apart without backtracking:
//!
//! | lookahead                                      | case             | advance |
//! |------------------------------------------------|------------------|---------|
//! | `new[j] == old[i+1]` and `old[i] == new[j+1]`  | swap             | 2 / 2   |
//! | `old[i] == new[j+1]`                           | insert `new[j]`  | 1 / 2   |
//! | `new[j] == old[i+1]`                           | remove `old[i]`  | 2 / 1   |
//! | `old[i+1] == new[j+1]`                         | remove + insert  | 2 / 2   |
//! | none                                           | stop             |         |
//!
//! Whatever is left on the old side is removed and whatever is left on the
//! new side becomes a trailing insert.
//!
//! # Moves
//!
//! Every removal and insertion is recorded in a side table by key. When a
//! key shows up on the other side later, the entry becomes a move: the real
//! node is detached, patched with one sub-diff, and reinserted, never
//! destroyed and rebuilt.
//!
//! # Duplicate keys
//!
//! A key that reappears on the same side is retried with
//! [`DUPLICATE_KEY_SUFFIX`] appended until it is unique in the table. The
//! outcome is deterministic, though not minimal.

use rustc_hash::FxHashMap;

use canopy_core::VNode;

use crate::diff::diff_help;
use crate::patch::{EntryState, KeyedEntry, KeyedInsert, KeyedMove, KeyedReorder, Patch, PatchKind};

/// Appended to a key that is already present in the side table.
pub const DUPLICATE_KEY_SUFFIX: &str = "_canopy_dup";

struct Slot<Msg> {
    key: String,
    state: EntryState,
    node: VNode<Msg>,
    /// Old-tree address of the removed node.
    address: usize,
    /// Index of the pending removal patch in the local patch list.
    patch_ref: Option<usize>,
}

struct Reconciler<Msg> {
    patches: Vec<Patch<Msg>>,
    slots: Vec<Slot<Msg>>,
    by_key: FxHashMap<String, usize>,
    inserts: Vec<KeyedInsert>,
    trailing: Vec<usize>,
}

impl<Msg> Reconciler<Msg> {
    fn new() -> Self {
        Self {
            patches: Vec::new(),
            slots: Vec::new(),
            by_key: FxHashMap::default(),
            inserts: Vec::new(),
            trailing: Vec::new(),
        }
    }

    fn push_slot(&mut self, slot: Slot<Msg>) -> usize {
        let id = self.slots.len();
        self.by_key.insert(slot.key.clone(), id);
        self.slots.push(slot);
        id
    }

    fn record_insert(&mut self, position: Option<usize>, entry: usize) {
        match position {
            Some(index) => self.inserts.push(KeyedInsert { index, entry }),
            None => self.trailing.push(entry),
        }
    }

    /// Record `node` as appearing at `position` of the new list, or at the
    /// end when `position` is `None`.
    fn insert(&mut self, key: &str, node: &VNode<Msg>, position: Option<usize>) {
        let mut key = key.to_owned();
        loop {
            let Some(&id) = self.by_key.get(&key) else {
                let id = self.push_slot(Slot {
                    key,
                    state: EntryState::Inserted,
                    node: node.clone(),
                    address: 0,
                    patch_ref: None,
                });
                self.record_insert(position, id);
                return;
            };

            if self.slots[id].state == EntryState::Removed {
                self.record_insert(position, id);
                let slot = &mut self.slots[id];
                slot.state = EntryState::Moved;
                let old = std::mem::replace(&mut slot.node, node.clone());
                let address = slot.address;
                let patch_ref = slot.patch_ref;

                let mut sub = Vec::new();
                diff_help(&old, node, &mut sub, address);
                if let Some(patch_ref) = patch_ref {
                    self.patches[patch_ref].kind =
                        PatchKind::RemoveKeyedChild(Some(KeyedMove {
                            entry: id,
                            patches: sub,
                        }));
                }
                return;
            }

            key.push_str(DUPLICATE_KEY_SUFFIX);
        }
    }

    /// Record the old `node` at `address` as leaving its position.
    fn remove(&mut self, key: &str, node: &VNode<Msg>, address: usize) {
        let mut key = key.to_owned();
        loop {
            let Some(&id) = self.by_key.get(&key) else {
                let patch_ref = self.patches.len();
                self.patches
                    .push(Patch::new(address, PatchKind::RemoveKeyedChild(None)));
                self.push_slot(Slot {
                    key,
                    state: EntryState::Removed,
                    node: node.clone(),
                    address,
                    patch_ref: Some(patch_ref),
                });
                return;
            };

            if self.slots[id].state == EntryState::Inserted {
                self.slots[id].state = EntryState::Moved;
                let new = self.slots[id].node.clone();
                let mut sub = Vec::new();
                diff_help(node, &new, &mut sub, address);
                self.patches.push(Patch::new(
                    address,
                    PatchKind::RemoveKeyedChild(Some(KeyedMove {
                        entry: id,
                        patches: sub,
                    })),
                ));
                return;
            }

            key.push_str(DUPLICATE_KEY_SUFFIX);
        }
    }

    fn finish(self, address: usize) -> Option<Patch<Msg>> {
        if self.patches.is_empty() && self.inserts.is_empty() && self.trailing.is_empty() {
            return None;
        }
        let entries = self
            .slots
            .into_iter()
            .map(|slot| KeyedEntry {
                key: slot.key,
                state: slot.state,
                node: slot.node,
            })
            .collect();
        Some(Patch::new(
            address,
            PatchKind::ReorderKeyedChildren(KeyedReorder {
                patches: self.patches,
                entries,
                inserts: self.inserts,
                trailing_inserts: self.trailing,
            }),
        ))
    }
}

/// Reconcile two keyed child lists of the element at `address`.
///
/// Returns `None` when the lists need no change.
pub fn diff_keyed<Msg>(
    old: &[(String, VNode<Msg>)],
    new: &[(String, VNode<Msg>)],
    address: usize,
) -> Option<Patch<Msg>> {
    #[cfg(feature = "tracing")]
    let _span = tracing::trace_span!("diff_keyed", address, old = old.len(), new = new.len())
        .entered();

    let mut rec = Reconciler::new();
    let mut index = address;
    let (mut i, mut j) = (0, 0);

    while i < old.len() && j < new.len() {
        let (x_key, x) = (&old[i].0, &old[i].1);
        let (y_key, y) = (&new[j].0, &new[j].1);

        if x_key == y_key {
            index += 1;
            diff_help(x, y, &mut rec.patches, index);
            index += x.descendant_count();
            i += 1;
            j += 1;
            continue;
        }

        let x_next = old.get(i + 1);
        let y_next = new.get(j + 1);
        // The new entry is the next old one: the current old entry left.
        let old_match = x_next.is_some_and(|(k, _)| k == y_key);
        // The old entry is the next new one: the current new entry arrived.
        let new_match = y_next.is_some_and(|(k, _)| k == x_key);

        match (x_next, y_next) {
            (Some((x_next_key, x_next_node)), Some((_, y_next_node))) if old_match && new_match => {
                index += 1;
                diff_help(x, y_next_node, &mut rec.patches, index);
                rec.insert(y_key, y, Some(j));
                index += x.descendant_count();

                index += 1;
                rec.remove(x_next_key, x_next_node, index);
                index += x_next_node.descendant_count();

                i += 2;
                j += 2;
            }
            (_, Some((_, y_next_node))) if new_match => {
                index += 1;
                rec.insert(y_key, y, Some(j));
                diff_help(x, y_next_node, &mut rec.patches, index);
                index += x.descendant_count();

                i += 1;
                j += 2;
            }
            (Some((_, x_next_node)), _) if old_match => {
                index += 1;
                rec.remove(x_key, x, index);
                index += x.descendant_count();

                index += 1;
                diff_help(x_next_node, y, &mut rec.patches, index);
                index += x_next_node.descendant_count();

                i += 2;
                j += 1;
            }
            (Some((x_next_key, x_next_node)), Some((y_next_key, y_next_node)))
                if x_next_key == y_next_key =>
            {
                index += 1;
                rec.remove(x_key, x, index);
                rec.insert(y_key, y, Some(j));
                index += x.descendant_count();

                index += 1;
                diff_help(x_next_node, y_next_node, &mut rec.patches, index);
                index += x_next_node.descendant_count();

                i += 2;
                j += 2;
            }
            _ => break,
        }
    }

    for (key, node) in &old[i..] {
        index += 1;
        rec.remove(key, node, index);
        index += node.descendant_count();
    }

    for (key, node) in &new[j..] {
        rec.insert(key, node, None);
    }

    rec.finish(address)
}
