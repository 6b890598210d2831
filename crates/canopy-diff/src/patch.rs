#![forbid(unsafe_code)]

//! Patches: addressed units of deferred mutation.
//!
//! Every [`Patch`] carries a pre-order address into the *old* tree. The
//! applier resolves addresses against the old tree's stored descendant
//! counts, so a patch list is only meaningful next to the tree it was
//! computed from.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use canopy_core::{Facts, MapperChain, VNode, Widget};

use crate::facts_diff::FactDiff;

/// One patch at a pre-order address of the old tree.
pub struct Patch<Msg> {
    pub address: usize,
    pub kind: PatchKind<Msg>,
}

impl<Msg> Patch<Msg> {
    #[inline]
    pub fn new(address: usize, kind: PatchKind<Msg>) -> Self {
        Self { address, kind }
    }
}

/// What a patch does to the node at its address.
pub enum PatchKind<Msg> {
    /// Render the node from scratch and substitute it.
    Replace(VNode<Msg>),
    /// Patches for the forced result of a lazy node, addressed from 0 at
    /// that node.
    RecurseInto(Vec<Patch<Msg>>),
    /// New mapper chain for a run of tagger nodes, outermost first.
    RetagEventMapper(MapperChain<Msg>),
    ReplaceText(String),
    UpdateFacts(FactDiff<Msg>),
    /// Drop children past `keep`.
    RemoveNChildrenFromEnd { keep: usize, remove: usize },
    /// Render and append `children` after the first `keep`.
    AppendNChildren {
        keep: usize,
        children: Vec<VNode<Msg>>,
    },
    ReorderKeyedChildren(KeyedReorder<Msg>),
    /// Detach a keyed child. With a move, the detached node is patched and
    /// parked for reinsertion by the enclosing reorder.
    RemoveKeyedChild(Option<KeyedMove<Msg>>),
    /// Hand `payload` to the widget. `facts` is the new fact table, written
    /// again if the widget returns a different node.
    RunCustomPatch {
        widget: Rc<dyn Widget<Msg>>,
        payload: Rc<dyn Any>,
        facts: Rc<Facts<Msg>>,
    },
}

impl<Msg> PatchKind<Msg> {
    /// Short stable name, used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Replace(_) => "replace",
            Self::RecurseInto(_) => "recurse-into",
            Self::RetagEventMapper(_) => "retag-event-mapper",
            Self::ReplaceText(_) => "replace-text",
            Self::UpdateFacts(_) => "update-facts",
            Self::RemoveNChildrenFromEnd { .. } => "remove-n-children-from-end",
            Self::AppendNChildren { .. } => "append-n-children",
            Self::ReorderKeyedChildren(_) => "reorder-keyed-children",
            Self::RemoveKeyedChild(_) => "remove-keyed-child",
            Self::RunCustomPatch { .. } => "run-custom-patch",
        }
    }
}

/// State of a keyed reconciliation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// New key, rendered fresh.
    Inserted,
    /// Old key, detached and dropped.
    Removed,
    /// Key present on both sides at different positions; the real node is reused.
    Moved,
}

/// Entry of the reconciliation side table.
pub struct KeyedEntry<Msg> {
    pub key: String,
    pub state: EntryState,
    /// Node to render when the entry is [`EntryState::Inserted`].
    pub node: VNode<Msg>,
}

/// Insertion of an entry at a position of the new child list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyedInsert {
    pub index: usize,
    pub entry: usize,
}

/// Result of reconciling one keyed child list.
pub struct KeyedReorder<Msg> {
    /// Diffs of matched children plus removals, addressed in the old tree.
    pub patches: Vec<Patch<Msg>>,
    pub entries: Vec<KeyedEntry<Msg>>,
    /// Positional inserts, applied in order after `patches`.
    pub inserts: Vec<KeyedInsert>,
    /// Entries appended after everything else.
    pub trailing_inserts: Vec<usize>,
}

/// A removal that is half of a move.
pub struct KeyedMove<Msg> {
    pub entry: usize,
    /// Patches for the moved subtree, addressed in the old tree.
    pub patches: Vec<Patch<Msg>>,
}

impl<Msg> fmt::Debug for Patch<Msg> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{} {:?}", self.address, self.kind)
    }
}

impl<Msg> fmt::Debug for PatchKind<Msg> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace(node) => f.debug_tuple("Replace").field(node).finish(),
            Self::RecurseInto(patches) => f.debug_tuple("RecurseInto").field(patches).finish(),
            Self::RetagEventMapper(chain) => f
                .debug_struct("RetagEventMapper")
                .field("mappers", &chain.len())
                .finish(),
            Self::ReplaceText(text) => f.debug_tuple("ReplaceText").field(text).finish(),
            Self::UpdateFacts(diff) => f.debug_tuple("UpdateFacts").field(diff).finish(),
            Self::RemoveNChildrenFromEnd { keep, remove } => f
                .debug_struct("RemoveNChildrenFromEnd")
                .field("keep", keep)
                .field("remove", remove)
                .finish(),
            Self::AppendNChildren { keep, children } => f
                .debug_struct("AppendNChildren")
                .field("keep", keep)
                .field("children", children)
                .finish(),
            Self::ReorderKeyedChildren(reorder) => f
                .debug_tuple("ReorderKeyedChildren")
                .field(reorder)
                .finish(),
            Self::RemoveKeyedChild(mv) => f.debug_tuple("RemoveKeyedChild").field(mv).finish(),
            Self::RunCustomPatch { .. } => f.write_str("RunCustomPatch"),
        }
    }
}

impl<Msg> fmt::Debug for KeyedEntry<Msg> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedEntry")
            .field("key", &self.key)
            .field("state", &self.state)
            .field("node", &self.node)
            .finish()
    }
}

impl<Msg> fmt::Debug for KeyedReorder<Msg> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedReorder")
            .field("patches", &self.patches)
            .field("entries", &self.entries)
            .field("inserts", &self.inserts)
            .field("trailing_inserts", &self.trailing_inserts)
            .finish()
    }
}

impl<Msg> fmt::Debug for KeyedMove<Msg> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedMove")
            .field("entry", &self.entry)
            .field("patches", &self.patches)
            .finish()
    }
}

/// Total number of patches, counting nested lists.
pub fn count_patches<Msg>(patches: &[Patch<Msg>]) -> usize {
    patches
        .iter()
        .map(|patch| {
            1 + match &patch.kind {
                PatchKind::RecurseInto(sub) => count_patches(sub),
                PatchKind::ReorderKeyedChildren(reorder) => count_patches(&reorder.patches),
                PatchKind::RemoveKeyedChild(Some(mv)) => count_patches(&mv.patches),
                _ => 0,
            }
        })
        .sum()
}
