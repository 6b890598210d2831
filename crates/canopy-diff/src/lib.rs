#![forbid(unsafe_code)]

//! Tree differ for canopy.
//!
//! [`diff`] compares two virtual trees and returns a flat list of
//! [`Patch`]es addressed by pre-order index into the old tree. Keyed child
//! lists go through the [`keyed`] reconciler, which detects swaps, inserts,
//! removals, and moves with one step of lookahead.
//!
//! The differ never touches a real surface and never mutates a node, apart
//! from copying a lazy node's cached result forward.

pub mod diff;
pub mod facts_diff;
pub mod keyed;
pub mod patch;

pub use diff::diff;
pub use facts_diff::{FactChange, FactDiff, FactKey, diff_facts};
pub use keyed::{DUPLICATE_KEY_SUFFIX, diff_keyed};
pub use patch::{
    EntryState, KeyedEntry, KeyedInsert, KeyedMove, KeyedReorder, Patch, PatchKind, count_patches,
};
