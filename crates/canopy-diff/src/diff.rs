#![forbid(unsafe_code)]

//! Tree differ.
//!
//! Walks the old and new trees in lockstep and emits a flat patch list in
//! ascending address order.
//!
//! # Algorithm
//!
//! 1. Same node handle: nothing to do.
//! 2. Text against text: [`PatchKind::ReplaceText`] if the strings differ.
//! 3. Lazy against lazy: identical identity arguments adopt the old cached
//!    result; otherwise both results are forced and diffed from address 0
//!    into a [`PatchKind::RecurseInto`].
//! 4. Tagger against tagger: nested runs are collected into mapper chains.
//!    Runs of different length are replaced. Chains that are not pairwise the
//!    same allocation produce a [`PatchKind::RetagEventMapper`]. The wrapped
//!    nodes are then diffed one address below.
//! 5. Custom against custom: a different widget replaces; otherwise facts
//!    and the widget's own model diff are compared.
//! 6. Element-like against element-like: a different tag or namespace
//!    replaces; otherwise facts are diffed and the children go to the keyed
//!    reconciler when both sides are keyed, or to the positional diff when
//!    either side is not (the keyed side is read without its keys).
//! 7. Anything else: [`PatchKind::Replace`].
//!
//! # Addresses
//!
//! Each child sits at its parent's address plus one plus the descendant
//! counts of all earlier siblings (each plus one). Addresses therefore index
//! the old tree in pre-order no matter how many patches were emitted.
//!
//! # Usage
//!
//! ```
//! use canopy_core::VNode;
//! use canopy_diff::{PatchKind, diff};
//!
//! let old: VNode<()> = VNode::element("p", [], vec![VNode::text("hello")]);
//! let new: VNode<()> = VNode::element("p", [], vec![VNode::text("world")]);
//!
//! let patches = diff(&old, &new);
//! assert_eq!(patches.len(), 1);
//! assert_eq!(patches[0].address, 1);
//! assert!(matches!(patches[0].kind, PatchKind::ReplaceText(_)));
//! ```

use std::rc::Rc;

use canopy_core::{Facts, MapperChain, Node, VNode};

use crate::facts_diff::diff_facts;
use crate::keyed::diff_keyed;
use crate::patch::{Patch, PatchKind};

/// Diff two trees. Addresses start at 0 for the root.
pub fn diff<Msg>(old: &VNode<Msg>, new: &VNode<Msg>) -> Vec<Patch<Msg>> {
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!(
        "diff",
        old_size = old.descendant_count() + 1,
        new_size = new.descendant_count() + 1
    )
    .entered();

    let mut patches = Vec::new();
    diff_help(old, new, &mut patches, 0);

    #[cfg(feature = "tracing")]
    tracing::trace!(patches = patches.len(), "diff complete");

    patches
}

pub(crate) fn diff_help<Msg>(
    old: &VNode<Msg>,
    new: &VNode<Msg>,
    patches: &mut Vec<Patch<Msg>>,
    index: usize,
) {
    if old.ptr_eq(new) {
        return;
    }

    match (old.node(), new.node()) {
        (Node::Text(a), Node::Text(b)) => {
            if a != b {
                patches.push(Patch::new(index, PatchKind::ReplaceText(b.clone())));
            }
        }
        (Node::Lazy(a), Node::Lazy(b)) => {
            if a.same_args(b) {
                b.adopt(a.force());
                return;
            }
            let old_result = a.force();
            let new_result = b.force();
            let mut sub = Vec::new();
            diff_help(&old_result, &new_result, &mut sub, 0);
            if !sub.is_empty() {
                patches.push(Patch::new(index, PatchKind::RecurseInto(sub)));
            }
        }
        (Node::Tagged(_), Node::Tagged(_)) => diff_taggers(old, new, patches, index),
        (Node::Custom(a), Node::Custom(b)) => {
            if !Rc::ptr_eq(a.widget(), b.widget()) {
                patches.push(Patch::new(index, PatchKind::Replace(new.clone())));
                return;
            }
            if let Some(facts) = diff_facts(a.facts(), b.facts()) {
                patches.push(Patch::new(index, PatchKind::UpdateFacts(facts)));
            }
            if let Some(payload) = b.widget().diff(a.model(), b.model()) {
                patches.push(Patch::new(
                    index,
                    PatchKind::RunCustomPatch {
                        widget: Rc::clone(b.widget()),
                        payload,
                        facts: Rc::clone(b.facts()),
                    },
                ));
            }
        }
        _ => match (ElementView::of(old), ElementView::of(new)) {
            (Some(x), Some(y)) => diff_elements(x, y, new, patches, index),
            _ => patches.push(Patch::new(index, PatchKind::Replace(new.clone()))),
        },
    }
}

/// Mappers of a run of directly nested taggers, plus the node they wrap.
fn gather_taggers<Msg>(node: &VNode<Msg>) -> (MapperChain<Msg>, &VNode<Msg>) {
    let mut chain = MapperChain::new();
    let mut current = node;
    while let Node::Tagged(t) = current.node() {
        chain.push(Rc::clone(t.mapper()));
        current = t.child();
    }
    (chain, current)
}

fn diff_taggers<Msg>(
    old: &VNode<Msg>,
    new: &VNode<Msg>,
    patches: &mut Vec<Patch<Msg>>,
    index: usize,
) {
    let (old_chain, old_inner) = gather_taggers(old);
    let (new_chain, new_inner) = gather_taggers(new);
    let nesting = old_chain.len() > 1 || new_chain.len() > 1;

    if nesting && old_chain.len() != new_chain.len() {
        patches.push(Patch::new(index, PatchKind::Replace(new.clone())));
        return;
    }

    let same = old_chain.len() == new_chain.len()
        && old_chain
            .iter()
            .zip(&new_chain)
            .all(|(a, b)| Rc::ptr_eq(a, b));
    if !same {
        patches.push(Patch::new(index, PatchKind::RetagEventMapper(new_chain)));
    }

    // A whole run of taggers resolves to one real scope; the wrapped node
    // sits one address below it.
    diff_help(old_inner, new_inner, patches, index + 1);
}

/// Children of an element-like node, with or without keys.
enum Kids<'a, Msg> {
    Unkeyed(&'a [VNode<Msg>]),
    Keyed(&'a [(String, VNode<Msg>)]),
}

impl<Msg> Clone for Kids<'_, Msg> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Msg> Copy for Kids<'_, Msg> {}

impl<'a, Msg> Kids<'a, Msg> {
    fn len(&self) -> usize {
        match self {
            Self::Unkeyed(kids) => kids.len(),
            Self::Keyed(kids) => kids.len(),
        }
    }

    fn get(&self, i: usize) -> &'a VNode<Msg> {
        match *self {
            Self::Unkeyed(kids) => &kids[i],
            Self::Keyed(kids) => &kids[i].1,
        }
    }
}

/// Uniform view over [`Node::Element`] and [`Node::Keyed`].
struct ElementView<'a, Msg> {
    namespace: Option<&'a str>,
    tag: &'a str,
    facts: &'a Rc<Facts<Msg>>,
    kids: Kids<'a, Msg>,
}

impl<'a, Msg> ElementView<'a, Msg> {
    fn of(node: &'a VNode<Msg>) -> Option<Self> {
        match node.node() {
            Node::Element(e) => Some(Self {
                namespace: e.namespace(),
                tag: e.tag(),
                facts: e.facts(),
                kids: Kids::Unkeyed(e.children()),
            }),
            Node::Keyed(k) => Some(Self {
                namespace: k.namespace(),
                tag: k.tag(),
                facts: k.facts(),
                kids: Kids::Keyed(k.children()),
            }),
            _ => None,
        }
    }
}

fn diff_elements<Msg>(
    old: ElementView<'_, Msg>,
    new: ElementView<'_, Msg>,
    new_node: &VNode<Msg>,
    patches: &mut Vec<Patch<Msg>>,
    index: usize,
) {
    if old.tag != new.tag || old.namespace != new.namespace {
        patches.push(Patch::new(index, PatchKind::Replace(new_node.clone())));
        return;
    }

    if let Some(facts) = diff_facts(old.facts, new.facts) {
        patches.push(Patch::new(index, PatchKind::UpdateFacts(facts)));
    }

    match (old.kids, new.kids) {
        (Kids::Keyed(x), Kids::Keyed(y)) => {
            if let Some(patch) = diff_keyed(x, y, index) {
                patches.push(patch);
            }
        }
        (x, y) => diff_kids(x, y, patches, index),
    }
}

/// Positional child diff. Length changes are pushed before the pairwise
/// diffs so the parent's patches precede its children's.
fn diff_kids<Msg>(
    old: Kids<'_, Msg>,
    new: Kids<'_, Msg>,
    patches: &mut Vec<Patch<Msg>>,
    index: usize,
) {
    let old_len = old.len();
    let new_len = new.len();

    if old_len > new_len {
        patches.push(Patch::new(
            index,
            PatchKind::RemoveNChildrenFromEnd {
                keep: new_len,
                remove: old_len - new_len,
            },
        ));
    } else if old_len < new_len {
        patches.push(Patch::new(
            index,
            PatchKind::AppendNChildren {
                keep: old_len,
                children: (old_len..new_len).map(|i| new.get(i).clone()).collect(),
            },
        ));
    }

    let mut index = index;
    for i in 0..old_len.min(new_len) {
        let kid = old.get(i);
        index += 1;
        diff_help(kid, new.get(i), patches, index);
        index += kid.descendant_count();
    }
}
