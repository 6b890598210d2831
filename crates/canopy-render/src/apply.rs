#![forbid(unsafe_code)]

//! Patch applier.
//!
//! Application runs in two phases.
//!
//! 1. **Resolve**: one pre-order walk of the *old* tree, in step with the
//!    address-sorted patch list, binds every patch to its real node. The
//!    walk only descends into a child when the next pending address falls in
//!    that child's `[low, low + descendant_count]` window, so untouched
//!    subtrees are skipped without being read.
//! 2. **Replay**: bindings are applied in list order. Nested lists (lazy
//!    results, keyed reorders, moved subtrees) were resolved in phase 1
//!    against the node their parent patch is bound to.
//!
//! # Panics
//!
//! A patch whose address the old tree cannot produce means the differ and
//! the applier disagree on tree shape. That is a caller bug, and the applier
//! panics instead of guessing.

use std::rc::Rc;

use canopy_core::{EventScope, Node, NodeId, Surface, SurfaceError, VNode};
use canopy_diff::{EntryState, KeyedReorder, Patch, PatchKind};

use crate::renderer::{apply_fact_diff, render, write_facts};

/// A patch bound to the real node it targets.
struct Binding<'p, Msg> {
    patch: &'p Patch<Msg>,
    node: NodeId,
    /// Scope listeners created by this patch attach to.
    scope: Rc<EventScope<Msg>>,
    /// Scope owned by the tagger run at this address, if the node is one.
    run_scope: Option<Rc<EventScope<Msg>>>,
    nested: Vec<Binding<'p, Msg>>,
}

/// Apply `patches`, computed against `old`, to the real tree rooted at
/// `root`. Returns the root afterwards, which differs from `root` when the
/// root itself was replaced.
///
/// # Panics
///
/// Panics if a patch address does not resolve against `old` or the real
/// tree is missing a child the old tree says it has.
pub fn apply_patches<Msg>(
    surface: &mut dyn Surface<Msg>,
    root: NodeId,
    old: &VNode<Msg>,
    patches: &[Patch<Msg>],
    scope: &Rc<EventScope<Msg>>,
) -> Result<NodeId, SurfaceError> {
    if patches.is_empty() {
        return Ok(root);
    }

    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("apply_patches", patches = patches.len()).entered();

    let bindings = {
        #[cfg(feature = "tracing")]
        let _span = tracing::trace_span!("resolve_addresses").entered();
        resolve_list(&*surface, root, old, patches, 0, old.descendant_count(), scope)
    };

    replay(surface, root, &bindings, &mut Vec::new())
}

// ── Resolve ─────────────────────────────────────────────────────────────

/// Resolve a whole list against `vnode` at `node`, asserting every patch
/// found its target.
fn resolve_list<'p, Msg>(
    surface: &dyn Surface<Msg>,
    node: NodeId,
    vnode: &VNode<Msg>,
    patches: &'p [Patch<Msg>],
    low: usize,
    high: usize,
    scope: &Rc<EventScope<Msg>>,
) -> Vec<Binding<'p, Msg>> {
    let mut out = Vec::with_capacity(patches.len());
    if patches.is_empty() {
        return out;
    }
    let next = resolve(surface, node, vnode, patches, 0, low, high, scope, &mut out);
    if let Some(stray) = patches.get(next) {
        panic!(
            "patch {:?} at address {} does not resolve against the old tree (window {low}..={high})",
            stray.kind.name(),
            stray.address
        );
    }
    out
}

/// Bind every patch addressed inside `[low, high]`, starting at `patches[i]`.
/// Returns the index of the first patch left unbound.
#[allow(clippy::too_many_arguments)]
fn resolve<'p, Msg>(
    surface: &dyn Surface<Msg>,
    node: NodeId,
    vnode: &VNode<Msg>,
    patches: &'p [Patch<Msg>],
    mut i: usize,
    low: usize,
    high: usize,
    scope: &Rc<EventScope<Msg>>,
    out: &mut Vec<Binding<'p, Msg>>,
) -> usize {
    let Some(mut patch) = patches.get(i) else {
        return i;
    };

    let run_scope = match vnode.node() {
        Node::Tagged(_) => surface
            .event_scope(node)
            .and_then(|innermost| innermost.link_below(scope)),
        _ => None,
    };

    while patch.address == low {
        let nested = match &patch.kind {
            PatchKind::RecurseInto(sub) => {
                let Node::Lazy(lazy) = vnode.node() else {
                    panic!("recurse-into patch at {low} targets a {} node", vnode.kind_name());
                };
                let forced = lazy.force();
                resolve_list(surface, node, &forced, sub, 0, forced.descendant_count(), scope)
            }
            PatchKind::ReorderKeyedChildren(reorder) => {
                resolve_list(surface, node, vnode, &reorder.patches, low, high, scope)
            }
            PatchKind::RemoveKeyedChild(Some(mv)) => {
                resolve_list(surface, node, vnode, &mv.patches, low, high, scope)
            }
            _ => Vec::new(),
        };
        out.push(Binding {
            patch,
            node,
            scope: Rc::clone(scope),
            run_scope: run_scope.clone(),
            nested,
        });

        i += 1;
        match patches.get(i) {
            Some(next) if next.address <= high => patch = next,
            _ => return i,
        }
    }

    match vnode.node() {
        Node::Tagged(_) => {
            let mut inner = vnode;
            while let Node::Tagged(t) = inner.node() {
                inner = t.child();
            }
            let scope = run_scope
                .or_else(|| surface.event_scope(node))
                .unwrap_or_else(|| Rc::clone(scope));
            resolve(surface, node, inner, patches, i, low + 1, high, &scope, out)
        }
        Node::Element(e) => resolve_kids(
            surface,
            node,
            e.children().iter(),
            patches,
            i,
            low,
            high,
            scope,
            out,
        ),
        Node::Keyed(k) => resolve_kids(
            surface,
            node,
            k.children().iter().map(|(_, kid)| kid),
            patches,
            i,
            low,
            high,
            scope,
            out,
        ),
        Node::Text(_) | Node::Lazy(_) | Node::Custom(_) => i,
    }
}

#[allow(clippy::too_many_arguments)]
fn resolve_kids<'a, 'p, Msg: 'a>(
    surface: &dyn Surface<Msg>,
    node: NodeId,
    kids: impl Iterator<Item = &'a VNode<Msg>>,
    patches: &'p [Patch<Msg>],
    mut i: usize,
    mut low: usize,
    high: usize,
    scope: &Rc<EventScope<Msg>>,
    out: &mut Vec<Binding<'p, Msg>>,
) -> usize {
    let Some(mut index) = patches.get(i).map(|p| p.address) else {
        return i;
    };

    for (j, kid) in kids.enumerate() {
        low += 1;
        let next_low = low + kid.descendant_count();
        if low <= index && index <= next_low {
            let child = surface.child_at(node, j).unwrap_or_else(|| {
                panic!("real node {node} has no child {j} for patch address {index}")
            });
            i = resolve(surface, child, kid, patches, i, low, next_low, scope, out);
            match patches.get(i) {
                Some(next) if next.address <= high => index = next.address,
                _ => return i,
            }
        }
        low = next_low;
    }
    i
}

// ── Replay ──────────────────────────────────────────────────────────────

/// Apply bindings in order. `moved` collects detached nodes of the keyed
/// reorder whose local patches are being replayed.
fn replay<Msg>(
    surface: &mut dyn Surface<Msg>,
    root: NodeId,
    bindings: &[Binding<'_, Msg>],
    moved: &mut Vec<Option<NodeId>>,
) -> Result<NodeId, SurfaceError> {
    let mut root = root;
    for binding in bindings {
        #[cfg(feature = "tracing")]
        tracing::trace!(
            patch = binding.patch.kind.name(),
            address = binding.patch.address,
            node = %binding.node,
            "apply"
        );

        let node = apply_one(surface, binding, moved)?;
        if binding.node == root {
            root = node;
        }
    }
    Ok(root)
}

fn apply_one<Msg>(
    surface: &mut dyn Surface<Msg>,
    binding: &Binding<'_, Msg>,
    moved: &mut Vec<Option<NodeId>>,
) -> Result<NodeId, SurfaceError> {
    let node = binding.node;
    match &binding.patch.kind {
        PatchKind::Replace(vnode) => {
            let parent = surface.parent(node);
            let fresh = render(surface, vnode, &binding.scope)?;
            if surface.event_scope(fresh).is_none() {
                if let Some(scope) = surface.event_scope(node) {
                    surface.set_event_scope(fresh, scope)?;
                }
            }
            if let Some(parent) = parent {
                surface.replace_child(parent, fresh, node)?;
            }
            Ok(fresh)
        }
        PatchKind::RecurseInto(_) => replay(surface, node, &binding.nested, &mut Vec::new()),
        PatchKind::RetagEventMapper(chain) => {
            match &binding.run_scope {
                Some(scope) => scope.retag(chain.clone()),
                None => {
                    let scope = EventScope::child(&binding.scope, chain.clone());
                    surface.set_event_scope(node, scope)?;
                }
            }
            Ok(node)
        }
        PatchKind::ReplaceText(text) => {
            surface.set_text(node, text)?;
            Ok(node)
        }
        PatchKind::UpdateFacts(diff) => {
            apply_fact_diff(surface, node, diff, &binding.scope)?;
            Ok(node)
        }
        PatchKind::RemoveNChildrenFromEnd { keep, remove } => {
            for _ in 0..*remove {
                let child = surface
                    .child_at(node, *keep)
                    .ok_or(SurfaceError::ChildOutOfRange {
                        parent: node,
                        index: *keep,
                    })?;
                surface.remove_child(node, child)?;
            }
            Ok(node)
        }
        PatchKind::AppendNChildren { children, .. } => {
            for kid in children {
                let child = render(surface, kid, &binding.scope)?;
                surface.append_child(node, child)?;
            }
            Ok(node)
        }
        PatchKind::ReorderKeyedChildren(reorder) => {
            apply_reorder(surface, binding, reorder)?;
            Ok(node)
        }
        PatchKind::RemoveKeyedChild(mv) => {
            if let Some(parent) = surface.parent(node) {
                surface.remove_child(parent, node)?;
            }
            if let Some(mv) = mv {
                let patched = replay(surface, node, &binding.nested, &mut Vec::new())?;
                if moved.len() <= mv.entry {
                    moved.resize(mv.entry + 1, None);
                }
                moved[mv.entry] = Some(patched);
            }
            Ok(node)
        }
        PatchKind::RunCustomPatch {
            widget,
            payload,
            facts,
        } => {
            let parent = surface.parent(node);
            let patched = widget.patch(surface, node, payload.as_ref())?;
            if patched != node {
                write_facts(surface, patched, facts, &binding.scope)?;
                if surface.event_scope(patched).is_none() {
                    if let Some(scope) = surface.event_scope(node) {
                        surface.set_event_scope(patched, scope)?;
                    }
                }
                if let Some(parent) = parent {
                    surface.replace_child(parent, patched, node)?;
                }
            }
            Ok(patched)
        }
    }
}

fn apply_reorder<Msg>(
    surface: &mut dyn Surface<Msg>,
    binding: &Binding<'_, Msg>,
    reorder: &KeyedReorder<Msg>,
) -> Result<(), SurfaceError> {
    let node = binding.node;
    let mut moved = vec![None; reorder.entries.len()];
    replay(surface, node, &binding.nested, &mut moved)?;

    for insert in &reorder.inserts {
        let child = place(surface, reorder, insert.entry, &moved, &binding.scope)?;
        surface.insert_child(node, insert.index, child)?;
    }
    for &entry in &reorder.trailing_inserts {
        let child = place(surface, reorder, entry, &moved, &binding.scope)?;
        surface.append_child(node, child)?;
    }
    Ok(())
}

/// Real node for an inserted entry: the parked node of a move, or a fresh
/// render.
fn place<Msg>(
    surface: &mut dyn Surface<Msg>,
    reorder: &KeyedReorder<Msg>,
    entry: usize,
    moved: &[Option<NodeId>],
    scope: &Rc<EventScope<Msg>>,
) -> Result<NodeId, SurfaceError> {
    let slot = &reorder.entries[entry];
    match slot.state {
        EntryState::Moved => Ok(moved.get(entry).copied().flatten().unwrap_or_else(|| {
            panic!("moved keyed child {:?} was never detached", slot.key)
        })),
        EntryState::Inserted | EntryState::Removed => render(surface, &slot.node, scope),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessDom;
    use crate::renderer::mount;
    use canopy_core::Fact;
    use canopy_diff::diff;
    use pretty_assertions::assert_eq;

    type N = VNode<()>;

    fn scope() -> Rc<EventScope<()>> {
        EventScope::root(|_| {})
    }

    fn cycle(old: &N, new: &N) -> (HeadlessDom<()>, NodeId) {
        let scope = scope();
        let mut dom = HeadlessDom::<()>::new();
        let root = mount(&mut dom, old, &scope).expect("mount");
        dom.reset_stats();
        let patches = diff(old, new);
        let root = apply_patches(&mut dom, root, old, &patches, &scope).expect("apply");
        (dom, root)
    }

    fn expected(new: &N) -> String {
        let mut dom = HeadlessDom::<()>::new();
        let root = mount(&mut dom, new, &scope()).expect("mount");
        dom.to_markup(root)
    }

    fn li(key: &str) -> (String, N) {
        (key.to_owned(), N::element("li", [], vec![N::text(key)]))
    }

    #[test]
    fn empty_patch_list_keeps_root() {
        let tree = N::element("div", [], vec![]);
        let (dom, root) = cycle(&tree, &tree);
        assert_eq!(dom.stats().total(), 0);
        assert_eq!(dom.to_markup(root), "<div></div>");
    }

    #[test]
    fn text_change_touches_one_node() {
        let old = N::element(
            "div",
            [],
            vec![
                N::element("p", [], vec![N::text("a")]),
                N::element("p", [], vec![N::text("b")]),
            ],
        );
        let new = N::element(
            "div",
            [],
            vec![
                N::element("p", [], vec![N::text("a")]),
                N::element("p", [], vec![N::text("B")]),
            ],
        );
        let (dom, root) = cycle(&old, &new);
        assert_eq!(dom.to_markup(root), expected(&new));
        assert_eq!(dom.stats().total(), 1);
        assert_eq!(dom.stats().text_writes, 1);
    }

    #[test]
    fn root_replacement_returns_new_root() {
        let old = N::element("div", [], vec![]);
        let new = N::element("section", [], vec![N::text("x")]);
        let (dom, root) = cycle(&old, &new);
        assert_eq!(dom.to_markup(root), "<section>x</section>");
    }

    #[test]
    fn nested_replace_substitutes_in_parent() {
        let old = N::element("div", [], vec![N::text("a"), N::element("i", [], vec![])]);
        let new = N::element("div", [], vec![N::text("a"), N::element("b", [], vec![])]);
        let (dom, root) = cycle(&old, &new);
        assert_eq!(dom.to_markup(root), "<div>a<b></b></div>");
        assert_eq!(dom.stats().replaced, 1);
    }

    #[test]
    fn shrink_and_grow() {
        let five = N::element("ul", [], (0..5).map(|i| N::text(i.to_string())).collect());
        let two = N::element("ul", [], (0..2).map(|i| N::text(i.to_string())).collect());
        let (dom, root) = cycle(&five, &two);
        assert_eq!(dom.to_markup(root), "<ul>01</ul>");
        assert_eq!(dom.stats().removed, 3);

        let (dom, root) = cycle(&two, &five);
        assert_eq!(dom.to_markup(root), "<ul>01234</ul>");
        assert_eq!(dom.stats().created, 3);
    }

    #[test]
    fn fact_updates_write_only_changed_keys() {
        let old = N::element(
            "p",
            [Fact::style("color", "red"), Fact::attribute("id", "x")],
            vec![],
        );
        let new = N::element(
            "p",
            [
                Fact::style("color", "blue"),
                Fact::style("font-weight", "bold"),
                Fact::attribute("id", "x"),
            ],
            vec![],
        );
        let (dom, root) = cycle(&old, &new);
        assert_eq!(dom.to_markup(root), expected(&new));
        assert_eq!(dom.stats().fact_writes, 2);
    }

    #[test]
    fn keyed_swap_moves_real_nodes() {
        let old_items = vec![li("a"), li("b"), li("c"), li("d")];
        let new_items = vec![
            old_items[0].clone(),
            old_items[2].clone(),
            old_items[1].clone(),
            old_items[3].clone(),
        ];
        let old = N::keyed("ul", [], old_items);
        let new = N::keyed("ul", [], new_items);

        let scope = scope();
        let mut dom = HeadlessDom::<()>::new();
        let root = mount(&mut dom, &old, &scope).expect("mount");
        let c_before = dom.children(root)[2];
        dom.reset_stats();

        let patches = diff(&old, &new);
        let root = apply_patches(&mut dom, root, &old, &patches, &scope).expect("apply");
        assert_eq!(dom.to_markup(root), expected(&new));
        assert_eq!(dom.children(root)[1], c_before);
        assert_eq!(dom.stats().created, 0);
    }

    #[test]
    fn keyed_insert_remove_and_append() {
        let old = N::keyed("ul", [], vec![li("a"), li("b"), li("c")]);
        let new = N::keyed("ul", [], vec![li("x"), li("a"), li("c"), li("d"), li("e")]);
        let (dom, root) = cycle(&old, &new);
        assert_eq!(dom.to_markup(root), expected(&new));
    }

    #[test]
    fn keyed_reversal() {
        let keys = ["a", "b", "c", "d", "e", "f"];
        let old = N::keyed("ol", [], keys.iter().map(|k| li(k)).collect());
        let new = N::keyed("ol", [], keys.iter().rev().map(|k| li(k)).collect());
        let (dom, root) = cycle(&old, &new);
        assert_eq!(dom.to_markup(root), expected(&new));
        assert_eq!(dom.stats().created, 0);
    }

    #[test]
    fn moved_child_keeps_its_subdiff() {
        let old = N::keyed("ul", [], vec![li("a"), li("b"), li("c")]);
        let new = N::keyed(
            "ul",
            [],
            vec![
                ("c".to_owned(), N::element("li", [], vec![N::text("C!")])),
                li("a"),
                li("b"),
            ],
        );
        let (dom, root) = cycle(&old, &new);
        assert_eq!(dom.to_markup(root), "<ul><li>C!</li><li>a</li><li>b</li></ul>");
        assert_eq!(dom.stats().created, 0);
    }

    #[test]
    fn lazy_subpatches_apply_inside_forced_result() {
        use std::any::Any;

        let old = N::element(
            "div",
            [],
            vec![N::lazy(vec![Rc::new(1_u8) as Rc<dyn Any>], || {
                N::element("p", [], vec![N::text("one")])
            })],
        );
        let new = N::element(
            "div",
            [],
            vec![N::lazy(vec![Rc::new(2_u8) as Rc<dyn Any>], || {
                N::element("p", [], vec![N::text("two")])
            })],
        );
        let (dom, root) = cycle(&old, &new);
        assert_eq!(dom.to_markup(root), "<div><p>two</p></div>");
        assert_eq!(dom.stats().total(), 1);
    }

    #[test]
    #[should_panic(expected = "does not resolve")]
    fn unresolvable_address_is_fatal() {
        let scope = scope();
        let mut dom = HeadlessDom::<()>::new();
        let tree = N::element("div", [], vec![N::text("a")]);
        let root = mount(&mut dom, &tree, &scope).expect("mount");
        let bogus = vec![Patch::new(9, PatchKind::ReplaceText("x".into()))];
        let _ = apply_patches(&mut dom, root, &tree, &bogus, &scope);
    }
}
