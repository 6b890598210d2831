#![forbid(unsafe_code)]

//! Immutable virtual nodes.
//!
//! A [`VNode`] is a cheap, reference-counted handle onto one immutable
//! [`Node`]. Trees are rebuilt every render cycle and share unchanged
//! subtrees by handle. Identity matters: the differ short-circuits on
//! [`VNode::ptr_eq`], and lazy nodes compare their identity arguments by
//! reference, never structurally.
//!
//! # Descendant count
//!
//! Elements, keyed elements, and tagger wrappers store the number of nodes
//! below them, computed once in the constructor. Text, lazy, and custom
//! nodes count as leaves. The patch applier uses the stored counts as skip
//! distances while resolving pre-order addresses, so they are never
//! recomputed.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::event::Mapper;
use crate::facts::{Fact, Facts};
use crate::surface::{NodeId, Surface, SurfaceError};

/// Self-rendering node implementation supplied by the node's owner.
///
/// Two custom nodes are only diffed against each other when they share the
/// same widget allocation; otherwise the old one is replaced.
pub trait Widget<Msg> {
    /// Build the real node for `model`.
    fn render(&self, model: &dyn Any, surface: &mut dyn Surface<Msg>)
    -> Result<NodeId, SurfaceError>;

    /// Compute an opaque patch between two models, or `None` if nothing changed.
    fn diff(&self, old: &dyn Any, new: &dyn Any) -> Option<Rc<dyn Any>>;

    /// Apply a patch produced by [`Widget::diff`]. Returns the node now
    /// standing for this widget.
    fn patch(
        &self,
        surface: &mut dyn Surface<Msg>,
        node: NodeId,
        patch: &dyn Any,
    ) -> Result<NodeId, SurfaceError>;
}

/// Handle onto an immutable virtual node.
pub struct VNode<Msg>(Rc<Node<Msg>>);

impl<Msg> Clone for VNode<Msg> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

/// The node variants.
pub enum Node<Msg> {
    Text(String),
    Element(Element<Msg>),
    Keyed(KeyedElement<Msg>),
    Custom(Custom<Msg>),
    Tagged(Tagged<Msg>),
    Lazy(Lazy<Msg>),
}

/// Element with positional children.
pub struct Element<Msg> {
    namespace: Option<String>,
    tag: String,
    facts: Rc<Facts<Msg>>,
    children: Vec<VNode<Msg>>,
    descendant_count: usize,
}

/// Element whose children carry stable keys. Child order is display order.
pub struct KeyedElement<Msg> {
    namespace: Option<String>,
    tag: String,
    facts: Rc<Facts<Msg>>,
    children: Vec<(String, VNode<Msg>)>,
    descendant_count: usize,
}

/// Opaque node that renders and diffs itself.
pub struct Custom<Msg> {
    facts: Rc<Facts<Msg>>,
    model: Rc<dyn Any>,
    widget: Rc<dyn Widget<Msg>>,
}

/// Wrapper remapping messages produced below it.
pub struct Tagged<Msg> {
    mapper: Mapper<Msg>,
    child: VNode<Msg>,
    descendant_count: usize,
}

/// Memoized subtree, rebuilt only when its identity arguments change.
pub struct Lazy<Msg> {
    args: Vec<Rc<dyn Any>>,
    thunk: Rc<dyn Fn() -> VNode<Msg>>,
    cached: RefCell<Option<VNode<Msg>>>,
}

fn count_children<'a, Msg: 'a>(children: impl Iterator<Item = &'a VNode<Msg>>) -> usize {
    children.map(|kid| 1 + kid.descendant_count()).sum()
}

impl<Msg> VNode<Msg> {
    fn new(node: Node<Msg>) -> Self {
        Self(Rc::new(node))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Node::Text(text.into()))
    }

    pub fn element(
        tag: impl Into<String>,
        facts: impl IntoIterator<Item = Fact<Msg>>,
        children: Vec<VNode<Msg>>,
    ) -> Self {
        Self::build_element(None, tag.into(), facts, children)
    }

    pub fn element_ns(
        namespace: impl Into<String>,
        tag: impl Into<String>,
        facts: impl IntoIterator<Item = Fact<Msg>>,
        children: Vec<VNode<Msg>>,
    ) -> Self {
        Self::build_element(Some(namespace.into()), tag.into(), facts, children)
    }

    fn build_element(
        namespace: Option<String>,
        tag: String,
        facts: impl IntoIterator<Item = Fact<Msg>>,
        children: Vec<VNode<Msg>>,
    ) -> Self {
        let descendant_count = count_children(children.iter());
        Self::new(Node::Element(Element {
            namespace,
            tag,
            facts: Rc::new(Facts::organize(facts)),
            children,
            descendant_count,
        }))
    }

    pub fn keyed(
        tag: impl Into<String>,
        facts: impl IntoIterator<Item = Fact<Msg>>,
        children: Vec<(String, VNode<Msg>)>,
    ) -> Self {
        Self::build_keyed(None, tag.into(), facts, children)
    }

    pub fn keyed_ns(
        namespace: impl Into<String>,
        tag: impl Into<String>,
        facts: impl IntoIterator<Item = Fact<Msg>>,
        children: Vec<(String, VNode<Msg>)>,
    ) -> Self {
        Self::build_keyed(Some(namespace.into()), tag.into(), facts, children)
    }

    fn build_keyed(
        namespace: Option<String>,
        tag: String,
        facts: impl IntoIterator<Item = Fact<Msg>>,
        children: Vec<(String, VNode<Msg>)>,
    ) -> Self {
        let descendant_count = count_children(children.iter().map(|(_, kid)| kid));
        Self::new(Node::Keyed(KeyedElement {
            namespace,
            tag,
            facts: Rc::new(Facts::organize(facts)),
            children,
            descendant_count,
        }))
    }

    pub fn custom(
        facts: impl IntoIterator<Item = Fact<Msg>>,
        model: Rc<dyn Any>,
        widget: Rc<dyn Widget<Msg>>,
    ) -> Self {
        Self::new(Node::Custom(Custom {
            facts: Rc::new(Facts::organize(facts)),
            model,
            widget,
        }))
    }

    /// Wrap `child` with a shared mapper. Reusing the same `mapper` handle
    /// across renders lets the differ skip retagging.
    pub fn tagged(mapper: &Mapper<Msg>, child: VNode<Msg>) -> Self {
        let descendant_count = 1 + child.descendant_count();
        Self::new(Node::Tagged(Tagged {
            mapper: Rc::clone(mapper),
            child,
            descendant_count,
        }))
    }

    /// Memoize `thunk` behind `args`. The thunk runs at most once per node.
    pub fn lazy(args: Vec<Rc<dyn Any>>, thunk: impl Fn() -> VNode<Msg> + 'static) -> Self
    where
        Msg: 'static,
    {
        Self::new(Node::Lazy(Lazy {
            args,
            thunk: Rc::new(thunk),
            cached: RefCell::new(None),
        }))
    }

    /// Wrap this node with a fresh mapper.
    pub fn map(self, mapper: impl Fn(Msg) -> Msg + 'static) -> Self
    where
        Msg: 'static,
    {
        let mapper: Mapper<Msg> = Rc::new(mapper);
        Self::tagged(&mapper, self)
    }

    #[inline]
    pub fn node(&self) -> &Node<Msg> {
        &self.0
    }

    /// Reference identity.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of nodes below this one, as used for address skipping.
    #[inline]
    pub fn descendant_count(&self) -> usize {
        match self.node() {
            Node::Element(e) => e.descendant_count,
            Node::Keyed(k) => k.descendant_count,
            Node::Tagged(t) => t.descendant_count,
            Node::Text(_) | Node::Custom(_) | Node::Lazy(_) => 0,
        }
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self.node() {
            Node::Text(_) => "text",
            Node::Element(_) => "element",
            Node::Keyed(_) => "keyed",
            Node::Custom(_) => "custom",
            Node::Tagged(_) => "tagged",
            Node::Lazy(_) => "lazy",
        }
    }
}

impl<Msg> Element<Msg> {
    #[inline]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    #[inline]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[inline]
    pub fn facts(&self) -> &Rc<Facts<Msg>> {
        &self.facts
    }

    #[inline]
    pub fn children(&self) -> &[VNode<Msg>] {
        &self.children
    }

    #[inline]
    pub fn descendant_count(&self) -> usize {
        self.descendant_count
    }
}

impl<Msg> KeyedElement<Msg> {
    #[inline]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    #[inline]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[inline]
    pub fn facts(&self) -> &Rc<Facts<Msg>> {
        &self.facts
    }

    #[inline]
    pub fn children(&self) -> &[(String, VNode<Msg>)] {
        &self.children
    }

    #[inline]
    pub fn descendant_count(&self) -> usize {
        self.descendant_count
    }
}

impl<Msg> Custom<Msg> {
    #[inline]
    pub fn facts(&self) -> &Rc<Facts<Msg>> {
        &self.facts
    }

    #[inline]
    pub fn model(&self) -> &dyn Any {
        &*self.model
    }

    #[inline]
    pub fn widget(&self) -> &Rc<dyn Widget<Msg>> {
        &self.widget
    }
}

impl<Msg> Tagged<Msg> {
    #[inline]
    pub fn mapper(&self) -> &Mapper<Msg> {
        &self.mapper
    }

    #[inline]
    pub fn child(&self) -> &VNode<Msg> {
        &self.child
    }
}

impl<Msg> Lazy<Msg> {
    /// Pairwise reference equality of identity arguments.
    pub fn same_args(&self, other: &Self) -> bool {
        self.args.len() == other.args.len()
            && self
                .args
                .iter()
                .zip(&other.args)
                .all(|(a, b)| Rc::ptr_eq(a, b))
    }

    /// Cached result, running the thunk on first use.
    pub fn force(&self) -> VNode<Msg> {
        if let Some(node) = self.cached.borrow().as_ref() {
            return node.clone();
        }
        let node = (self.thunk)();
        crate::trace!(args = self.args.len(), "lazy thunk forced");
        *self.cached.borrow_mut() = Some(node.clone());
        node
    }

    /// Cached result without forcing.
    pub fn cached(&self) -> Option<VNode<Msg>> {
        self.cached.borrow().clone()
    }

    /// Take over a result computed for an earlier node with the same arguments.
    pub fn adopt(&self, node: VNode<Msg>) {
        *self.cached.borrow_mut() = Some(node);
    }

    #[inline]
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }
}

impl<Msg> fmt::Debug for VNode<Msg> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            Node::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Node::Element(e) => {
                let mut s = f.debug_struct("Element");
                if let Some(ns) = e.namespace() {
                    s.field("namespace", &ns);
                }
                s.field("tag", &e.tag)
                    .field("facts", &e.facts)
                    .field("children", &e.children)
                    .finish()
            }
            Node::Keyed(k) => {
                let mut s = f.debug_struct("Keyed");
                if let Some(ns) = k.namespace() {
                    s.field("namespace", &ns);
                }
                s.field("tag", &k.tag)
                    .field("facts", &k.facts)
                    .field("children", &k.children)
                    .finish()
            }
            Node::Custom(c) => f.debug_struct("Custom").field("facts", &c.facts).finish(),
            Node::Tagged(t) => f.debug_struct("Tagged").field("child", &t.child).finish(),
            Node::Lazy(l) => f
                .debug_struct("Lazy")
                .field("args", &l.args.len())
                .field("cached", &*l.cached.borrow())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    type N = VNode<()>;

    fn div(children: Vec<N>) -> N {
        N::element("div", [], children)
    }

    #[test]
    fn leaves_have_no_descendants() {
        assert_eq!(N::text("x").descendant_count(), 0);
        assert_eq!(N::lazy(vec![], || N::text("x")).descendant_count(), 0);
    }

    #[test]
    fn element_counts_whole_subtree() {
        let tree = div(vec![
            N::text("a"),
            div(vec![N::text("b"), N::text("c")]),
            N::text("d"),
        ]);
        // a, div, b, c, d
        assert_eq!(tree.descendant_count(), 5);
    }

    #[test]
    fn keyed_counts_like_unkeyed() {
        let keyed = N::keyed(
            "ul",
            [],
            vec![
                ("a".into(), div(vec![N::text("1")])),
                ("b".into(), N::text("2")),
            ],
        );
        assert_eq!(keyed.descendant_count(), 3);
    }

    #[test]
    fn tagger_occupies_one_slot() {
        let inner = div(vec![N::text("a")]);
        let tagged = inner.map(|m| m);
        assert_eq!(tagged.descendant_count(), 2);
        let parent = div(vec![tagged]);
        assert_eq!(parent.descendant_count(), 3);
    }

    #[test]
    fn lazy_runs_thunk_once() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let lazy = N::lazy(vec![], move || {
            counter.set(counter.get() + 1);
            N::text("cached")
        });
        let Node::Lazy(l) = lazy.node() else {
            panic!("expected lazy node");
        };
        assert!(l.cached().is_none());
        let first = l.force();
        let second = l.force();
        assert!(first.ptr_eq(&second));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn lazy_args_compare_by_reference() {
        let shared: Rc<dyn Any> = Rc::new(5_u32);
        let a = N::lazy(vec![Rc::clone(&shared)], || N::text("a"));
        let b = N::lazy(vec![Rc::clone(&shared)], || N::text("b"));
        let c = N::lazy(vec![Rc::new(5_u32) as Rc<dyn Any>], || N::text("c"));
        let (Node::Lazy(a), Node::Lazy(b), Node::Lazy(c)) = (a.node(), b.node(), c.node()) else {
            panic!("expected lazy nodes");
        };
        assert!(a.same_args(b));
        assert!(!a.same_args(c));
    }

    #[test]
    fn clone_shares_identity() {
        let a = N::text("x");
        let b = a.clone();
        let c = N::text("x");
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn debug_renders_structure() {
        let tree = div(vec![N::text("hi")]);
        let out = format!("{tree:?}");
        assert!(out.contains("Element"));
        assert!(out.contains("\"hi\""));
    }
}
