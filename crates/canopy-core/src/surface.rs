#![forbid(unsafe_code)]

//! The capability set a real UI surface offers to the renderer and applier.
//!
//! Facts are opaque key/value pairs here: the surface receives style,
//! property, and attribute writes without the engine knowing any markup
//! vocabulary. Nodes are addressed by [`NodeId`] handles owned by the
//! surface.

use std::fmt;
use std::rc::Rc;

use crate::event::{DispatchOutcome, Event, EventScope, Listener};
use crate::facts::PropValue;

/// Handle to a node owned by a [`Surface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Failure reported by a surface operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The handle does not name a live node.
    UnknownNode(NodeId),
    /// The operation needs an element but the node is text.
    NotAnElement(NodeId),
    /// The operation needs a text node but the node is an element.
    NotText(NodeId),
    /// `child` is not a child of `parent`.
    NotAChild { parent: NodeId, child: NodeId },
    /// The parent has no child at `index`.
    ChildOutOfRange { parent: NodeId, index: usize },
    /// Backend-specific failure.
    Backend(String),
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNode(id) => write!(f, "unknown node {id}"),
            Self::NotAnElement(id) => write!(f, "node {id} is not an element"),
            Self::NotText(id) => write!(f, "node {id} is not a text node"),
            Self::NotAChild { parent, child } => {
                write!(f, "node {child} is not a child of {parent}")
            }
            Self::ChildOutOfRange { parent, index } => {
                write!(f, "node {parent} has no child at index {index}")
            }
            Self::Backend(msg) => write!(f, "surface backend: {msg}"),
        }
    }
}

impl std::error::Error for SurfaceError {}

/// Mutable real UI surface.
///
/// Reads (`parent`, `child_at`, `listener`, `event_scope`) are infallible and
/// return `None` for unknown handles; writes report a [`SurfaceError`].
pub trait Surface<Msg> {
    fn create_element(&mut self, namespace: Option<&str>, tag: &str)
    -> Result<NodeId, SurfaceError>;

    fn create_text(&mut self, text: &str) -> Result<NodeId, SurfaceError>;

    fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), SurfaceError>;

    /// Set a style, or revert it to the default with `None`.
    fn set_style(&mut self, node: NodeId, name: &str, value: Option<&str>)
    -> Result<(), SurfaceError>;

    /// Set a property, or clear it with `None`.
    fn set_property(
        &mut self,
        node: NodeId,
        name: &str,
        value: Option<&PropValue>,
    ) -> Result<(), SurfaceError>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str)
    -> Result<(), SurfaceError>;

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), SurfaceError>;

    fn set_attribute_ns(
        &mut self,
        node: NodeId,
        namespace: &str,
        name: &str,
        value: &str,
    ) -> Result<(), SurfaceError>;

    fn remove_attribute_ns(
        &mut self,
        node: NodeId,
        namespace: &str,
        name: &str,
    ) -> Result<(), SurfaceError>;

    /// Listener currently attached for `event`, if any.
    fn listener(&self, node: NodeId, event: &str) -> Option<Rc<Listener<Msg>>>;

    fn add_listener(
        &mut self,
        node: NodeId,
        event: &str,
        listener: Rc<Listener<Msg>>,
    ) -> Result<(), SurfaceError>;

    fn remove_listener(&mut self, node: NodeId, event: &str) -> Result<(), SurfaceError>;

    /// Tagger scope stored on the node by the renderer, if any.
    fn event_scope(&self, node: NodeId) -> Option<Rc<EventScope<Msg>>>;

    fn set_event_scope(
        &mut self,
        node: NodeId,
        scope: Rc<EventScope<Msg>>,
    ) -> Result<(), SurfaceError>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn child_at(&self, parent: NodeId, index: usize) -> Option<NodeId>;

    /// Append `child`, detaching it from any previous parent first.
    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SurfaceError>;

    /// Insert `child` before the child currently at `index`. An index at or
    /// past the end appends.
    fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), SurfaceError>;

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SurfaceError>;

    /// Put `new` where `old` is in `parent`'s child list.
    fn replace_child(
        &mut self,
        parent: NodeId,
        new: NodeId,
        old: NodeId,
    ) -> Result<(), SurfaceError>;
}

/// Surfaces that can route host events to attached listeners.
pub trait Dispatch {
    /// Deliver `event` at `target`, bubbling towards the root until a
    /// listener stops propagation.
    fn dispatch(&mut self, target: NodeId, event: &Event) -> Result<DispatchOutcome, SurfaceError>;
}
