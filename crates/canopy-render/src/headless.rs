#![forbid(unsafe_code)]

//! In-memory surface for tests and non-browser hosts.
//!
//! `HeadlessDom` is an arena of element and text nodes implementing the full
//! [`Surface`] capability set plus [`Dispatch`]. Nodes are never freed;
//! removed nodes are only detached, so stale handles stay readable.
//!
//! Every mutation is counted in [`MutationStats`], which lets tests assert
//! that a patch touched only what it had to.
//!
//! # Markup
//!
//! [`HeadlessDom::to_markup`] serializes a subtree deterministically:
//! attributes, then namespaced attributes as `{ns}name`, then properties as
//! `.name=value`, then a single `style` attribute, then listeners as
//! `@event`. Text is written raw.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::rc::Rc;

use canopy_core::{
    Dispatch, DispatchOutcome, Event, EventScope, Listener, NodeId, PropValue, Surface,
    SurfaceError,
};

/// Counts of surface mutations since creation or the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationStats {
    /// Nodes created.
    pub created: usize,
    /// Children detached from a parent.
    pub removed: usize,
    /// Children appended or inserted.
    pub inserted: usize,
    /// Children swapped in place.
    pub replaced: usize,
    pub text_writes: usize,
    /// Style, property, and attribute writes, including removals.
    pub fact_writes: usize,
    /// Listener attachments and detachments.
    pub listener_writes: usize,
}

impl MutationStats {
    /// Sum of all counters.
    pub fn total(&self) -> usize {
        self.created
            + self.removed
            + self.inserted
            + self.replaced
            + self.text_writes
            + self.fact_writes
            + self.listener_writes
    }
}

struct ElementData<Msg> {
    namespace: Option<String>,
    tag: String,
    attributes: BTreeMap<String, String>,
    attributes_ns: BTreeMap<(String, String), String>,
    styles: BTreeMap<String, String>,
    properties: BTreeMap<String, PropValue>,
    listeners: BTreeMap<String, Rc<Listener<Msg>>>,
    children: Vec<NodeId>,
}

enum NodeKind<Msg> {
    Text(String),
    Element(ElementData<Msg>),
}

struct NodeData<Msg> {
    parent: Option<NodeId>,
    scope: Option<Rc<EventScope<Msg>>>,
    kind: NodeKind<Msg>,
}

/// Arena-backed in-memory surface.
pub struct HeadlessDom<Msg> {
    nodes: Vec<NodeData<Msg>>,
    stats: MutationStats,
}

impl<Msg> Default for HeadlessDom<Msg> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Msg> HeadlessDom<Msg> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            stats: MutationStats::default(),
        }
    }

    #[inline]
    pub fn stats(&self) -> MutationStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = MutationStats::default();
    }

    /// Number of nodes ever created, attached or not.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn data(&self, node: NodeId) -> Result<&NodeData<Msg>, SurfaceError> {
        self.nodes
            .get(node.0 as usize)
            .ok_or(SurfaceError::UnknownNode(node))
    }

    fn data_mut(&mut self, node: NodeId) -> Result<&mut NodeData<Msg>, SurfaceError> {
        self.nodes
            .get_mut(node.0 as usize)
            .ok_or(SurfaceError::UnknownNode(node))
    }

    fn element(&self, node: NodeId) -> Result<&ElementData<Msg>, SurfaceError> {
        match &self.data(node)?.kind {
            NodeKind::Element(e) => Ok(e),
            NodeKind::Text(_) => Err(SurfaceError::NotAnElement(node)),
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Result<&mut ElementData<Msg>, SurfaceError> {
        match &mut self.data_mut(node)?.kind {
            NodeKind::Element(e) => Ok(e),
            NodeKind::Text(_) => Err(SurfaceError::NotAnElement(node)),
        }
    }

    fn push(&mut self, kind: NodeKind<Msg>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            parent: None,
            scope: None,
            kind,
        });
        self.stats.created += 1;
        id
    }

    /// Detach `child` from its current parent, if any. Not counted.
    fn detach(&mut self, child: NodeId) -> Result<(), SurfaceError> {
        if let Some(parent) = self.data(child)?.parent {
            self.element_mut(parent)?.children.retain(|&c| c != child);
            self.data_mut(child)?.parent = None;
        }
        Ok(())
    }

    // ── Read accessors ───────────────────────────────────────────────────

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).ok().map(|e| e.tag.as_str())
    }

    pub fn namespace(&self, node: NodeId) -> Option<&str> {
        self.element(node).ok().and_then(|e| e.namespace.as_deref())
    }

    /// Text content of a text node.
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.data(node).ok()?.kind {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element(_) => None,
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node).ok()?.attributes.get(name).map(String::as_str)
    }

    pub fn attribute_ns(&self, node: NodeId, namespace: &str, name: &str) -> Option<&str> {
        self.element(node)
            .ok()?
            .attributes_ns
            .get(&(namespace.to_owned(), name.to_owned()))
            .map(String::as_str)
    }

    pub fn style(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node).ok()?.styles.get(name).map(String::as_str)
    }

    pub fn property(&self, node: NodeId, name: &str) -> Option<&PropValue> {
        self.element(node).ok()?.properties.get(name)
    }

    /// Children of an element; empty for text and unknown nodes.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        match self.element(node) {
            Ok(e) => &e.children,
            Err(_) => &[],
        }
    }

    /// Serialize the subtree at `node`.
    pub fn to_markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_markup(node, &mut out);
        out
    }

    fn write_markup(&self, node: NodeId, out: &mut String) {
        let Ok(data) = self.data(node) else {
            let _ = write!(out, "<!--unknown {node}-->");
            return;
        };
        match &data.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element(e) => {
                let _ = write!(out, "<{}", e.tag);
                if let Some(ns) = &e.namespace {
                    let _ = write!(out, " xmlns=\"{ns}\"");
                }
                for (name, value) in &e.attributes {
                    let _ = write!(out, " {name}=\"{value}\"");
                }
                for ((ns, name), value) in &e.attributes_ns {
                    let _ = write!(out, " {{{ns}}}{name}=\"{value}\"");
                }
                for (name, value) in &e.properties {
                    let _ = write!(out, " .{name}={value}");
                }
                if !e.styles.is_empty() {
                    let styles: Vec<String> =
                        e.styles.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                    let _ = write!(out, " style=\"{}\"", styles.join("; "));
                }
                for name in e.listeners.keys() {
                    let _ = write!(out, " @{name}");
                }
                out.push('>');
                for &child in &e.children {
                    self.write_markup(child, out);
                }
                let _ = write!(out, "</{}>", e.tag);
            }
        }
    }
}

impl<Msg> Surface<Msg> for HeadlessDom<Msg> {
    fn create_element(
        &mut self,
        namespace: Option<&str>,
        tag: &str,
    ) -> Result<NodeId, SurfaceError> {
        Ok(self.push(NodeKind::Element(ElementData {
            namespace: namespace.map(str::to_owned),
            tag: tag.to_owned(),
            attributes: BTreeMap::new(),
            attributes_ns: BTreeMap::new(),
            styles: BTreeMap::new(),
            properties: BTreeMap::new(),
            listeners: BTreeMap::new(),
            children: Vec::new(),
        })))
    }

    fn create_text(&mut self, text: &str) -> Result<NodeId, SurfaceError> {
        Ok(self.push(NodeKind::Text(text.to_owned())))
    }

    fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), SurfaceError> {
        match &mut self.data_mut(node)?.kind {
            NodeKind::Text(current) => {
                text.clone_into(current);
            }
            NodeKind::Element(_) => return Err(SurfaceError::NotText(node)),
        }
        self.stats.text_writes += 1;
        Ok(())
    }

    fn set_style(
        &mut self,
        node: NodeId,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), SurfaceError> {
        let styles = &mut self.element_mut(node)?.styles;
        match value {
            Some(value) if !value.is_empty() => {
                styles.insert(name.to_owned(), value.to_owned());
            }
            _ => {
                styles.remove(name);
            }
        }
        self.stats.fact_writes += 1;
        Ok(())
    }

    fn set_property(
        &mut self,
        node: NodeId,
        name: &str,
        value: Option<&PropValue>,
    ) -> Result<(), SurfaceError> {
        let properties = &mut self.element_mut(node)?.properties;
        match value {
            Some(value) => {
                properties.insert(name.to_owned(), value.clone());
            }
            None => {
                properties.remove(name);
            }
        }
        self.stats.fact_writes += 1;
        Ok(())
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), SurfaceError> {
        self.element_mut(node)?
            .attributes
            .insert(name.to_owned(), value.to_owned());
        self.stats.fact_writes += 1;
        Ok(())
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), SurfaceError> {
        self.element_mut(node)?.attributes.remove(name);
        self.stats.fact_writes += 1;
        Ok(())
    }

    fn set_attribute_ns(
        &mut self,
        node: NodeId,
        namespace: &str,
        name: &str,
        value: &str,
    ) -> Result<(), SurfaceError> {
        self.element_mut(node)?
            .attributes_ns
            .insert((namespace.to_owned(), name.to_owned()), value.to_owned());
        self.stats.fact_writes += 1;
        Ok(())
    }

    fn remove_attribute_ns(
        &mut self,
        node: NodeId,
        namespace: &str,
        name: &str,
    ) -> Result<(), SurfaceError> {
        self.element_mut(node)?
            .attributes_ns
            .remove(&(namespace.to_owned(), name.to_owned()));
        self.stats.fact_writes += 1;
        Ok(())
    }

    fn listener(&self, node: NodeId, event: &str) -> Option<Rc<Listener<Msg>>> {
        self.element(node).ok()?.listeners.get(event).cloned()
    }

    fn add_listener(
        &mut self,
        node: NodeId,
        event: &str,
        listener: Rc<Listener<Msg>>,
    ) -> Result<(), SurfaceError> {
        self.element_mut(node)?
            .listeners
            .insert(event.to_owned(), listener);
        self.stats.listener_writes += 1;
        Ok(())
    }

    fn remove_listener(&mut self, node: NodeId, event: &str) -> Result<(), SurfaceError> {
        self.element_mut(node)?.listeners.remove(event);
        self.stats.listener_writes += 1;
        Ok(())
    }

    fn event_scope(&self, node: NodeId) -> Option<Rc<EventScope<Msg>>> {
        self.data(node).ok()?.scope.clone()
    }

    fn set_event_scope(
        &mut self,
        node: NodeId,
        scope: Rc<EventScope<Msg>>,
    ) -> Result<(), SurfaceError> {
        self.data_mut(node)?.scope = Some(scope);
        Ok(())
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.data(node).ok()?.parent
    }

    fn child_at(&self, parent: NodeId, index: usize) -> Option<NodeId> {
        self.element(parent).ok()?.children.get(index).copied()
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SurfaceError> {
        self.element(parent)?;
        self.detach(child)?;
        self.element_mut(parent)?.children.push(child);
        self.data_mut(child)?.parent = Some(parent);
        self.stats.inserted += 1;
        Ok(())
    }

    fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), SurfaceError> {
        self.element(parent)?;
        self.detach(child)?;
        let children = &mut self.element_mut(parent)?.children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.data_mut(child)?.parent = Some(parent);
        self.stats.inserted += 1;
        Ok(())
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SurfaceError> {
        let children = &mut self.element_mut(parent)?.children;
        let Some(pos) = children.iter().position(|&c| c == child) else {
            return Err(SurfaceError::NotAChild { parent, child });
        };
        children.remove(pos);
        self.data_mut(child)?.parent = None;
        self.stats.removed += 1;
        Ok(())
    }

    fn replace_child(
        &mut self,
        parent: NodeId,
        new: NodeId,
        old: NodeId,
    ) -> Result<(), SurfaceError> {
        if new == old {
            return Ok(());
        }
        self.detach(new)?;
        let children = &mut self.element_mut(parent)?.children;
        let Some(pos) = children.iter().position(|&c| c == old) else {
            return Err(SurfaceError::NotAChild { parent, child: old });
        };
        children[pos] = new;
        self.data_mut(old)?.parent = None;
        self.data_mut(new)?.parent = Some(parent);
        self.stats.replaced += 1;
        Ok(())
    }
}

impl<Msg> Dispatch for HeadlessDom<Msg> {
    /// Bubbles from `target` to the root. Only elements carry listeners.
    fn dispatch(&mut self, target: NodeId, event: &Event) -> Result<DispatchOutcome, SurfaceError> {
        self.data(target)?;
        let mut outcome = DispatchOutcome::empty();
        let mut current = Some(target);
        while let Some(node) = current {
            if let Some(listener) = self.listener(node, event.name()) {
                let flags = listener.handle(event);
                outcome |= flags;
                if flags.contains(DispatchOutcome::STOP_PROPAGATION) {
                    break;
                }
            }
            current = self.parent(node);
        }
        Ok(outcome)
    }
}
