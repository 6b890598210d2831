#![forbid(unsafe_code)]

//! Renderer: materializes a virtual node into real surface nodes.
//!
//! Used for the initial mount and whenever a patch needs fresh nodes
//! (`Replace`, appended children, inserted keyed children). Every listener
//! created here captures the event scope in effect at its position, never a
//! mapper directly.

use std::rc::Rc;

use canopy_core::{EventScope, Facts, Listener, MapperChain, Node, NodeId, Surface, SurfaceError, VNode};
use canopy_diff::{FactChange, FactDiff};

/// Render `vnode` and everything below it. The result is detached; the
/// caller attaches it.
pub fn render<Msg>(
    surface: &mut dyn Surface<Msg>,
    vnode: &VNode<Msg>,
    scope: &Rc<EventScope<Msg>>,
) -> Result<NodeId, SurfaceError> {
    match vnode.node() {
        Node::Text(text) => surface.create_text(text),
        Node::Tagged(_) => {
            let mut chain = MapperChain::new();
            let mut inner = vnode;
            while let Node::Tagged(t) = inner.node() {
                chain.push(Rc::clone(t.mapper()));
                inner = t.child();
            }
            let child_scope = EventScope::child(scope, chain);
            let node = render(surface, inner, &child_scope)?;
            // A run nested below a lazy node already stored its own, deeper
            // scope; the node keeps the innermost one.
            if surface.event_scope(node).is_none() {
                surface.set_event_scope(node, child_scope)?;
            }
            Ok(node)
        }
        Node::Lazy(lazy) => render(surface, &lazy.force(), scope),
        Node::Custom(custom) => {
            let node = custom.widget().render(custom.model(), surface)?;
            write_facts(surface, node, custom.facts(), scope)?;
            Ok(node)
        }
        Node::Element(element) => {
            let node = surface.create_element(element.namespace(), element.tag())?;
            write_facts(surface, node, element.facts(), scope)?;
            for kid in element.children() {
                let child = render(surface, kid, scope)?;
                surface.append_child(node, child)?;
            }
            Ok(node)
        }
        Node::Keyed(keyed) => {
            let node = surface.create_element(keyed.namespace(), keyed.tag())?;
            write_facts(surface, node, keyed.facts(), scope)?;
            for (_, kid) in keyed.children() {
                let child = render(surface, kid, scope)?;
                surface.append_child(node, child)?;
            }
            Ok(node)
        }
    }
}

/// Render a whole tree for mounting.
pub fn mount<Msg>(
    surface: &mut dyn Surface<Msg>,
    vnode: &VNode<Msg>,
    scope: &Rc<EventScope<Msg>>,
) -> Result<NodeId, SurfaceError> {
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("render", nodes = vnode.descendant_count() + 1).entered();

    render(surface, vnode, scope)
}

/// Write a complete fact table onto a freshly created node.
pub(crate) fn write_facts<Msg>(
    surface: &mut dyn Surface<Msg>,
    node: NodeId,
    facts: &Facts<Msg>,
    scope: &Rc<EventScope<Msg>>,
) -> Result<(), SurfaceError> {
    for (name, handler) in facts.events() {
        surface.add_listener(node, name, Listener::new(handler.clone(), Rc::clone(scope)))?;
    }
    for (name, value) in facts.styles() {
        surface.set_style(node, name, Some(value))?;
    }
    for (name, value) in facts.properties() {
        surface.set_property(node, name, Some(value))?;
    }
    for (name, value) in facts.attributes() {
        surface.set_attribute(node, name, value)?;
    }
    for (name, ns) in facts.attributes_ns() {
        surface.set_attribute_ns(node, &ns.namespace, name, &ns.value)?;
    }
    Ok(())
}

/// Apply only the changed keys of a fact diff.
///
/// A handler change that keeps its variant swaps the handler inside the
/// live listener. A variant change detaches the old listener and attaches a
/// new one.
pub(crate) fn apply_fact_diff<Msg>(
    surface: &mut dyn Surface<Msg>,
    node: NodeId,
    diff: &FactDiff<Msg>,
    scope: &Rc<EventScope<Msg>>,
) -> Result<(), SurfaceError> {
    for (key, change) in diff {
        let name = key.name.as_str();
        match change {
            FactChange::Event(Some(handler)) => {
                if let Some(listener) = surface.listener(node, name) {
                    if listener.handler_kind() == handler.kind() {
                        listener.swap_handler(handler.clone());
                        continue;
                    }
                    surface.remove_listener(node, name)?;
                }
                surface.add_listener(node, name, Listener::new(handler.clone(), Rc::clone(scope)))?;
            }
            FactChange::Event(None) => {
                if surface.listener(node, name).is_some() {
                    surface.remove_listener(node, name)?;
                }
            }
            FactChange::Style(value) => surface.set_style(node, name, value.as_deref())?,
            FactChange::Property(value) => surface.set_property(node, name, value.as_ref())?,
            FactChange::Attribute(Some(value)) => surface.set_attribute(node, name, value)?,
            FactChange::Attribute(None) => surface.remove_attribute(node, name)?,
            FactChange::AttributeNs {
                namespace,
                value: Some(value),
                replaces,
            } => {
                if let Some(old) = replaces {
                    surface.remove_attribute_ns(node, old, name)?;
                }
                surface.set_attribute_ns(node, namespace, name, value)?;
            }
            FactChange::AttributeNs {
                namespace,
                value: None,
                ..
            } => surface.remove_attribute_ns(node, namespace, name)?,
        }
    }
    Ok(())
}
