#![forbid(unsafe_code)]

//! Event capture: handlers, listeners, and tagger scopes.
//!
//! A listener attached to a real node never captures the message mapping in
//! effect at attach time. It holds a reference to an [`EventScope`], and the
//! scope chain is walked at dispatch time. Retagging a subtree therefore only
//! swaps the mapper list inside an existing scope, and replacing a handler
//! of the same [`HandlerKind`] only swaps the handler inside the listener.
//!
//! # Dispatch
//!
//! 1. The listener decodes the [`Event`] with its current [`Handler`].
//! 2. Propagation flags requested by the handler are recorded.
//! 3. The message is mapped through every tagger of every enclosing scope,
//!    innermost scope first, and within one scope innermost mapper first.
//! 4. The root scope hands the final message to its sink.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use smallvec::SmallVec;

/// Message remapping function installed by a tagger node.
pub type Mapper<Msg> = Rc<dyn Fn(Msg) -> Msg>;

/// Mappers gathered from a run of directly nested tagger nodes, outermost first.
pub type MapperChain<Msg> = SmallVec<[Mapper<Msg>; 2]>;

/// An event raised by the real surface.
///
/// The payload is a flat string map so the engine stays independent of any
/// particular markup vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    name: String,
    fields: BTreeMap<String, String>,
}

impl Event {
    /// Create an event with no payload fields.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Attach a payload field.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Event name, e.g. `click` or `input`.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a payload field.
    pub fn field(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

bitflags! {
    /// What happened when an event reached a listener.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DispatchOutcome: u8 {
        /// A message was decoded and delivered.
        const DELIVERED = 1 << 0;
        /// The handler asked to stop propagation.
        const STOP_PROPAGATION = 1 << 1;
        /// The handler asked to prevent the default action.
        const PREVENT_DEFAULT = 1 << 2;
    }
}

/// Result of a [`Handler::Custom`] decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomEvent<Msg> {
    pub message: Msg,
    pub stop_propagation: bool,
    pub prevent_default: bool,
}

/// Discriminant of a [`Handler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HandlerKind {
    Normal,
    MayStopPropagation,
    MayPreventDefault,
    Custom,
}

/// Decoder from an [`Event`] to an optional message, plus propagation policy.
///
/// A decoder returning `None` means the event is ignored.
pub enum Handler<Msg> {
    Normal(Rc<dyn Fn(&Event) -> Option<Msg>>),
    /// The flag asks to stop propagation.
    MayStopPropagation(Rc<dyn Fn(&Event) -> Option<(Msg, bool)>>),
    /// The flag asks to prevent the default action.
    MayPreventDefault(Rc<dyn Fn(&Event) -> Option<(Msg, bool)>>),
    Custom(Rc<dyn Fn(&Event) -> Option<CustomEvent<Msg>>>),
}

impl<Msg> Clone for Handler<Msg> {
    fn clone(&self) -> Self {
        match self {
            Self::Normal(f) => Self::Normal(Rc::clone(f)),
            Self::MayStopPropagation(f) => Self::MayStopPropagation(Rc::clone(f)),
            Self::MayPreventDefault(f) => Self::MayPreventDefault(Rc::clone(f)),
            Self::Custom(f) => Self::Custom(Rc::clone(f)),
        }
    }
}

impl<Msg> fmt::Debug for Handler<Msg> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler::{:?}", self.kind())
    }
}

impl<Msg: 'static> Handler<Msg> {
    /// Handler that always produces `msg` (cloned per event).
    pub fn message(msg: Msg) -> Self
    where
        Msg: Clone,
    {
        Self::Normal(Rc::new(move |_| Some(msg.clone())))
    }

    /// Handler built from a plain decoder.
    pub fn normal(decode: impl Fn(&Event) -> Option<Msg> + 'static) -> Self {
        Self::Normal(Rc::new(decode))
    }
}

impl<Msg> Handler<Msg> {
    #[inline]
    pub fn kind(&self) -> HandlerKind {
        match self {
            Self::Normal(_) => HandlerKind::Normal,
            Self::MayStopPropagation(_) => HandlerKind::MayStopPropagation,
            Self::MayPreventDefault(_) => HandlerKind::MayPreventDefault,
            Self::Custom(_) => HandlerKind::Custom,
        }
    }

    /// Reference equality: same variant and same decoder allocation.
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Normal(a), Self::Normal(b)) => Rc::ptr_eq(a, b),
            (Self::MayStopPropagation(a), Self::MayStopPropagation(b)) => Rc::ptr_eq(a, b),
            (Self::MayPreventDefault(a), Self::MayPreventDefault(b)) => Rc::ptr_eq(a, b),
            (Self::Custom(a), Self::Custom(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Run the decoder, returning the message and the requested flags.
    pub fn decode(&self, event: &Event) -> Option<(Msg, DispatchOutcome)> {
        match self {
            Self::Normal(f) => f(event).map(|msg| (msg, DispatchOutcome::empty())),
            Self::MayStopPropagation(f) => f(event).map(|(msg, stop)| {
                let mut flags = DispatchOutcome::empty();
                flags.set(DispatchOutcome::STOP_PROPAGATION, stop);
                (msg, flags)
            }),
            Self::MayPreventDefault(f) => f(event).map(|(msg, prevent)| {
                let mut flags = DispatchOutcome::empty();
                flags.set(DispatchOutcome::PREVENT_DEFAULT, prevent);
                (msg, flags)
            }),
            Self::Custom(f) => f(event).map(|custom| {
                let mut flags = DispatchOutcome::empty();
                flags.set(DispatchOutcome::STOP_PROPAGATION, custom.stop_propagation);
                flags.set(DispatchOutcome::PREVENT_DEFAULT, custom.prevent_default);
                (custom.message, flags)
            }),
        }
    }
}

/// One link in the chain of tagger scopes between a real node and the root.
///
/// The root scope has no parent and owns the output sink.
pub struct EventScope<Msg> {
    taggers: RefCell<MapperChain<Msg>>,
    parent: Option<Rc<EventScope<Msg>>>,
    sink: Option<Rc<dyn Fn(Msg)>>,
}

impl<Msg> fmt::Debug for EventScope<Msg> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventScope")
            .field("taggers", &self.taggers.borrow().len())
            .field("depth", &self.depth())
            .finish()
    }
}

impl<Msg: 'static> EventScope<Msg> {
    /// Root scope delivering final messages to `sink`.
    pub fn root(sink: impl Fn(Msg) + 'static) -> Rc<Self> {
        Rc::new(Self {
            taggers: RefCell::new(MapperChain::new()),
            parent: None,
            sink: Some(Rc::new(sink)),
        })
    }
}

impl<Msg> EventScope<Msg> {
    /// Scope for the subtree below a run of tagger nodes.
    pub fn child(parent: &Rc<Self>, taggers: MapperChain<Msg>) -> Rc<Self> {
        Rc::new(Self {
            taggers: RefCell::new(taggers),
            parent: Some(Rc::clone(parent)),
            sink: None,
        })
    }

    /// Swap the mappers of this scope. Listeners below see the new mappers
    /// on their next dispatch.
    pub fn retag(&self, taggers: MapperChain<Msg>) {
        *self.taggers.borrow_mut() = taggers;
    }

    /// Link of this chain whose parent is `ancestor`, if `ancestor` is on
    /// the chain at all. A real node stores only its innermost scope; this
    /// recovers the scope of an enclosing tagger run.
    pub fn link_below(self: &Rc<Self>, ancestor: &Rc<Self>) -> Option<Rc<Self>> {
        let mut current = Rc::clone(self);
        loop {
            let parent = Rc::clone(current.parent.as_ref()?);
            if Rc::ptr_eq(&parent, ancestor) {
                return Some(current);
            }
            current = parent;
        }
    }

    /// Number of scopes above this one.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut scope = self;
        while let Some(parent) = &scope.parent {
            depth += 1;
            scope = parent;
        }
        depth
    }

    /// Map `msg` through the scope chain and hand it to the root sink.
    pub fn deliver(&self, msg: Msg) {
        let mut msg = msg;
        let mut scope = self;
        loop {
            // Clone the chain so a mapper may retag without a borrow conflict.
            let chain = scope.taggers.borrow().clone();
            for mapper in chain.iter().rev() {
                msg = mapper(msg);
            }
            match &scope.parent {
                Some(parent) => scope = parent,
                None => {
                    if let Some(sink) = &scope.sink {
                        sink(msg);
                    }
                    return;
                }
            }
        }
    }
}

/// A live listener attached to one real node for one event name.
pub struct Listener<Msg> {
    handler: RefCell<Handler<Msg>>,
    scope: Rc<EventScope<Msg>>,
}

impl<Msg> fmt::Debug for Listener<Msg> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("handler", &self.handler.borrow().kind())
            .field("scope", &self.scope)
            .finish()
    }
}

impl<Msg> Listener<Msg> {
    pub fn new(handler: Handler<Msg>, scope: Rc<EventScope<Msg>>) -> Rc<Self> {
        Rc::new(Self {
            handler: RefCell::new(handler),
            scope,
        })
    }

    pub fn handler_kind(&self) -> HandlerKind {
        self.handler.borrow().kind()
    }

    /// Replace the handler in place. The listener stays attached.
    pub fn swap_handler(&self, handler: Handler<Msg>) {
        *self.handler.borrow_mut() = handler;
    }

    /// Whether the current handler is `handler` by reference.
    pub fn holds(&self, handler: &Handler<Msg>) -> bool {
        self.handler.borrow().same(handler)
    }

    /// Decode `event` and deliver the resulting message through the scope chain.
    pub fn handle(&self, event: &Event) -> DispatchOutcome {
        let handler = self.handler.borrow().clone();
        match handler.decode(event) {
            Some((msg, flags)) => {
                self.scope.deliver(msg);
                flags | DispatchOutcome::DELIVERED
            }
            None => {
                crate::trace!(event = event.name(), "handler declined event");
                DispatchOutcome::empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[derive(Debug, Clone, PartialEq)]
    enum Msg {
        Clicked,
        Typed(String),
        Wrapped(Box<Msg>),
        Counted(Box<Msg>),
    }

    fn capture() -> (Rc<EventScope<Msg>>, Rc<RefCell<Vec<Msg>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let root = EventScope::root(move |msg| sink.borrow_mut().push(msg));
        (root, seen)
    }

    fn wrap() -> Mapper<Msg> {
        Rc::new(|m| Msg::Wrapped(Box::new(m)))
    }

    fn count() -> Mapper<Msg> {
        Rc::new(|m| Msg::Counted(Box::new(m)))
    }

    #[test]
    fn root_listener_delivers_unmapped() {
        let (root, seen) = capture();
        let listener = Listener::new(Handler::message(Msg::Clicked), root);
        let outcome = listener.handle(&Event::new("click"));
        assert_eq!(outcome, DispatchOutcome::DELIVERED);
        assert_eq!(*seen.borrow(), vec![Msg::Clicked]);
    }

    #[test]
    fn decoder_reads_payload() {
        let (root, seen) = capture();
        let handler =
            Handler::normal(|event: &Event| event.field("value").map(|v| Msg::Typed(v.into())));
        let listener = Listener::new(handler, root);
        assert!(listener.handle(&Event::new("input")).is_empty());
        listener.handle(&Event::new("input").with("value", "hi"));
        assert_eq!(*seen.borrow(), vec![Msg::Typed("hi".into())]);
    }

    #[test]
    fn mappers_apply_innermost_first() {
        let (root, seen) = capture();
        // Outer scope counts, inner scope holds [wrap (outer), count (inner)].
        let outer = EventScope::child(&root, smallvec![count()]);
        let inner = EventScope::child(&outer, smallvec![wrap(), count()]);
        inner.deliver(Msg::Clicked);
        let expected = Msg::Counted(Box::new(Msg::Wrapped(Box::new(Msg::Counted(Box::new(
            Msg::Clicked,
        ))))));
        assert_eq!(*seen.borrow(), vec![expected]);
        assert_eq!(inner.depth(), 2);
    }

    #[test]
    fn link_below_walks_to_the_enclosing_run() {
        let (root, _seen) = capture();
        let outer = EventScope::child(&root, smallvec![count()]);
        let inner = EventScope::child(&outer, smallvec![wrap()]);

        let found = inner.link_below(&root).expect("outer is below root");
        assert!(Rc::ptr_eq(&found, &outer));
        let found = inner.link_below(&outer).expect("inner is below outer");
        assert!(Rc::ptr_eq(&found, &inner));
        assert!(inner.link_below(&inner).is_none());

        let (other_root, _) = capture();
        assert!(inner.link_below(&other_root).is_none());
    }

    #[test]
    fn retag_is_seen_by_existing_listener() {
        let (root, seen) = capture();
        let scope = EventScope::child(&root, smallvec![wrap()]);
        let listener = Listener::new(Handler::message(Msg::Clicked), Rc::clone(&scope));
        scope.retag(smallvec![count()]);
        listener.handle(&Event::new("click"));
        assert_eq!(
            *seen.borrow(),
            vec![Msg::Counted(Box::new(Msg::Clicked))]
        );
    }

    #[test]
    fn swap_handler_keeps_listener() {
        let (root, seen) = capture();
        let listener = Listener::new(Handler::message(Msg::Clicked), root);
        let next = Handler::message(Msg::Typed("x".into()));
        listener.swap_handler(next.clone());
        assert!(listener.holds(&next));
        listener.handle(&Event::new("click"));
        assert_eq!(*seen.borrow(), vec![Msg::Typed("x".into())]);
    }

    #[test]
    fn custom_handler_reports_flags() {
        let (root, _seen) = capture();
        let handler = Handler::Custom(Rc::new(|_: &Event| {
            Some(CustomEvent {
                message: Msg::Clicked,
                stop_propagation: true,
                prevent_default: true,
            })
        }));
        let listener = Listener::new(handler, root);
        let outcome = listener.handle(&Event::new("submit"));
        assert!(outcome.contains(DispatchOutcome::DELIVERED));
        assert!(outcome.contains(DispatchOutcome::STOP_PROPAGATION));
        assert!(outcome.contains(DispatchOutcome::PREVENT_DEFAULT));
    }

    #[test]
    fn handler_sameness_is_by_reference() {
        let a: Handler<Msg> = Handler::message(Msg::Clicked);
        let b: Handler<Msg> = Handler::message(Msg::Clicked);
        assert!(a.same(&a.clone()));
        assert!(!a.same(&b));
        assert_eq!(a.kind(), HandlerKind::Normal);
    }
}
