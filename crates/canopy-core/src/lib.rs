#![forbid(unsafe_code)]

//! Core vocabulary for the canopy virtual-tree engine: immutable nodes, fact
//! tables, event capture, and the capability set a real surface must offer.

pub mod event;
pub mod facts;
pub mod logging;
pub mod node;
pub mod surface;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::trace;

pub use event::{
    CustomEvent, DispatchOutcome, Event, EventScope, Handler, HandlerKind, Listener, Mapper,
    MapperChain,
};
pub use facts::{Fact, FactKind, Facts, NsValue, PropValue};
pub use node::{Custom, Element, KeyedElement, Lazy, Node, Tagged, VNode, Widget};
pub use surface::{Dispatch, NodeId, Surface, SurfaceError};
