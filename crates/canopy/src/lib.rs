#![forbid(unsafe_code)]

//! Canopy public facade crate.
//!
//! Re-exports the node model, the differ, the renderer and applier, and
//! (with the default `runtime` feature) the program loop, plus a prelude
//! for day-to-day use.
//!
//! # Usage
//!
//! ```
//! use canopy::prelude::*;
//!
//! let scope = EventScope::root(|_: ()| {});
//! let mut dom = HeadlessDom::<()>::new();
//! let old: VNode<()> = VNode::element("ul", [], vec![VNode::text("a")]);
//! let new: VNode<()> = VNode::element("ul", [], vec![VNode::text("a"), VNode::text("b")]);
//!
//! let root = mount(&mut dom, &old, &scope)?;
//! let patches = diff(&old, &new);
//! let root = apply_patches(&mut dom, root, &old, &patches, &scope)?;
//! assert_eq!(dom.to_markup(root), "<ul>ab</ul>");
//! # Ok::<(), canopy::Error>(())
//! ```

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use canopy_core::{
    CustomEvent, Dispatch, DispatchOutcome, Event, EventScope, Fact, FactKind, Facts, Handler,
    HandlerKind, Listener, Mapper, MapperChain, Node, NodeId, PropValue, Surface, SurfaceError,
    VNode, Widget,
};

// --- Diff re-exports -------------------------------------------------------

pub use canopy_diff::{
    DUPLICATE_KEY_SUFFIX, EntryState, FactChange, FactDiff, KeyedEntry, KeyedMove, KeyedReorder,
    Patch, PatchKind, count_patches, diff,
};

// --- Render re-exports -----------------------------------------------------

pub use canopy_render::{HeadlessDom, MutationStats, apply_patches, mount, render};

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "runtime")]
pub use canopy_runtime::{
    Cmd, MessageQueue, Model, Program, ProgramConfig, ProgramError, StepResult,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for canopy hosts.
#[derive(Debug)]
pub enum Error {
    /// A surface rejected an operation.
    Surface(SurfaceError),
    /// Program lifecycle failure.
    #[cfg(feature = "runtime")]
    Program(ProgramError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Surface(err) => write!(f, "{err}"),
            #[cfg(feature = "runtime")]
            Self::Program(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Surface(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Program(err) => Some(err),
        }
    }
}

impl From<SurfaceError> for Error {
    fn from(err: SurfaceError) -> Self {
        Self::Surface(err)
    }
}

#[cfg(feature = "runtime")]
impl From<ProgramError> for Error {
    fn from(err: ProgramError) -> Self {
        match err {
            ProgramError::Surface(err) => Self::Surface(err),
            other => Self::Program(other),
        }
    }
}

/// Standard result type for canopy APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Error, Event, EventScope, Fact, HeadlessDom, Handler, NodeId, Patch, PatchKind, Result,
        Surface, VNode, apply_patches, diff, mount,
    };
    #[cfg(feature = "runtime")]
    pub use crate::{Cmd, Model, Program, ProgramConfig};
    pub use crate::{core, diff_engine, render};
    #[cfg(feature = "runtime")]
    pub use crate::runtime;
}

pub use canopy_core as core;
pub use canopy_diff as diff_engine;
pub use canopy_render as render;
#[cfg(feature = "runtime")]
pub use canopy_runtime as runtime;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_surface_errors_flatten() {
        let err = Error::from(SurfaceError::UnknownNode(NodeId(7)));
        assert!(matches!(err, Error::Surface(_)));

        #[cfg(feature = "runtime")]
        {
            let err = Error::from(ProgramError::Surface(SurfaceError::UnknownNode(NodeId(7))));
            assert!(matches!(err, Error::Surface(_)));
            let err = Error::from(ProgramError::NotInitialized);
            assert_eq!(err.to_string(), "program has not been initialized");
        }
    }
}
