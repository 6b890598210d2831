#![forbid(unsafe_code)]

//! Materialization side of canopy.
//!
//! - [`render`] / [`mount`] turn a virtual tree into real surface nodes.
//! - [`apply_patches`] replays a patch list from `canopy-diff` onto the
//!   real tree the old virtual tree was rendered into.
//! - [`HeadlessDom`] is an in-memory surface with mutation counters, used by
//!   tests, benches, and hosts without a real display.

pub mod apply;
pub mod headless;
pub mod renderer;

pub use apply::apply_patches;
pub use headless::{HeadlessDom, MutationStats};
pub use renderer::{mount, render};
