#![forbid(unsafe_code)]

//! Logging support.
//!
//! With the `tracing` feature, [`trace!`](crate::trace) is the `tracing`
//! macro. Without it the macro expands to nothing, so node forcing and
//! event dispatch pay nothing for their instrumentation.

#[cfg(feature = "tracing")]
pub use tracing::trace;

#[cfg(not(feature = "tracing"))]
mod noop_macros {
    /// No-op trace macro when tracing is disabled.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }
}
