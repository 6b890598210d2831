#![forbid(unsafe_code)]

//! Program loop for canopy: model, update, view, and a message queue that
//! serializes render cycles.

pub mod config;
pub mod program;
pub mod queue;

pub use config::ProgramConfig;
pub use program::{Cmd, Model, Program, ProgramError, StepResult};
pub use queue::MessageQueue;
