//! elastic-pipes - compose small processing pipes over a shared state

pub mod cli;
pub mod core;
pub mod execution;
pub mod pipes;

// Re-export commonly used types
pub use crate::core::{
    bind, Bindings, Context, FnPipe, NodePath, Param, Pipe, PipeContext, PipeDecl, PipesError, State, ValueKind,
};
pub use crate::execution::{run_standalone, RunEvent, Registry, Runner};
