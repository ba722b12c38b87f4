//! Execution engine for running pipelines

pub mod engine;
pub mod registry;
pub mod unix_pipe;

pub use engine::{EventHandler, RunEvent, RunStatus, Runner};
pub use registry::{RegisteredPipe, Registry};
pub use unix_pipe::{entries_for, run_standalone};
