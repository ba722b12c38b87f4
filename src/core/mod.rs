//! Core domain models for Elastic Pipes
//!
//! This module defines the state tree, node paths, pipe declarations and
//! the binding of pipe parameters against configuration and state.

pub mod binding;
pub mod config;
pub mod context;
pub mod error;
pub mod format;
pub mod indirection;
pub mod path;
pub mod pipe;
pub mod runtime;
pub mod state;

pub use binding::{bind, Bindings};
pub use config::{PipeEntry, PipelineFile};
pub use context::{Context, PipeContext, Scope};
pub use error::{NodeKind, PipesError};
pub use format::Format;
pub use path::NodePath;
pub use pipe::{FnPipe, Param, Pipe, PipeDecl, ValueKind};
pub use runtime::RuntimeOptions;
pub use state::{DocumentStream, Documents, State};
