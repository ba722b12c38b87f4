//! User-facing error types
//!
//! Anything a user can cause through a pipeline file, a command-line flag or
//! the state fed to a pipe ends up as a [`PipesError`]. The CLI prints these
//! as plain messages; every other error is treated as an internal fault.

use std::fmt;
use thiserror::Error;

/// Which tree a node lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Config,
    State,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Config => write!(f, "config"),
            NodeKind::State => write!(f, "state"),
        }
    }
}

/// Error types for misconfiguration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipesError {
    #[error("{0}")]
    Config(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("{kind} node not found: '{path}'")]
    MissingNode { kind: NodeKind, path: String },

    #[error("{kind} node '{path}' type mismatch: '{found}' (expected '{expected}')")]
    TypeMismatch {
        kind: NodeKind,
        path: String,
        found: &'static str,
        expected: &'static str,
    },

    #[error("{kind} node '{path}' is not a mapping")]
    NotAMapping { kind: NodeKind, path: String },

    #[error("state node '{0}' is not indirectable")]
    NotIndirectable(String),

    #[error("param '{param}': {source}")]
    Param {
        param: String,
        source: Box<PipesError>,
    },
}

impl PipesError {
    pub fn config(message: impl Into<String>) -> Self {
        PipesError::Config(message.into())
    }

    /// Attach the name of the parameter being bound
    pub fn for_param(self, param: &str) -> Self {
        PipesError::Param {
            param: param.to_string(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping parameter wrappers
    pub fn root_cause(&self) -> &PipesError {
        match self {
            PipesError::Param { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
