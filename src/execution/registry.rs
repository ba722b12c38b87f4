//! Named registration of pipes

use crate::core::error::PipesError;
use crate::core::pipe::{Pipe, PipeDecl};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*(\.[A-Za-z_][A-Za-z0-9_-]*)*$").expect("valid pipe name pattern")
    })
}

/// Whether `name` can be used as a pipe name
pub fn is_valid_name(name: &str) -> bool {
    name_pattern().is_match(name)
}

/// A pipe together with its declaration
#[derive(Clone)]
pub struct RegisteredPipe {
    pub decl: PipeDecl,
    pub pipe: Arc<dyn Pipe>,
}

/// All pipes known to a run, by name
#[derive(Clone, Default)]
pub struct Registry {
    pipes: BTreeMap<String, RegisteredPipe>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in pipes
    pub fn with_builtins() -> Result<Self, PipesError> {
        let mut registry = Self::new();
        for pipe in crate::pipes::builtins() {
            registry.register_arc(pipe)?;
        }
        Ok(registry)
    }

    pub fn register<P: Pipe + 'static>(&mut self, pipe: P) -> Result<(), PipesError> {
        self.register_arc(Arc::new(pipe))
    }

    pub fn register_arc(&mut self, pipe: Arc<dyn Pipe>) -> Result<(), PipesError> {
        let decl = pipe.declare();
        if !is_valid_name(&decl.name) {
            return Err(PipesError::config(format!("invalid pipe name: '{}'", decl.name)));
        }
        if self.pipes.contains_key(&decl.name) {
            return Err(PipesError::config(format!("pipe '{}' is already defined", decl.name)));
        }
        decl.validate()?;

        debug!("registered pipe '{}'", decl.name);
        self.pipes.insert(decl.name.clone(), RegisteredPipe { decl, pipe });
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&RegisteredPipe> {
        self.pipes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pipes.contains_key(name)
    }

    /// Registered pipes sorted by name
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredPipe> {
        self.pipes.values()
    }

    pub fn len(&self) -> usize {
        self.pipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }
}
