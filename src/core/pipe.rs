//! Pipe declarations
//!
//! A pipe states up front which configuration and state nodes it needs.
//! The binder checks those declarations against the pipeline before the pipe
//! body ever runs.

use crate::core::context::{Context, ContextDecl, PipeContext};
use crate::core::error::PipesError;
use crate::core::path::{self, NodePath};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;

/// Expected type of a bound value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Any,
    String,
    Integer,
    Float,
    Boolean,
    Sequence,
    Mapping,
}

impl ValueKind {
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Any => "any",
            ValueKind::String => "str",
            ValueKind::Integer => "int",
            ValueKind::Float => "float",
            ValueKind::Boolean => "bool",
            ValueKind::Sequence => "list",
            ValueKind::Mapping => "dict",
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ValueKind::Any => true,
            ValueKind::String => value.is_string(),
            ValueKind::Integer => value.is_i64() || value.is_u64(),
            ValueKind::Float => value.is_number(),
            ValueKind::Boolean => value.is_boolean(),
            ValueKind::Sequence => value.is_array(),
            ValueKind::Mapping => value.is_object(),
        }
    }

    /// Convert a raw string (command-line argument, environment variable)
    ///
    /// Non-string kinds parse the text as a YAML scalar or flow collection.
    pub fn coerce(&self, raw: &str) -> Option<Value> {
        match self {
            ValueKind::Any | ValueKind::String => Some(Value::String(raw.to_string())),
            _ => serde_yaml::from_str::<Value>(raw)
                .ok()
                .filter(|value| self.accepts(value)),
        }
    }
}

/// How a parameter is bound
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// A node of the pipe's own configuration, possibly `@`-indirected
    Config { node: String },
    /// A node of the shared state
    State {
        node: String,
        mutable: bool,
        setdefault: bool,
        indirect: Option<String>,
    },
}

/// A declared parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub binding: Binding,
    pub kind: ValueKind,
    pub default: Option<Value>,
    pub optional: bool,
    pub help: Option<String>,
}

impl Param {
    fn new(name: &str, binding: Binding) -> Self {
        Self {
            name: name.to_string(),
            binding,
            kind: ValueKind::Any,
            default: None,
            optional: false,
            help: None,
        }
    }

    /// Bind `name` to the config node `node`
    pub fn config(name: &str, node: &str) -> Self {
        Self::new(
            name,
            Binding::Config {
                node: node.to_string(),
            },
        )
    }

    /// Bind `name` to the state node `node`, read-only
    pub fn state(name: &str, node: &str) -> Self {
        Self::new(
            name,
            Binding::State {
                node: node.to_string(),
                mutable: false,
                setdefault: false,
                indirect: None,
            },
        )
    }

    pub fn kind(mut self, kind: ValueKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Absent nodes are fine and leave the parameter unbound
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn help(mut self, text: &str) -> Self {
        self.help = Some(text.to_string());
        self
    }

    /// Allow the pipe to write the state node
    pub fn mutable(mut self) -> Self {
        if let Binding::State { mutable, .. } = &mut self.binding {
            *mutable = true;
        }
        self
    }

    /// Insert the default into the state when the node is absent
    pub fn setdefault(mut self) -> Self {
        if let Binding::State {
            mutable, setdefault, ..
        } = &mut self.binding
        {
            *mutable = true;
            *setdefault = true;
        }
        self
    }

    /// Let the config key `key@` redirect this state binding
    pub fn indirect(mut self, key: &str) -> Self {
        if let Binding::State { indirect, .. } = &mut self.binding {
            *indirect = Some(key.to_string());
        }
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none() && !self.optional
    }

    pub fn node(&self) -> &str {
        match &self.binding {
            Binding::Config { node } | Binding::State { node, .. } => node,
        }
    }

    fn validate(&self) -> Result<(), PipesError> {
        NodePath::parse(self.node())?;

        if let Some(default) = &self.default {
            if !self.kind.accepts(default) {
                return Err(PipesError::config(format!(
                    "default of type '{}' (expected '{}')",
                    path::type_name(default),
                    self.kind.name()
                )));
            }
        }

        if let Binding::State {
            mutable, setdefault, ..
        } = &self.binding
        {
            if *setdefault && self.default.is_none() {
                return Err(PipesError::config("setdefault needs a default value"));
            }
            let container = matches!(self.default, Some(Value::Array(_) | Value::Object(_)));
            if *mutable && container && !*setdefault {
                return Err(PipesError::config(
                    "mutable default not allowed, use setdefault to store it in the state",
                ));
            }
        }
        Ok(())
    }
}

/// Everything the runner needs to know about a pipe
#[derive(Debug, Clone)]
pub struct PipeDecl {
    pub name: String,
    pub help: Option<String>,
    pub notes: Option<String>,
    pub params: Vec<Param>,
    pub contexts: Vec<ContextDecl>,
    /// Whether the pipe runs (and skips side effects itself) on dry run
    pub dry_run: bool,
    /// State to use in UNIX pipe mode when standard input is empty
    pub default_state: Option<Value>,
}

impl PipeDecl {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            help: None,
            notes: None,
            params: Vec::new(),
            contexts: Vec::new(),
            dry_run: false,
            default_state: None,
        }
    }

    pub fn help(mut self, text: &str) -> Self {
        self.help = Some(text.to_string());
        self
    }

    pub fn notes(mut self, text: &str) -> Self {
        self.notes = Some(text.to_string());
        self
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Enter `C` around the pipe body
    pub fn context<C: Context>(mut self) -> Self {
        self.contexts.push(ContextDecl::of::<C>());
        self
    }

    pub fn handles_dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn default_state(mut self, state: Value) -> Self {
        self.default_state = Some(state);
        self
    }

    /// The pipe's own parameters followed by those of its contexts
    pub fn all_params(&self) -> impl Iterator<Item = &Param> {
        self.params
            .iter()
            .chain(self.contexts.iter().flat_map(|c| c.params.iter()))
    }

    /// Check the declaration itself, before any pipeline uses it
    pub fn validate(&self) -> Result<(), PipesError> {
        let mut seen = HashSet::new();
        for param in self.all_params() {
            if !seen.insert(param.name.as_str()) {
                return Err(PipesError::config(format!(
                    "pipe '{}': param '{}' is declared twice",
                    self.name, param.name
                )));
            }
            param.validate().map_err(|e| {
                PipesError::config(format!("pipe '{}': param '{}': {}", self.name, param.name, e))
            })?;
        }
        if let Some(state) = &self.default_state {
            if !state.is_object() {
                return Err(PipesError::config(format!(
                    "pipe '{}': default state is not a map",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// A processing step that can be named in a pipeline
#[async_trait]
pub trait Pipe: Send + Sync {
    /// Declare name, parameters and metadata
    fn declare(&self) -> PipeDecl;

    /// Run the pipe body against bound parameters
    async fn run(&self, ctx: &mut PipeContext<'_>) -> Result<()>;
}

/// A pipe made of a declaration and a plain function
pub struct FnPipe<F> {
    decl: PipeDecl,
    body: F,
}

impl<F> FnPipe<F>
where
    F: Fn(&mut PipeContext<'_>) -> Result<()> + Send + Sync,
{
    pub fn new(decl: PipeDecl, body: F) -> Self {
        Self { decl, body }
    }
}

#[async_trait]
impl<F> Pipe for FnPipe<F>
where
    F: Fn(&mut PipeContext<'_>) -> Result<()> + Send + Sync,
{
    fn declare(&self) -> PipeDecl {
        self.decl.clone()
    }

    async fn run(&self, ctx: &mut PipeContext<'_>) -> Result<()> {
        (self.body)(ctx)
    }
}
