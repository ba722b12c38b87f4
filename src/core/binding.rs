//! Parameter binding
//!
//! Resolves every declared parameter of a pipe against its configuration and
//! the current state. Binding happens before the pipe body runs, so a
//! misconfigured pipe fails without side effects.

use crate::core::error::{NodeKind, PipesError};
use crate::core::indirection::{redirect_state, resolve_config, Origin};
use crate::core::path::{self, NodePath};
use crate::core::pipe::{Binding, Param, PipeDecl, ValueKind};
use crate::core::state::State;
use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

/// A parameter bound to a state node
#[derive(Debug, Clone, PartialEq)]
pub struct StateBinding {
    pub path: NodePath,
    pub mutable: bool,
    pub default: Option<Value>,
}

/// The result of binding a pipe's parameters
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: HashMap<String, Value>,
    states: HashMap<String, StateBinding>,
}

impl Bindings {
    /// Bound config value of `param`, if any
    pub fn value(&self, param: &str) -> Option<&Value> {
        self.values.get(param)
    }

    pub fn value_mut(&mut self, param: &str) -> Option<&mut Value> {
        self.values.get_mut(param)
    }

    /// Deserialize the bound config value of `param`
    pub fn get<T: DeserializeOwned>(&self, param: &str) -> Result<T> {
        self.get_opt(param)?
            .ok_or_else(|| anyhow!("param '{}' is not bound", param))
    }

    pub fn get_opt<T: DeserializeOwned>(&self, param: &str) -> Result<Option<T>> {
        match self.values.get(param) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| anyhow!("param '{}': {}", param, e)),
        }
    }

    pub fn state(&self, param: &str) -> Option<&StateBinding> {
        self.states.get(param)
    }

    /// State node bound to `param`
    pub fn state_path(&self, param: &str) -> Result<&NodePath> {
        self.states
            .get(param)
            .map(|binding| &binding.path)
            .ok_or_else(|| anyhow!("param '{}' is not bound to the state", param))
    }

    pub fn insert_value(&mut self, param: &str, value: Value) {
        self.values.insert(param.to_string(), value);
    }

    fn insert_state(&mut self, param: &str, binding: StateBinding) {
        self.states.insert(param.to_string(), binding);
    }
}

/// Bind every parameter of `decl`
///
/// Only `setdefault` state bindings touch the state, by inserting their
/// default where the node is absent.
pub fn bind(decl: &PipeDecl, config: &Value, state: &mut State) -> Result<Bindings, PipesError> {
    let mut bindings = Bindings::default();
    for param in decl.all_params() {
        let bound = match &param.binding {
            Binding::Config { node } => bind_config(param, node, config, state, &mut bindings),
            Binding::State { .. } => bind_state(param, config, state, &mut bindings),
        };
        bound.map_err(|e| e.for_param(&param.name))?;
    }
    Ok(bindings)
}

fn bind_config(
    param: &Param,
    node: &str,
    config: &Value,
    state: &State,
    bindings: &mut Bindings,
) -> Result<(), PipesError> {
    let path = NodePath::parse(node)?;
    let resolved = match resolve_config(config, &path, state) {
        Ok(resolved) => resolved,
        // an indirection to a missing node falls back like an unset option
        Err(PipesError::MissingNode { .. }) if !param.is_required() => None,
        Err(e) => return Err(e),
    };

    let Some(resolved) = resolved else {
        if let Some(default) = &param.default {
            bindings.insert_value(&param.name, default.clone());
        } else if param.is_required() {
            return Err(PipesError::MissingNode {
                kind: NodeKind::Config,
                path: path.to_string(),
            });
        }
        return Ok(());
    };

    let value = check_kind(param.kind, resolved.value, &resolved.origin)?;
    bindings.insert_value(&param.name, value);
    Ok(())
}

fn check_kind(kind: ValueKind, value: Value, origin: &Origin) -> Result<Value, PipesError> {
    if kind.accepts(&value) {
        return Ok(value);
    }
    if origin.is_runtime_string() {
        if let Some(coerced) = value.as_str().and_then(|raw| kind.coerce(raw)) {
            return Ok(coerced);
        }
    }
    Err(PipesError::TypeMismatch {
        kind: origin.kind(),
        path: origin.path().to_string(),
        found: path::type_name(&value),
        expected: kind.name(),
    })
}

fn bind_state(
    param: &Param,
    config: &Value,
    state: &mut State,
    bindings: &mut Bindings,
) -> Result<(), PipesError> {
    let Binding::State {
        node,
        mutable,
        setdefault,
        indirect,
    } = &param.binding
    else {
        return Ok(());
    };

    let declared = NodePath::parse(node)?;
    let path = match indirect {
        Some(key) => redirect_state(config, key, &declared, *mutable)?,
        None => declared,
    };

    if state.is_streamed(&path) {
        if !matches!(param.kind, ValueKind::Any | ValueKind::Sequence) {
            return Err(PipesError::TypeMismatch {
                kind: NodeKind::State,
                path: path.to_string(),
                found: "stream",
                expected: param.kind.name(),
            });
        }
    } else if let Some(value) = state.get(&path) {
        if !param.kind.accepts(value) {
            return Err(PipesError::TypeMismatch {
                kind: NodeKind::State,
                path: path.to_string(),
                found: path::type_name(value),
                expected: param.kind.name(),
            });
        }
    } else if *setdefault {
        let default = param.default.clone().unwrap_or(Value::Null);
        state.setdefault(&path, default)?;
    } else if param.is_required() {
        return Err(PipesError::MissingNode {
            kind: NodeKind::State,
            path: path.to_string(),
        });
    }

    bindings.insert_state(
        &param.name,
        StateBinding {
            path,
            mutable: *mutable,
            default: param.default.clone(),
        },
    );
    Ok(())
}
