//! `@` indirection from configuration into the state
//!
//! A config entry `name@: some.state.path` binds `name` to the value found at
//! `some.state.path` at bind time. The `runtime` subtree may only be reached
//! through its `arguments` and `environment` leaves.

use crate::core::error::{NodeKind, PipesError};
use crate::core::path::{self, NodePath};
use crate::core::runtime::{ARGUMENTS, ENVIRONMENT, RUNTIME};
use crate::core::state::State;
use serde_json::Value;

pub const INDIRECT_SUFFIX: char = '@';

/// Whether a config key is an indirection marker
pub fn is_indirect(key: &str) -> bool {
    key.len() > 1 && key.ends_with(INDIRECT_SUFFIX)
}

/// The marker key for `key`
pub fn indirect_key(key: &str) -> String {
    format!("{}{}", key, INDIRECT_SUFFIX)
}

/// Where a bound config value was read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Config(NodePath),
    State(NodePath),
}

impl Origin {
    pub fn kind(&self) -> NodeKind {
        match self {
            Origin::Config(_) => NodeKind::Config,
            Origin::State(_) => NodeKind::State,
        }
    }

    pub fn path(&self) -> &NodePath {
        match self {
            Origin::Config(path) | Origin::State(path) => path,
        }
    }

    /// Values under `runtime.arguments` and `runtime.environment` are raw strings
    pub fn is_runtime_string(&self) -> bool {
        matches!(self, Origin::State(path) if is_runtime_leaf(path))
    }
}

/// A config value after indirection
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub value: Value,
    pub origin: Origin,
}

fn is_runtime_leaf(path: &NodePath) -> bool {
    let segments = path.segments();
    segments.len() >= 3
        && segments[0] == RUNTIME
        && (segments[1] == ARGUMENTS || segments[1] == ENVIRONMENT)
}

/// Reject targets inside `runtime` other than argument and environment leaves
pub fn check_target(target: &NodePath) -> Result<(), PipesError> {
    let under_runtime = target.segments().first().is_some_and(|s| s == RUNTIME);
    if under_runtime && !is_runtime_leaf(target) {
        return Err(PipesError::NotIndirectable(target.to_string()));
    }
    Ok(())
}

fn parse_target(key: &str, marker: &Value) -> Result<NodePath, PipesError> {
    let Value::String(target) = marker else {
        return Err(PipesError::config(format!(
            "config node '{}': indirection target must be a string, got '{}'",
            key,
            path::type_name(marker)
        )));
    };
    NodePath::parse(target)
}

fn lookup_target<'a>(state: &'a State, target: &NodePath) -> Result<&'a Value, PipesError> {
    if state.is_streamed(target) {
        return Err(PipesError::config(format!(
            "state node '{}' is a document stream and cannot be bound to configuration",
            target
        )));
    }
    let value = path::require(state.tree(), target, NodeKind::State)?;
    if is_runtime_leaf(target) && value.as_str() == Some("") {
        return Err(PipesError::MissingNode {
            kind: NodeKind::State,
            path: target.to_string(),
        });
    }
    Ok(value)
}

/// Resolve the config node at `path`, following `@` markers into the state
///
/// Returns `Ok(None)` when the config simply does not set the node. A marker
/// pointing at an absent state node is an error, so that callers can tell it
/// apart from an unset option.
pub fn resolve_config(config: &Value, path: &NodePath, state: &State) -> Result<Option<Resolved>, PipesError> {
    let mut node = config;
    let mut walked = NodePath::root();
    let mut state_origin: Option<NodePath> = None;

    for segment in path.segments() {
        walked = walked.join(segment);

        if let Some(target) = state_origin.as_mut() {
            // already inside a state value, markers are plain data here
            match node {
                Value::Object(map) => match map.get(segment) {
                    Some(next) => node = next,
                    None => return Ok(None),
                },
                _ => return Ok(None),
            }
            *target = target.join(segment);
            continue;
        }

        let Value::Object(map) = node else {
            return Ok(None);
        };
        let marker_key = indirect_key(segment);
        match (map.get(segment), map.get(&marker_key)) {
            (Some(_), Some(_)) => {
                return Err(PipesError::config(format!(
                    "config node '{}' is set both directly and with '{}'",
                    walked, marker_key
                )));
            }
            (Some(next), None) => node = next,
            (None, Some(marker)) => {
                let target = parse_target(&walked.to_string(), marker)?;
                check_target(&target)?;
                node = lookup_target(state, &target)?;
                state_origin = Some(target);
            }
            (None, None) => return Ok(None),
        }
    }

    if node.is_null() {
        return Ok(None);
    }
    let origin = match state_origin {
        Some(target) => Origin::State(target),
        None => Origin::Config(path.clone()),
    };
    Ok(Some(Resolved {
        value: node.clone(),
        origin,
    }))
}

/// Pick the state node of a redirectable state binding
///
/// `indirect` names the config key that may redirect the binding, e.g. a
/// pipe reading `documents` can be pointed elsewhere with `documents@: path`.
/// Mutable bindings are never allowed into `runtime`.
pub fn redirect_state(
    config: &Value,
    indirect: &str,
    default: &NodePath,
    mutable: bool,
) -> Result<NodePath, PipesError> {
    let marker_key = indirect_key(indirect);
    let Some(map) = config.as_object() else {
        return Ok(default.clone());
    };
    match (map.get(indirect), map.get(&marker_key)) {
        (Some(_), _) => Err(PipesError::config(format!(
            "config node '{}' selects a state node, set it with '{}'",
            indirect, marker_key
        ))),
        (None, Some(marker)) => {
            let target = parse_target(indirect, marker)?;
            let into_runtime = target.segments().first().is_some_and(|s| s == RUNTIME);
            if mutable && into_runtime {
                return Err(PipesError::NotIndirectable(target.to_string()));
            }
            check_target(&target)?;
            Ok(target)
        }
        (None, None) => Ok(default.clone()),
    }
}
