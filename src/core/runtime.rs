//! The reserved `runtime` subtree of the state

use crate::core::error::PipesError;
use crate::core::path::NodePath;
use crate::core::state::State;
use serde_json::{Map, Value};
use std::path::PathBuf;

pub const RUNTIME: &str = "runtime";
pub const ARGUMENTS: &str = "arguments";
pub const ENVIRONMENT: &str = "environment";
pub const BASE_DIR: &str = "base-dir";
pub const IN_MEMORY_STATE: &str = "in-memory-state";

/// Split `key=value` command-line arguments; a bare `key` has an empty value
pub fn parse_runtime_arguments<I, S>(args: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .map(|arg| match arg.as_ref().split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (arg.as_ref().to_string(), String::new()),
        })
        .collect()
}

/// What ends up under `runtime` before the first pipe runs
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    pub arguments: Vec<(String, String)>,
    pub environment: Vec<(String, String)>,
    pub base_dir: Option<PathBuf>,
    pub in_memory_state: bool,
}

impl RuntimeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_arguments<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.arguments = parse_runtime_arguments(args);
        self
    }

    pub fn with_environment<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.environment = vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    /// Take the environment of the current process
    pub fn with_process_environment(self) -> Self {
        self.with_environment(std::env::vars())
    }

    pub fn with_base_dir(mut self, base_dir: PathBuf) -> Self {
        self.base_dir = Some(base_dir);
        self
    }

    pub fn in_memory_state(mut self, in_memory: bool) -> Self {
        self.in_memory_state = in_memory;
        self
    }
}

/// Populate `runtime.*`
///
/// Arguments and environment variables are merged over whatever defaults the
/// pipeline file already put there. Empty values are skipped so that those
/// defaults stay in effect.
pub fn configure_runtime(state: &mut State, options: &RuntimeOptions) -> Result<(), PipesError> {
    let runtime_path = NodePath::root().join(RUNTIME);
    let runtime = state.setdefault(&runtime_path, Value::Object(Map::new()))?;
    let Some(runtime) = runtime.as_object_mut() else {
        return Err(PipesError::NotAMapping {
            kind: crate::core::error::NodeKind::State,
            path: RUNTIME.to_string(),
        });
    };

    merge_strings(runtime, ARGUMENTS, &options.arguments)?;
    merge_strings(runtime, ENVIRONMENT, &options.environment)?;

    if let Some(base_dir) = &options.base_dir {
        runtime.insert(
            BASE_DIR.to_string(),
            Value::String(base_dir.display().to_string()),
        );
    }
    runtime.insert(IN_MEMORY_STATE.to_string(), Value::Bool(options.in_memory_state));
    Ok(())
}

fn merge_strings(
    runtime: &mut Map<String, Value>,
    subtree: &str,
    entries: &[(String, String)],
) -> Result<(), PipesError> {
    let entries: Vec<_> = entries.iter().filter(|(_, value)| !value.is_empty()).collect();
    if entries.is_empty() {
        return Ok(());
    }
    let node = runtime
        .entry(subtree.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if node.is_null() {
        *node = Value::Object(Map::new());
    }
    let Some(map) = node.as_object_mut() else {
        return Err(PipesError::NotAMapping {
            kind: crate::core::error::NodeKind::State,
            path: format!("{}.{}", RUNTIME, subtree),
        });
    };
    for (key, value) in entries {
        map.insert(key.clone(), Value::String(value.clone()));
    }
    Ok(())
}

/// Whether the state lives in memory for the whole run
///
/// False in UNIX pipe mode, where the state has to be serialized between pipes.
pub fn is_in_memory(state: &State) -> bool {
    let path = NodePath::root().join(RUNTIME).join(IN_MEMORY_STATE);
    state.get(&path).and_then(Value::as_bool).unwrap_or(false)
}
