//! UNIX pipe mode
//!
//! A single pipe reads the state from standard input and writes the updated
//! state to standard output, so that pipes can be chained with `|` in a shell.

use crate::core::config::{get_pipes, PipeEntry};
use crate::core::error::PipesError;
use crate::core::format::{self, Format};
use crate::core::path::NodePath;
use crate::core::runtime::{configure_runtime, RuntimeOptions, RUNTIME};
use crate::core::state::State;
use crate::execution::engine::Runner;
use crate::pipes::logging::NAME as RUNNER_PIPE;
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::io::{Read, Write};
use tracing::debug;

/// Entries of the state's `pipes` list that shape how `name` runs
///
/// That is the entry of `name` itself plus the `elastic.pipes` one. Input
/// that is not a valid state yields none, `run_standalone` reports it.
pub fn entries_for(content: &str, name: &str) -> Vec<PipeEntry> {
    let Ok(value) = format::from_yaml_str(content) else {
        return Vec::new();
    };
    get_pipes(&value)
        .map(|pipes| {
            pipes
                .into_iter()
                .filter(|entry| entry.name == name || entry.name == RUNNER_PIPE)
                .collect()
        })
        .unwrap_or_default()
}

/// Run `runner`'s pipe `name` once, from `input` to `output`
///
/// The pipe config is taken from the entry of the same name in the state's
/// `pipes` list, if there is one. The `runtime` subtree is not written out.
pub async fn run_standalone<R: Read, W: Write>(
    runner: &Runner,
    name: &str,
    mut input: R,
    output: W,
    options: RuntimeOptions,
) -> Result<()> {
    let registered = runner
        .registry()
        .find(name)
        .ok_or_else(|| PipesError::config(format!("unknown pipe: {}", name)))?;

    let mut content = String::new();
    input
        .read_to_string(&mut content)
        .context("Failed to read state from stdin")?;

    let value = if content.trim().is_empty() {
        match &registered.decl.default_state {
            Some(state) => {
                debug!("no input, using the default state of '{}'", name);
                state.clone()
            }
            None => return Err(PipesError::config(format!("pipe '{}': no state on standard input", name)).into()),
        }
    } else {
        format::from_yaml_str(&content).map_err(|e| PipesError::config(format!("invalid state: {}", e)))?
    };
    let mut state = State::from_value(value)?;

    let config = get_pipes(state.tree())?
        .into_iter()
        .find(|entry| entry.name == name)
        .map(|entry| entry.config)
        .unwrap_or_else(|| Value::Object(Map::new()));

    configure_runtime(&mut state, &options.in_memory_state(false))?;

    let entry = PipeEntry {
        name: name.to_string(),
        config,
    };
    runner.run_pipe(&entry, &mut state).await?;

    state.remove(&NodePath::root().join(RUNTIME));
    let value = state.into_value()?;
    format::serialize(output, &value, Format::Json)
}
