//! Pipeline configuration from YAML
//!
//! A pipeline file is the initial state. Its `pipes` list names the pipes to
//! run, each entry a single-key mapping from pipe name to pipe config.

use crate::core::error::PipesError;
use crate::core::format::from_yaml_str;
use crate::core::path::{self, NodePath};
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::Level;

pub const PIPES: &str = "pipes";

/// One entry of the `pipes` list
#[derive(Debug, Clone, PartialEq)]
pub struct PipeEntry {
    pub name: String,
    pub config: Value,
}

impl PipeEntry {
    /// Level set with `logging.level`, if any
    pub fn log_level(&self) -> Option<Level> {
        logging_level(&self.config).and_then(parse_level)
    }
}

/// Parse a log level name, case-insensitively
pub fn parse_level(name: &str) -> Option<Level> {
    match name.to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" | "critical" => Some(Level::ERROR),
        _ => None,
    }
}

fn logging_level(config: &Value) -> Option<&str> {
    let path = NodePath::root().join("logging").join("level");
    path::get(config, &path).and_then(Value::as_str)
}

/// Reject unknown `logging.level` values
pub fn validate_logging_config(name: &str, config: &Value) -> Result<(), PipesError> {
    let path = NodePath::root().join("logging").join("level");
    let Some(level) = path::get(config, &path) else {
        return Ok(());
    };
    let valid = level.as_str().and_then(parse_level).is_some();
    if !valid {
        let shown = match level {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(PipesError::config(format!(
            "invalid configuration: pipe '{}': field 'logging.level': value '{}'",
            name, shown
        )));
    }
    Ok(())
}

/// Extract and validate the `pipes` list of a state
pub fn get_pipes(state: &Value) -> Result<Vec<PipeEntry>, PipesError> {
    let Value::Object(map) = state else {
        return Err(PipesError::config(format!(
            "invalid state: not a map: {} ({})",
            state,
            path::type_name(state)
        )));
    };
    let pipes = match map.get(PIPES) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(pipes)) => pipes,
        Some(other) => {
            return Err(PipesError::config(format!(
                "invalid configuration: not a list: {} ({})",
                other,
                path::type_name(other)
            )));
        }
    };

    let mut entries = Vec::with_capacity(pipes.len());
    for pipe in pipes {
        let Value::Object(pipe) = pipe else {
            return Err(PipesError::config(format!(
                "invalid configuration: not a map: {} ({})",
                pipe,
                path::type_name(pipe)
            )));
        };
        if pipe.len() != 1 {
            let names: Vec<&str> = pipe.keys().map(String::as_str).collect();
            return Err(PipesError::config(format!(
                "invalid configuration: multiple pipe names: {}",
                names.join(", ")
            )));
        }
        let Some((name, config)) = pipe.iter().next() else {
            continue;
        };
        let config = match config {
            Value::Null => Value::Object(Map::new()),
            Value::Object(_) => config.clone(),
            other => {
                return Err(PipesError::config(format!(
                    "invalid configuration: pipe '{}': not a map: {} ({})",
                    name,
                    other,
                    path::type_name(other)
                )));
            }
        };
        validate_logging_config(name, &config)?;
        entries.push(PipeEntry {
            name: name.clone(),
            config,
        });
    }
    Ok(entries)
}

/// A loaded pipeline file
#[derive(Debug, Clone)]
pub struct PipelineFile {
    /// The whole document, `pipes` included
    pub state: Value,
    /// Directory of the file, or the working directory for stdin
    pub base_dir: PathBuf,
}

impl PipelineFile {
    /// Load a pipeline file; `-` reads standard input
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path == Path::new("-") {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("Failed to read pipeline from stdin")?;
            let base_dir = std::env::current_dir().context("Failed to get current directory")?;
            return Ok(Self::from_yaml(&content, base_dir)?);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| PipesError::config(format!("{}: '{}'", e, path.display())))?;
        let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
        let base_dir = match parent {
            Some(dir) => std::path::absolute(dir)
                .with_context(|| format!("Failed to resolve directory of {}", path.display()))?,
            None => std::env::current_dir().context("Failed to get current directory")?,
        };
        Ok(Self::from_yaml(&content, base_dir)?)
    }

    /// Parse a pipeline from YAML text
    pub fn from_yaml(yaml: &str, base_dir: PathBuf) -> Result<Self, PipesError> {
        let state = from_yaml_str(yaml).map_err(|e| PipesError::config(format!("invalid yaml: {}", e)))?;
        let state = match state {
            Value::Null => Value::Object(Map::new()),
            Value::Object(_) => state,
            other => {
                return Err(PipesError::config(format!(
                    "invalid state: not a map: {} ({})",
                    other,
                    path::type_name(&other)
                )))
            }
        };
        get_pipes(&state)?;
        Ok(Self { state, base_dir })
    }

    pub fn pipes(&self) -> Result<Vec<PipeEntry>, PipesError> {
        get_pipes(&self.state)
    }
}
