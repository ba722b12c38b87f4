//! `new-pipe`: write the source of a new, standalone pipe

use crate::core::error::PipesError;
use crate::execution::registry::is_valid_name;
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

const TEMPLATE: &str = r#"use anyhow::Result;
use async_trait::async_trait;
use elastic_pipes::core::{Pipe, PipeContext, PipeDecl, RuntimeOptions};
use elastic_pipes::execution::{run_standalone, Registry, Runner};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub struct __STRUCT__;

#[async_trait]
impl Pipe for __STRUCT__ {
    fn declare(&self) -> PipeDecl {
        PipeDecl::new("__NAME__").default_state(json!({})).handles_dry_run()
    }

    async fn run(&self, _ctx: &mut PipeContext<'_>) -> Result<()> {
        info!("Hello, world!");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let mut registry = Registry::new();
    registry.register(__STRUCT__)?;
    let runner = Runner::new(Arc::new(registry));
    let options = RuntimeOptions::new().with_process_environment();
    run_standalone(&runner, "__NAME__", std::io::stdin(), std::io::stdout(), options).await
}
"#;

/// `my-pipe` -> `MyPipe`
fn struct_name(name: &str) -> String {
    let mut camel: String = name
        .split(|c: char| c == '_' || c == '-' || c == '.')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    if !camel.ends_with("Pipe") {
        camel.push_str("Pipe");
    }
    camel
}

/// Render the source of pipe `name`
pub fn render(name: &str) -> String {
    TEMPLATE
        .replace("__STRUCT__", &struct_name(name))
        .replace("__NAME__", name)
}

/// Create `path` (with a `.rs` extension) holding a new pipe named after
/// the file stem. Existing files are kept unless `force` is set.
pub fn new_pipe(path: &Path, force: bool) -> Result<PathBuf> {
    let path = path.with_extension("rs");
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| PipesError::config(format!("invalid pipe file: '{}'", path.display())))?;
    if !is_valid_name(name) {
        return Err(PipesError::config(format!("invalid pipe name: '{}'", name)).into());
    }

    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let mut file = options
        .open(&path)
        .map_err(|e| PipesError::config(format!("{}: '{}'", e, path.display())))?;
    file.write_all(render(name).as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
