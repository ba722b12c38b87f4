//! The `elastic.pipes.core.import` pipe: load data into the state

use crate::core::context::PipeContext;
use crate::core::error::PipesError;
use crate::core::format::{self, Format, NdjsonReader};
use crate::core::path::NodePath;
use crate::core::pipe::{Param, Pipe, PipeDecl, ValueKind};
use crate::core::runtime::{is_in_memory, RUNTIME};
use crate::core::state::DocumentStream;
use crate::pipes::describe_node;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader, IsTerminal, Read};
use std::path::Path;
use tracing::info;

pub const NAME: &str = "elastic.pipes.core.import";

pub struct ImportPipe;

fn open(file: Option<&str>) -> Result<Box<dyn BufRead + Send>> {
    match file {
        Some(name) => {
            let f = File::open(name).map_err(|e| PipesError::config(format!("{}: '{}'", e, name)))?;
            Ok(Box::new(BufReader::new(f)))
        }
        None => {
            let stdin = std::io::stdin();
            if stdin.is_terminal() {
                eprintln!("Press CTRL-D one time (or two, if you entered any input) to end");
            }
            Ok(Box::new(BufReader::new(stdin)))
        }
    }
}

#[async_trait]
impl Pipe for ImportPipe {
    fn declare(&self) -> PipeDecl {
        PipeDecl::new(NAME)
            .help("Import data into the state.")
            .notes("Reads standard input when no file is given.")
            .param(
                Param::config("file", "file")
                    .kind(ValueKind::String)
                    .optional()
                    .help("file to read from"),
            )
            .param(
                Param::config("format", "format")
                    .kind(ValueKind::String)
                    .optional()
                    .help("one among: yaml, json, ndjson (default: guessed from the file name)"),
            )
            .param(
                Param::state("node", "")
                    .mutable()
                    .optional()
                    .indirect("node")
                    .help("state node to import into (default: the whole state)"),
            )
            .param(
                Param::config("streaming", "streaming")
                    .kind(ValueKind::Boolean)
                    .default(false)
                    .help("import documents lazily, ndjson only"),
            )
            .param(
                Param::config("interactive", "interactive")
                    .kind(ValueKind::Boolean)
                    .default(false)
                    .help("allow reading from a terminal"),
            )
            .handles_dry_run()
    }

    async fn run(&self, ctx: &mut PipeContext<'_>) -> Result<()> {
        let file: Option<String> = ctx.config_opt("file")?;
        let explicit: Option<String> = ctx.config_opt("format")?;
        let streaming: bool = ctx.config("streaming")?;
        let interactive: bool = ctx.config("interactive")?;
        let node = ctx.state_path("node")?;

        let format = Format::resolve(explicit.as_deref(), file.as_deref().map(Path::new))?;
        if streaming {
            if format != Format::Ndjson {
                return Err(PipesError::config(format!("cannot stream {} (try ndjson)", format)).into());
            }
            if !is_in_memory(ctx.state()) {
                return Err(PipesError::config("cannot use streaming import in UNIX pipe mode").into());
            }
        }

        if ctx.is_dry_run() {
            return Ok(());
        }

        if file.is_none() && std::io::stdin().is_terminal() && !interactive {
            return Err(PipesError::config(format!(
                "To use `{}` interactively, set `interactive: true` in its configuration.",
                NAME
            ))
            .into());
        }

        let source = match &file {
            Some(name) => format!("'{}'", name),
            None => "standard input".to_string(),
        };
        info!("importing {} from {}...", describe_node(&node), source);

        let reader = open(file.as_deref())?;
        if streaming {
            let stream: DocumentStream = Box::new(NdjsonReader::new(reader));
            return ctx.set_state_stream("node", stream);
        }

        let value = read_value(reader, format)?;
        if node.is_root() {
            import_root(ctx, value)
        } else {
            ctx.set_state("node", value)
        }
    }
}

fn read_value<R: Read>(reader: R, format: Format) -> Result<Value> {
    let value = format::deserialize(reader, format).with_context(|| format!("Failed to import {}", format))?;
    Ok(match value {
        Value::Null => Value::Object(Map::new()),
        value => value,
    })
}

/// Replace the whole state, keeping `runtime`
fn import_root(ctx: &mut PipeContext<'_>, value: Value) -> Result<()> {
    let runtime_path = NodePath::root().join(RUNTIME);
    let runtime = ctx.state_mut().remove(&runtime_path);
    ctx.set_state("node", value)?;
    if let Some(runtime) = runtime {
        ctx.state_mut().set(&runtime_path, runtime)?;
    }
    Ok(())
}
