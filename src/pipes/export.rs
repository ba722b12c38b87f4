//! The `elastic.pipes.core.export` pipe: write state data out

use crate::core::context::PipeContext;
use crate::core::error::PipesError;
use crate::core::format::{self, Format};
use crate::core::pipe::{Param, Pipe, PipeDecl, ValueKind};
use crate::core::runtime::RUNTIME;
use crate::core::state::Documents;
use crate::pipes::describe_node;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

pub const NAME: &str = "elastic.pipes.core.export";

pub struct ExportPipe;

fn create(file: Option<&str>) -> Result<Box<dyn Write>> {
    match file {
        Some(name) => {
            let f = File::create(name).map_err(|e| PipesError::config(format!("{}: '{}'", e, name)))?;
            Ok(Box::new(BufWriter::new(f)))
        }
        None => Ok(Box::new(std::io::stdout().lock())),
    }
}

#[async_trait]
impl Pipe for ExportPipe {
    fn declare(&self) -> PipeDecl {
        PipeDecl::new(NAME)
            .help("Export data from the state.")
            .notes("Writes to standard output when no file is given. Streamed documents are consumed.")
            .param(
                Param::config("file", "file")
                    .kind(ValueKind::String)
                    .optional()
                    .help("file to write to"),
            )
            .param(
                Param::config("format", "format")
                    .kind(ValueKind::String)
                    .optional()
                    .help("one among: yaml, json, ndjson (default: guessed from the file name)"),
            )
            .param(
                Param::state("node", "")
                    .optional()
                    .indirect("node")
                    .help("state node to export (default: the whole state)"),
            )
            .handles_dry_run()
    }

    async fn run(&self, ctx: &mut PipeContext<'_>) -> Result<()> {
        let file: Option<String> = ctx.config_opt("file")?;
        let explicit: Option<String> = ctx.config_opt("format")?;
        let node = ctx.state_path("node")?;
        let format = Format::resolve(explicit.as_deref(), file.as_deref().map(Path::new))?;

        if ctx.is_dry_run() {
            return Ok(());
        }

        let target = match &file {
            Some(name) => format!("'{}'", name),
            None => "standard output".to_string(),
        };
        info!("exporting {} to {}...", describe_node(&node), target);

        let writer = create(file.as_deref())?;
        let state = ctx.state_mut();
        if state.is_streamed(&node) {
            if let Some(Documents::Streaming(stream)) = state.take_documents(&node)? {
                let count = format::serialize_stream(writer, stream, format)?;
                info!("exported {} documents", count);
                return Ok(());
            }
        }

        state.materialize()?;
        let value = if node.is_root() {
            let mut value = state.tree().clone();
            if let Some(map) = value.as_object_mut() {
                map.remove(RUNTIME);
            }
            value
        } else {
            state.get(&node).cloned().unwrap_or(Value::Null)
        };
        format::serialize(writer, &value, format)
    }
}
