//! The `elastic.pipes` pipe
//!
//! Its `logging.level` becomes the default level of every other pipe. The
//! level is picked up when the log subscriber is set up, before the run, so
//! the position of the entry in `pipes` makes no difference.

use crate::core::context::PipeContext;
use crate::core::pipe::{Param, Pipe, PipeDecl, ValueKind};
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

pub const NAME: &str = "elastic.pipes";

pub struct LoggingPipe;

#[async_trait]
impl Pipe for LoggingPipe {
    fn declare(&self) -> PipeDecl {
        PipeDecl::new(NAME)
            .help("Configure the Elastic Pipes runner.")
            .notes(
                "`logging.level` sets the default log level of all the pipes for the whole run, \
                 wherever this entry appears in `pipes`. Pipes with their own `logging.level` keep it.",
            )
            .param(
                Param::config("level", "logging.level")
                    .kind(ValueKind::String)
                    .optional()
                    .help("one among: trace, debug, info, warning, error, critical"),
            )
            .handles_dry_run()
    }

    async fn run(&self, ctx: &mut PipeContext<'_>) -> Result<()> {
        if let Some(level) = ctx.config_opt::<String>("level")? {
            debug!("default log level is '{}'", level);
        }
        Ok(())
    }
}
