//! Built-in pipes

pub mod export;
pub mod import;
pub mod logging;
pub mod timestamp_rewrite;

use crate::core::pipe::Pipe;
use std::sync::Arc;

pub use export::ExportPipe;
pub use import::ImportPipe;
pub use logging::LoggingPipe;
pub use timestamp_rewrite::TimestampRewritePipe;

/// Every pipe shipped with the crate
pub fn builtins() -> Vec<Arc<dyn Pipe>> {
    vec![
        Arc::new(LoggingPipe),
        Arc::new(ImportPipe),
        Arc::new(ExportPipe),
        Arc::new(TimestampRewritePipe::new()),
    ]
}

/// How log lines refer to a state node
pub(crate) fn describe_node(path: &crate::core::path::NodePath) -> String {
    if path.is_root() {
        "everything".to_string()
    } else {
        format!("'{}'", path)
    }
}
