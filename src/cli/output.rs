//! CLI output formatting
//!
//! Run events go to stderr, so that stdout stays free for exported data.

use crate::core::pipe::{Binding, Param, PipeDecl};
use crate::execution::{RunEvent, RunStatus};
use console::Emoji;
use serde::Serialize;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

/// Format a run event for display
pub fn format_run_event(event: &RunEvent) -> String {
    match event {
        RunEvent::RunStarted { run_id, pipes, dry_run } => {
            let mode = if *dry_run { " (dry run)" } else { "" };
            format!(
                "{} Running {} pipes{} ({})",
                ROCKET,
                style(pipes).bold(),
                mode,
                style(&run_id.to_string()[..8]).dim()
            )
        }
        RunEvent::PipeStarted { name, .. } => format!("{} {}", SPINNER, style(name).cyan()),
        RunEvent::PipeSkipped { name } => {
            format!("{} {} {}", SKIP, style(name).dim(), style("(no dry run support)").dim())
        }
        RunEvent::PipeCompleted { name, elapsed } => format!(
            "{} {} {}",
            CHECK,
            style(name).green(),
            style(format_duration(*elapsed)).dim()
        ),
        RunEvent::PipeFailed { name, error } => {
            format!("{} {}: {}", CROSS, style(name).red(), style(error).dim())
        }
        RunEvent::RunFinished { run_id, status } => {
            let status_str = match status {
                RunStatus::Completed => format!("completed {}", style("successfully").green()),
                RunStatus::Failed => style("failed").red().to_string(),
            };
            format!(
                "{} Run ({}) {}",
                INFO,
                style(&run_id.to_string()[..8]).dim(),
                status_str
            )
        }
    }
}

/// A parameter, as shown by `list`
#[derive(Debug, Serialize)]
pub struct ParamInfo {
    pub name: String,
    pub binding: &'static str,
    pub node: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    pub required: bool,
    pub mutable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl From<&Param> for ParamInfo {
    fn from(param: &Param) -> Self {
        let (binding, mutable, node) = match &param.binding {
            Binding::Config { node } => ("config", false, node.clone()),
            Binding::State { node, mutable, .. } => ("state", *mutable, node.clone()),
        };
        Self {
            name: param.name.clone(),
            binding,
            node: if node.is_empty() { ".".to_string() } else { node },
            kind: param.kind.name(),
            default: param.default.clone(),
            required: param.is_required(),
            mutable,
            help: param.help.clone(),
        }
    }
}

/// A pipe, as shown by `list`
#[derive(Debug, Serialize)]
pub struct PipeInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub dry_run: bool,
    pub params: Vec<ParamInfo>,
}

impl From<&PipeDecl> for PipeInfo {
    fn from(decl: &PipeDecl) -> Self {
        Self {
            name: decl.name.clone(),
            help: decl.help.clone(),
            notes: decl.notes.clone(),
            dry_run: decl.dry_run,
            params: decl.all_params().map(ParamInfo::from).collect(),
        }
    }
}

/// Format a pipe description for display
pub fn format_pipe_info(info: &PipeInfo) -> String {
    let mut lines = vec![format!("{}", style(&info.name).bold())];
    if let Some(help) = &info.help {
        lines.push(format!("  {}", help));
    }
    if let Some(notes) = &info.notes {
        lines.push(format!("  {}", style(notes).dim()));
    }
    for param in &info.params {
        let mut line = format!(
            "    {} {} {} ({})",
            style(&param.name).cyan(),
            style(param.binding).dim(),
            param.node,
            param.kind
        );
        if let Some(default) = &param.default {
            line.push_str(&format!(" = {}", default));
        } else if param.required {
            line.push_str(&format!(" {}", style("required").yellow()));
        }
        if let Some(help) = &param.help {
            line.push_str(&format!(": {}", style(help).dim()));
        }
        lines.push(line);
    }
    lines.join("\n")
}
