//! Test utility functions for elastic-pipes

#![allow(dead_code)]

use elastic_pipes::core::runtime::configure_runtime;
use elastic_pipes::core::{NodePath, Pipe, PipeEntry, PipelineFile, RuntimeOptions, State};
use elastic_pipes::execution::{Registry, RunEvent, Runner};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Builtin pipes plus `extra`
pub fn registry_with(extra: Vec<Arc<dyn Pipe>>) -> Registry {
    let mut registry = Registry::with_builtins().expect("builtins should register");
    for pipe in extra {
        registry.register_arc(pipe).expect("test pipe should register");
    }
    registry
}

/// Result of a test run
pub struct PipelineTestResult {
    pub state: State,
    pub events: Vec<RunEvent>,
    pub result: anyhow::Result<()>,
}

impl PipelineTestResult {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn is_failed(&self) -> bool {
        self.result.is_err()
    }

    pub fn error(&self) -> Option<String> {
        self.result.as_ref().err().map(|e| e.to_string())
    }

    /// Value at a dotted state path
    pub fn get(&self, path: &str) -> Option<&Value> {
        let path = NodePath::parse(path).expect("valid path");
        self.state.get(&path)
    }

    /// Names of the pipes that ran to completion, in order
    pub fn completed_pipes(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RunEvent::PipeCompleted { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn skipped_pipes(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RunEvent::PipeSkipped { name } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn failed_pipes(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RunEvent::PipeFailed { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}

/// How a pipeline is run
#[derive(Default)]
pub struct RunOptions {
    pub arguments: Vec<String>,
    pub environment: Vec<(String, String)>,
    pub dry_run: bool,
    pub extra: Vec<Arc<dyn Pipe>>,
}

/// Run a pipeline the way `elastic-pipes run` does, minus the process environment
pub async fn run_pipeline_with(yaml: &str, options: RunOptions) -> PipelineTestResult {
    let file = PipelineFile::from_yaml(yaml, std::env::temp_dir()).expect("pipeline should parse");
    let mut state = State::from_value(file.state).expect("pipeline is a map");
    let runtime = RuntimeOptions::new()
        .with_arguments(&options.arguments)
        .with_environment(options.environment)
        .with_base_dir(file.base_dir)
        .in_memory_state(true);
    configure_runtime(&mut state, &runtime).expect("runtime should configure");

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let runner = Runner::new(Arc::new(registry_with(options.extra)))
        .dry_run(options.dry_run)
        .with_event_handler(move |event| sink.lock().unwrap().push(event));

    let result = runner.run(&mut state).await;
    let events = events.lock().unwrap().clone();
    PipelineTestResult { state, events, result }
}

pub async fn run_pipeline(yaml: &str) -> PipelineTestResult {
    run_pipeline_with(yaml, RunOptions::default()).await
}

/// Run the single `pipe` against `config` and `state`, outside of any pipeline
pub async fn run_one(pipe: Arc<dyn Pipe>, config: Value, state: Value) -> (anyhow::Result<()>, State) {
    let name = pipe.declare().name;
    let mut registry = Registry::new();
    registry.register_arc(pipe).expect("test pipe should register");

    let mut state = State::from_value(state).expect("state is a map");
    configure_runtime(&mut state, &RuntimeOptions::new().in_memory_state(true)).expect("runtime should configure");
    let entry = PipeEntry { name, config };
    let result = Runner::new(Arc::new(registry)).run_pipe(&entry, &mut state).await;
    (result, state)
}

/// Write `content` to `name` under `dir`, returning the full path
pub fn write_file(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("test file should be written");
    path.display().to_string()
}

pub fn assert_pipeline_completed(result: &PipelineTestResult) {
    assert!(
        result.is_success(),
        "Pipeline should complete, failed with: {}",
        result.error().unwrap_or_default()
    );
}

pub fn assert_pipeline_failed(result: &PipelineTestResult, message: &str) {
    let error = result.error().expect("Pipeline should fail");
    assert!(
        error.contains(message),
        "Pipeline error should contain '{}', got: {}",
        message,
        error
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_run_pipeline_empty_pipes() {
        let result = run_pipeline("pipes: []\ngreeting: hello\n").await;
        assert_pipeline_completed(&result);
        assert_eq!(result.get("greeting"), Some(&json!("hello")));
        assert!(result.completed_pipes().is_empty());
    }

    #[tokio::test]
    async fn test_run_one() {
        let pipe: Arc<dyn Pipe> = Arc::new(elastic_pipes::pipes::ExportPipe);
        let (result, state) = run_one(pipe, json!({"format": "csv"}), json!({"a": 1})).await;
        assert_eq!(result.unwrap_err().to_string(), "unsupported format: csv");
        assert_eq!(state.tree()["a"], json!(1));
    }

    #[tokio::test]
    async fn test_runtime_is_populated() {
        let options = RunOptions {
            arguments: vec!["NAME=me".to_string()],
            environment: vec![("HOME".to_string(), "/home/me".to_string())],
            ..Default::default()
        };
        let result = run_pipeline_with("pipes: []\n", options).await;
        assert_eq!(result.get("runtime.arguments.NAME"), Some(&json!("me")));
        assert_eq!(result.get("runtime.environment.HOME"), Some(&json!("/home/me")));
        assert_eq!(result.get("runtime.in-memory-state"), Some(&json!(true)));
    }
}
