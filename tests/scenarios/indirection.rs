//! Test: `@` indirection from pipe configuration into the state

use crate::helpers::*;
use elastic_pipes::core::{FnPipe, Param, Pipe, PipeContext, PipeDecl, ValueKind};
use serde_json::{json, Value};
use std::sync::Arc;

/// `test.greet` writes "hello <name>" to `greeting`
fn greeter() -> Arc<dyn Pipe> {
    Arc::new(FnPipe::new(
        PipeDecl::new("test.greet")
            .param(Param::config("name", "name").kind(ValueKind::String).default("world"))
            .param(Param::state("greeting", "greeting").mutable().optional()),
        |ctx: &mut PipeContext<'_>| {
            let name: String = ctx.config("name")?;
            ctx.set_state("greeting", json!(format!("hello {}", name)))
        },
    ))
}

/// `test.double` writes twice its integer `count` to `doubled`
fn doubler() -> Arc<dyn Pipe> {
    Arc::new(FnPipe::new(
        PipeDecl::new("test.double")
            .param(Param::config("count", "count").kind(ValueKind::Integer))
            .param(Param::state("doubled", "doubled").mutable().optional()),
        |ctx: &mut PipeContext<'_>| {
            let count: i64 = ctx.config("count")?;
            ctx.set_state("doubled", json!(count * 2))
        },
    ))
}

fn with_pipes(arguments: &[&str], environment: &[(&str, &str)]) -> RunOptions {
    RunOptions {
        arguments: arguments.iter().map(|arg| arg.to_string()).collect(),
        environment: environment
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
        extra: vec![greeter(), doubler()],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_argument_indirection() {
    let yaml = r#"
pipes:
  - test.greet:
      name@: runtime.arguments.NAME
"#;
    let result = run_pipeline_with(yaml, with_pipes(&["NAME=me"], &[])).await;
    assert_pipeline_completed(&result);
    assert_eq!(result.get("greeting"), Some(&json!("hello me")));
}

#[tokio::test]
async fn test_environment_indirection() {
    let yaml = r#"
pipes:
  - test.greet:
      name@: runtime.environment.USER
"#;
    let result = run_pipeline_with(yaml, with_pipes(&[], &[("USER", "operator")])).await;
    assert_pipeline_completed(&result);
    assert_eq!(result.get("greeting"), Some(&json!("hello operator")));
}

/// Unset or empty arguments leave the default in effect
#[tokio::test]
async fn test_missing_argument_uses_default() {
    let yaml = r#"
pipes:
  - test.greet:
      name@: runtime.arguments.NAME
"#;
    let result = run_pipeline_with(yaml, with_pipes(&[], &[])).await;
    assert_pipeline_completed(&result);
    assert_eq!(result.get("greeting"), Some(&json!("hello world")));

    let result = run_pipeline_with(yaml, with_pipes(&["NAME="], &[])).await;
    assert_pipeline_completed(&result);
    assert_eq!(result.get("greeting"), Some(&json!("hello world")));
}

/// Arguments given on the command line override the pipeline's own
#[tokio::test]
async fn test_arguments_merge_over_file() {
    let yaml = r#"
runtime:
  arguments:
    NAME: file
    OTHER: kept
pipes:
  - test.greet:
      name@: runtime.arguments.NAME
"#;
    let result = run_pipeline_with(yaml, with_pipes(&["NAME=cli"], &[])).await;
    assert_pipeline_completed(&result);
    assert_eq!(result.get("greeting"), Some(&json!("hello cli")));
    assert_eq!(result.get("runtime.arguments.OTHER"), Some(&json!("kept")));
}

/// Runtime strings are coerced to the declared type, the state keeps the string
#[tokio::test]
async fn test_argument_coercion() {
    let yaml = r#"
pipes:
  - test.double:
      count@: runtime.arguments.COUNT
"#;
    let result = run_pipeline_with(yaml, with_pipes(&["COUNT=21"], &[])).await;
    assert_pipeline_completed(&result);
    assert_eq!(result.get("doubled"), Some(&json!(42)));
    assert_eq!(result.get("runtime.arguments.COUNT"), Some(&json!("21")));

    let result = run_pipeline_with(yaml, with_pipes(&["COUNT=many"], &[])).await;
    assert_pipeline_failed(
        &result,
        "param 'count': state node 'runtime.arguments.COUNT' type mismatch: 'str' (expected 'int')",
    );
}

/// Indirection reads the state as left by the previous pipes
#[tokio::test]
async fn test_indirection_sees_live_state() {
    let yaml = r#"
pipes:
  - test.greet:
      name: first
  - test.greet:
      name@: greeting
"#;
    let result = run_pipeline_with(yaml, with_pipes(&[], &[])).await;
    assert_pipeline_completed(&result);
    assert_eq!(result.get("greeting"), Some(&json!("hello hello first")));
}

#[tokio::test]
async fn test_runtime_is_not_indirectable() {
    let yaml = r#"
pipes:
  - test.greet:
      name@: runtime.base-dir
"#;
    let result = run_pipeline_with(yaml, with_pipes(&[], &[])).await;
    assert_pipeline_failed(&result, "state node 'runtime.base-dir' is not indirectable");
    assert!(result.get("greeting").map_or(true, Value::is_null));
}

/// Mutable state bindings cannot be redirected into `runtime`, not even its leaves
#[tokio::test]
async fn test_mutable_redirect_into_runtime() {
    let yaml = r#"
pipes:
  - elastic.pipes.core.import:
      file: unused.json
      node@: runtime.arguments.NAME
"#;
    let result = run_pipeline_with(yaml, with_pipes(&["NAME=me"], &[])).await;
    assert_pipeline_failed(&result, "state node 'runtime.arguments.NAME' is not indirectable");
    assert_eq!(result.get("runtime.arguments.NAME"), Some(&json!("me")));
}

#[tokio::test]
async fn test_direct_and_indirect_conflict() {
    let yaml = r#"
pipes:
  - test.greet:
      name: me
      name@: runtime.arguments.NAME
"#;
    let result = run_pipeline_with(yaml, with_pipes(&["NAME=you"], &[])).await;
    assert_pipeline_failed(&result, "is set both directly and with 'name@'");
}
