//! Test: Import and export through files

use crate::helpers::*;
use serde_json::{json, Value};

/// Data imported from one format comes out unchanged in another
#[tokio::test]
async fn test_json_to_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "person.json", r#"{"name": "me", "tags": ["a", "b"], "age": 42}"#);
    let output = dir.path().join("person.yaml");

    let yaml = format!(
        r#"
pipes:
  - elastic.pipes.core.import:
      file: {input}
      node@: person
  - elastic.pipes.core.export:
      file: {output}
      node@: person
"#,
        input = input,
        output = output.display()
    );
    let result = run_pipeline(&yaml).await;
    assert_pipeline_completed(&result);
    assert_eq!(
        result.completed_pipes(),
        vec!["elastic.pipes.core.import", "elastic.pipes.core.export"]
    );

    let exported: Value = serde_yaml::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(exported, json!({"name": "me", "tags": ["a", "b"], "age": 42}));
    assert_eq!(result.get("person.age"), Some(&json!(42)));
}

fn documents() -> Value {
    json!([
        {"answer": "yes", "nothing": "null", "tilde": "~", "empty": "", "day": "2024-01-01"},
        {"when": "2024-01-01T10:00:00Z", "no": "no", "version": "1.10", "octal": "0755"},
        {"count": 3, "ratio": 0.5, "flag": true, "missing": null, "nested": {"list": [1, "2", null]}},
    ])
}

fn write_documents(path: &std::path::Path, docs: &Value, format: &str) {
    let content = match format {
        "json" => serde_json::to_string_pretty(docs).unwrap(),
        "ndjson" => docs
            .as_array()
            .unwrap()
            .iter()
            .map(|doc| serde_json::to_string(doc).unwrap() + "\n")
            .collect(),
        "yaml" => serde_yaml::to_string(docs).unwrap(),
        other => panic!("no writer for {}", other),
    };
    std::fs::write(path, content).unwrap();
}

fn read_documents(path: &std::path::Path, format: &str) -> Value {
    let content = std::fs::read_to_string(path).unwrap();
    match format {
        "json" => serde_json::from_str(&content).unwrap(),
        "ndjson" => Value::Array(
            content
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| serde_json::from_str(line).unwrap())
                .collect(),
        ),
        "yaml" => serde_yaml::from_str(&content).unwrap(),
        other => panic!("no reader for {}", other),
    }
}

/// Every pair of formats carries the same documents across, strings that
/// look like other scalars included
#[tokio::test]
async fn test_format_pairs_keep_documents() {
    let dir = tempfile::tempdir().unwrap();
    let formats = ["json", "ndjson", "yaml"];
    let docs = documents();

    let mut failures = Vec::new();
    for src in formats {
        for dst in formats {
            let input = dir.path().join(format!("in-{}-{}.{}", src, dst, src));
            let output = dir.path().join(format!("out-{}-{}.{}", src, dst, dst));
            write_documents(&input, &docs, src);

            let yaml = format!(
                r#"
pipes:
  - elastic.pipes.core.import:
      file: {input}
      node@: docs
  - elastic.pipes.core.export:
      file: {output}
      node@: docs
"#,
                input = input.display(),
                output = output.display()
            );
            let result = run_pipeline(&yaml).await;
            if let Some(error) = result.error() {
                failures.push(format!("{} -> {}: {}", src, dst, error));
                continue;
            }
            if result.get("docs") != Some(&docs) {
                failures.push(format!("{} -> {}: imported {:?}", src, dst, result.get("docs")));
            }
            let exported = read_documents(&output, dst);
            if exported != docs {
                failures.push(format!("{} -> {}: exported {}", src, dst, exported));
            }
        }
    }
    assert!(failures.is_empty(), "failures: {:#?}", failures);
}

/// Exporting the whole state leaves `runtime` out
#[tokio::test]
async fn test_export_whole_state() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("state.json");

    let yaml = format!(
        r#"
greeting: hello
pipes:
  - elastic.pipes.core.export:
      file: {output}
"#,
        output = output.display()
    );
    let result = run_pipeline(&yaml).await;
    assert_pipeline_completed(&result);

    let exported: Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(exported["greeting"], json!("hello"));
    assert!(exported.get("pipes").is_some());
    assert!(exported.get("runtime").is_none());
}

/// A format set in the config wins over the file extension
#[tokio::test]
async fn test_explicit_format() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "data.txt", "- 1\n- 2\n");
    let output = dir.path().join("data.out");

    let yaml = format!(
        r#"
pipes:
  - elastic.pipes.core.import:
      file: {input}
      format: yaml
      node@: numbers
  - elastic.pipes.core.export:
      file: {output}
      format: ndjson
      node@: numbers
"#,
        input = input,
        output = output.display()
    );
    let result = run_pipeline(&yaml).await;
    assert_pipeline_completed(&result);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "1\n2\n");
}

/// Streamed documents reach the exporter without ever landing in the state
#[tokio::test]
async fn test_streaming_ndjson() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "docs.ndjson", "{\"id\":1}\n{\"id\":2}\n{\"id\":3}\n");
    let output = dir.path().join("copy.ndjson");

    let yaml = format!(
        r#"
pipes:
  - elastic.pipes.core.import:
      file: {input}
      node@: docs
      streaming: true
  - elastic.pipes.core.export:
      file: {output}
      node@: docs
"#,
        input = input,
        output = output.display()
    );
    let result = run_pipeline(&yaml).await;
    assert_pipeline_completed(&result);
    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "{\"id\":1}\n{\"id\":2}\n{\"id\":3}\n"
    );
    assert!(result.get("docs").map_or(true, Value::is_null));
}

#[tokio::test]
async fn test_missing_input_file() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = format!(
        r#"
pipes:
  - elastic.pipes.core.import:
      file: {missing}
"#,
        missing = dir.path().join("missing.json").display()
    );
    let result = run_pipeline(&yaml).await;
    assert_pipeline_failed(&result, "missing.json'");
    assert_eq!(result.failed_pipes(), vec!["elastic.pipes.core.import"]);
}
