//! Test: Rewriting document timestamps, in the state and while streaming

use crate::helpers::*;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

fn timestamp(doc: &Value) -> DateTime<Utc> {
    let raw = doc["@timestamp"].as_str().expect("rewritten timestamp is a string");
    assert!(raw.ends_with("+00:00"), "unexpected timestamp format: {}", raw);
    DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
}

/// `now-first` moves the first document to now and keeps the others' offsets
#[tokio::test]
async fn test_now_first_in_state() {
    let yaml = r#"
events:
  - {"@timestamp": "2020-01-01T00:00:00Z", "n": 1}
  - {"@timestamp": "2020-01-01T00:01:30Z", "n": 2}
  - {"@timestamp": "2020-01-01T00:00:10Z", "n": 3}
pipes:
  - elastic.pipes.core.timestamp-rewrite:
      documents@: events
      strategy-name: now-first
"#;
    let started = Utc::now();
    let result = run_pipeline(yaml).await;
    assert_pipeline_completed(&result);

    let docs = result.get("events").and_then(Value::as_array).expect("documents are back").clone();
    assert_eq!(docs.len(), 3);
    let first = timestamp(&docs[0]);
    assert!(first >= started - Duration::seconds(1));
    assert_eq!(timestamp(&docs[1]) - first, Duration::seconds(90));
    assert_eq!(timestamp(&docs[2]) - first, Duration::seconds(10));
    assert_eq!(docs[2]["n"], json!(3));
}

/// Imported streams are rewritten lazily on their way to the exporter
#[tokio::test]
async fn test_rewrite_stream() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(
        dir.path(),
        "events.ndjson",
        "{\"ts\": \"2020-01-01T00:00:00Z\"}\n{\"ts\": \"2020-01-01T00:00:05.250Z\"}\n",
    );
    let output = dir.path().join("rewritten.ndjson");

    let yaml = format!(
        r#"
pipes:
  - elastic.pipes.core.import:
      file: {input}
      node@: events
      streaming: true
  - elastic.pipes.core.timestamp-rewrite:
      documents@: events
      timestamp-field: ts
      strategy-name: now-first
  - elastic.pipes.core.export:
      file: {output}
      node@: events
"#,
        input = input,
        output = output.display()
    );
    let result = run_pipeline(&yaml).await;
    assert_pipeline_completed(&result);

    let lines: Vec<Value> = std::fs::read_to_string(&output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    let parse = |doc: &Value| DateTime::parse_from_rfc3339(doc["ts"].as_str().unwrap()).unwrap();
    assert_eq!(parse(&lines[1]) - parse(&lines[0]), Duration::milliseconds(5250));
}

#[tokio::test]
async fn test_unknown_strategy() {
    let yaml = r#"
events: []
pipes:
  - elastic.pipes.core.timestamp-rewrite:
      documents@: events
      strategy-name: yesterday
"#;
    let result = run_pipeline(yaml).await;
    assert_pipeline_failed(&result, "unknown strategy: yesterday (allowed strategies: now, now-first)");
}

#[tokio::test]
async fn test_strategies_take_no_params() {
    let yaml = r#"
events: []
pipes:
  - elastic.pipes.core.timestamp-rewrite:
      documents@: events
      strategy-params:
        offset: 10
"#;
    let result = run_pipeline(yaml).await;
    assert_pipeline_failed(&result, "does not take parameters: offset");
}
