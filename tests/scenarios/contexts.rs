//! Test: Contexts are acquired before and released after their pipe

use crate::helpers::*;
use anyhow::{bail, Result};
use async_trait::async_trait;
use elastic_pipes::core::{Bindings, Context, Param, Pipe, PipeContext, PipeDecl, ValueKind};
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

static LOG: Mutex<Vec<String>> = Mutex::new(Vec::new());

fn log(line: String) {
    LOG.lock().unwrap().push(line);
}

/// Serializes the tests in this module, they share `LOG`
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    let guard = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
    LOG.lock().unwrap_or_else(PoisonError::into_inner).clear();
    guard
}

struct Session {
    host: String,
    requests: u32,
}

impl Context for Session {
    fn params() -> Vec<Param> {
        vec![Param::config("host", "session.host").kind(ValueKind::String).default("localhost")]
    }

    fn acquire(bindings: &Bindings) -> Result<Self> {
        let host: String = bindings.get("host")?;
        log(format!("connect {}", host));
        Ok(Self { host, requests: 0 })
    }

    fn release(&mut self) {
        log(format!("disconnect {} after {} requests", self.host, self.requests));
    }
}

struct Journal;

impl Context for Journal {
    fn acquire(_: &Bindings) -> Result<Self> {
        log("open journal".to_string());
        Ok(Self)
    }

    fn release(&mut self) {
        log("close journal".to_string());
    }
}

/// Uses a session and a journal, fails when `fail` is set
struct Fetch;

#[async_trait]
impl Pipe for Fetch {
    fn declare(&self) -> PipeDecl {
        PipeDecl::new("test.fetch")
            .param(Param::config("fail", "fail").kind(ValueKind::Boolean).default(false))
            .param(Param::state("fetched", "fetched").mutable().optional())
            .context::<Session>()
            .context::<Journal>()
    }

    async fn run(&self, ctx: &mut PipeContext<'_>) -> Result<()> {
        let fail: bool = ctx.config("fail")?;
        let session = ctx.context_mut::<Session>()?;
        session.requests += 1;
        let host = session.host.clone();
        if fail {
            bail!("{} is unreachable", host);
        }
        ctx.set_state("fetched", json!(host))
    }
}

fn options() -> RunOptions {
    RunOptions {
        extra: vec![Arc::new(Fetch)],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_contexts_released_in_reverse_order() {
    let _serial = serial();

    let yaml = r#"
pipes:
  - test.fetch:
      session:
        host: example.com
"#;
    let result = run_pipeline_with(yaml, options()).await;
    assert_pipeline_completed(&result);
    assert_eq!(result.get("fetched"), Some(&json!("example.com")));
    assert_eq!(
        *LOG.lock().unwrap(),
        vec![
            "connect example.com",
            "open journal",
            "close journal",
            "disconnect example.com after 1 requests",
        ]
    );
}

#[tokio::test]
async fn test_contexts_released_on_failure() {
    let _serial = serial();

    let yaml = r#"
pipes:
  - test.fetch:
      fail: true
"#;
    let result = run_pipeline_with(yaml, options()).await;
    assert_pipeline_failed(&result, "localhost is unreachable");
    assert_eq!(
        *LOG.lock().unwrap(),
        vec![
            "connect localhost",
            "open journal",
            "close journal",
            "disconnect localhost after 1 requests",
        ]
    );
}

/// Context parameters are bound like the pipe's own, before anything is acquired
#[tokio::test]
async fn test_context_params_are_bound() {
    let _serial = serial();

    let yaml = r#"
pipes:
  - test.fetch:
      session:
        host: 8080
"#;
    let result = run_pipeline_with(yaml, options()).await;
    assert_pipeline_failed(
        &result,
        "param 'host': config node 'session.host' type mismatch: 'int' (expected 'str')",
    );
    assert!(LOG.lock().unwrap().is_empty());
}
