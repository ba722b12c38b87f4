//! The `elastic.pipes.core.timestamp-rewrite` pipe
//!
//! Rewrites the timestamp field of documents according to a strategy:
//!
//! - `now`: every document gets the time of its rewrite
//! - `now-first`: the first document gets the time of the rewrite, the others
//!   keep their distance from the first
//!
//! Streamed documents are rewritten lazily, as they are consumed.

use crate::core::binding::Bindings;
use crate::core::context::{Context, PipeContext};
use crate::core::error::PipesError;
use crate::core::pipe::{Param, Pipe, PipeDecl, ValueKind};
use crate::core::state::Documents;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

pub const NAME: &str = "elastic.pipes.core.timestamp-rewrite";

/// Source of the current time
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Rewrite strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Now,
    NowFirst,
}

impl Strategy {
    pub const ALL: [Strategy; 2] = [Strategy::Now, Strategy::NowFirst];

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Now => "now",
            Strategy::NowFirst => "now-first",
        }
    }

    fn allowed() -> String {
        Self::ALL.iter().map(Strategy::name).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = PipesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.name() == s)
            .ok_or_else(|| {
                PipesError::config(format!(
                    "unknown strategy: {} (allowed strategies: {})",
                    s,
                    Self::allowed()
                ))
            })
    }
}

/// Parse a document timestamp
///
/// Accepts RFC 3339 and ISO 8601 without offset, the latter taken as UTC.
pub fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>> {
    let Some(text) = value.as_str() else {
        bail!("not a string: {}", value);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, pattern) {
            return Ok(ts.and_utc());
        }
    }
    bail!("invalid timestamp: '{}'", text)
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, false)
}

/// Applies a strategy to one document after the other
pub struct Rewriter {
    field: String,
    strategy: Strategy,
    clock: Clock,
    start: DateTime<Utc>,
    first: Option<DateTime<Utc>>,
}

impl Rewriter {
    pub fn new(field: &str, strategy: Strategy, clock: Clock) -> Self {
        let start = clock();
        Self {
            field: field.to_string(),
            strategy,
            clock,
            start,
            first: None,
        }
    }

    fn timestamp(&mut self, ts: DateTime<Utc>) -> DateTime<Utc> {
        match self.strategy {
            Strategy::Now => (self.clock)(),
            Strategy::NowFirst => {
                let first = *self.first.get_or_insert(ts);
                self.start + (ts - first)
            }
        }
    }

    pub fn rewrite(&mut self, doc: Value) -> Result<Value> {
        let Value::Object(mut doc) = doc else {
            bail!("document is not a map: {}", doc);
        };
        let ts = match doc.get(&self.field) {
            Some(value) => parse_timestamp(value).map_err(|e| anyhow!("'{}' parse error: {}", self.field, e))?,
            None => (self.clock)(),
        };
        let rewritten = self.timestamp(ts);
        doc.insert(self.field.clone(), Value::String(format_timestamp(&rewritten)));
        Ok(Value::Object(doc))
    }
}

/// Bound configuration of the pipe
pub struct RewriteCtx {
    pub field: String,
    pub strategy: Strategy,
}

impl Context for RewriteCtx {
    fn params() -> Vec<Param> {
        vec![
            Param::state("documents", "documents")
                .mutable()
                .optional()
                .indirect("documents")
                .help("documents to rewrite, a list or a stream"),
            Param::config("timestamp-field", "timestamp-field")
                .kind(ValueKind::String)
                .default("@timestamp")
                .help("name of the timestamp field to be rewritten"),
            Param::config("strategy-name", "strategy-name")
                .kind(ValueKind::String)
                .default(Strategy::Now.name())
                .help("one among: now, now-first"),
            Param::config("strategy-params", "strategy-params")
                .kind(ValueKind::Mapping)
                .optional()
                .help("strategy specific parameters"),
        ]
    }

    fn acquire(bindings: &Bindings) -> Result<Self> {
        let field: String = bindings.get("timestamp-field")?;
        let name: String = bindings.get("strategy-name")?;
        let strategy: Strategy = name.parse()?;

        let params: Map<String, Value> = bindings.get_opt("strategy-params")?.unwrap_or_default();
        if !params.is_empty() {
            let names: Vec<&str> = params.keys().map(String::as_str).collect();
            return Err(PipesError::config(format!(
                "strategy '{}' does not take parameters: {}",
                strategy,
                names.join(", ")
            ))
            .into());
        }
        Ok(Self { field, strategy })
    }
}

pub struct TimestampRewritePipe {
    clock: Clock,
}

impl TimestampRewritePipe {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(Utc::now))
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self { clock }
    }
}

impl Default for TimestampRewritePipe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Pipe for TimestampRewritePipe {
    fn declare(&self) -> PipeDecl {
        PipeDecl::new(NAME)
            .help("Rewrite the timestamp of the input documents according to some strategy.")
            .context::<RewriteCtx>()
            .default_state(json!({}))
    }

    async fn run(&self, ctx: &mut PipeContext<'_>) -> Result<()> {
        let (field, strategy) = {
            let rewrite = ctx.context::<RewriteCtx>()?;
            (rewrite.field.clone(), rewrite.strategy)
        };
        let Some(docs) = ctx.take_documents("documents")? else {
            return Ok(());
        };

        info!("rewriting the '{}' field with strategy '{}'", field, strategy);
        let mut rewriter = Rewriter::new(&field, strategy, self.clock.clone());
        let docs = match docs {
            Documents::Materialized(docs) => {
                let rewritten: Result<Vec<Value>> = docs.iter().cloned().map(|doc| rewriter.rewrite(doc)).collect();
                match rewritten {
                    Ok(rewritten) => Documents::Materialized(rewritten),
                    Err(e) => {
                        // the documents go back untouched
                        ctx.put_documents("documents", Documents::Materialized(docs))?;
                        return Err(e);
                    }
                }
            }
            Documents::Streaming(stream) => {
                Documents::Streaming(Box::new(stream.map(move |doc| doc.and_then(|doc| rewriter.rewrite(doc)))))
            }
        };
        ctx.put_documents("documents", docs)
    }
}
