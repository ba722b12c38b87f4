//! Log subscriber setup
//!
//! Every pipe runs inside a `pipe` span carrying its name. Events are
//! filtered against the level of the innermost enclosing pipe, which is the
//! pipe's own `logging.level` or else the default level. The `elastic.pipes`
//! entry sets that default for the whole run. `RUST_LOG`, when set, replaces
//! all of it with a plain `EnvFilter`.

use crate::core::config::{parse_level, PipeEntry};
use crate::execution::engine::PIPE_SPAN;
use crate::pipes::logging::NAME as RUNNER_PIPE;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::{span, Metadata, Subscriber};
use tracing_subscriber::filter::DynFilterFn;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{self, Filter, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Log levels of a run, per pipe
#[derive(Debug, Clone, PartialEq)]
pub struct PipeLevels {
    default: LevelFilter,
    pipes: HashMap<String, LevelFilter>,
}

impl PipeLevels {
    /// `default_level` applies unless the `elastic.pipes` entry sets one
    pub fn new(default_level: &str, pipes: &[PipeEntry]) -> Self {
        let default = pipes
            .iter()
            .find(|entry| entry.name == RUNNER_PIPE)
            .and_then(PipeEntry::log_level)
            .or_else(|| parse_level(default_level))
            .map_or(LevelFilter::INFO, LevelFilter::from_level);

        let pipes = pipes
            .iter()
            .filter(|entry| entry.name != RUNNER_PIPE)
            .filter_map(|entry| Some((entry.name.clone(), LevelFilter::from_level(entry.log_level()?))))
            .collect();
        Self { default, pipes }
    }

    pub fn default_level(&self) -> LevelFilter {
        self.default
    }

    pub fn level_for(&self, pipe: &str) -> LevelFilter {
        self.pipes.get(pipe).copied().unwrap_or(self.default)
    }

    /// Per-layer filter that checks events against their pipe's level
    pub fn filter<S>(self) -> impl Filter<S>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        DynFilterFn::new(move |meta: &Metadata<'_>, cx: &layer::Context<'_, S>| {
            if meta.is_span() {
                return true;
            }
            let level = cx
                .lookup_current()
                .and_then(|current| {
                    current.scope().find_map(|span| {
                        let extensions = span.extensions();
                        let level = extensions.get::<PipeName>().map(|pipe| self.level_for(&pipe.0));
                        level
                    })
                })
                .unwrap_or(self.default);
            meta.level() <= &level
        })
    }
}

/// Name of the pipe a `pipe` span belongs to
struct PipeName(String);

#[derive(Default)]
struct NameVisitor(Option<String>);

impl Visit for NameVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "name" {
            self.0 = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "name" {
            self.0 = Some(format!("{:?}", value));
        }
    }
}

/// Stores the name of every new `pipe` span in its extensions
struct PipeNames;

impl<S> Layer<S> for PipeNames
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: layer::Context<'_, S>) {
        if attrs.metadata().name() != PIPE_SPAN {
            return;
        }
        let mut visitor = NameVisitor::default();
        attrs.record(&mut visitor);
        if let (Some(name), Some(span)) = (visitor.0, ctx.span(id)) {
            span.extensions_mut().insert(PipeName(name));
        }
    }
}

/// Build an `EnvFilter` out of `RUST_LOG`-style directives
pub fn build_filter(directives: &str) -> Result<EnvFilter> {
    let filter = EnvFilter::builder().parse(directives).context("Invalid log filter")?;
    Ok(filter)
}

/// Subscriber writing to `writer`, filtered by `env` if given, else by `levels`
pub fn subscriber<W>(levels: PipeLevels, env: Option<EnvFilter>, writer: W) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let output = tracing_subscriber::fmt::layer().with_writer(writer).with_target(false);
    let output = match env {
        Some(env) => output.with_filter(env).boxed(),
        None => output.with_filter(levels.filter()).boxed(),
    };
    tracing_subscriber::registry().with(PipeNames).with(output)
}

/// Install the global subscriber, logging to stderr
pub fn init(default_level: &str, pipes: &[PipeEntry]) -> Result<()> {
    let env = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(env) if !env.trim().is_empty() => Some(build_filter(&env)?),
        _ => None,
    };
    let subscriber = subscriber(PipeLevels::new(default_level, pipes), env, std::io::stderr);
    tracing::subscriber::set_global_default(subscriber).context("Failed to set logging subscriber")?;
    Ok(())
}
