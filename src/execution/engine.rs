//! Pipeline runner - runs the pipes of a pipeline one after another

use crate::core::binding::bind;
use crate::core::config::{get_pipes, PipeEntry};
use crate::core::context::{PipeContext, Scope};
use crate::core::error::PipesError;
use crate::core::runtime::RUNTIME;
use crate::core::state::State;
use crate::execution::registry::Registry;
use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info_span, Instrument};
use uuid::Uuid;

/// Name of the span every pipe runs in, with the pipe's `name` as a field
pub const PIPE_SPAN: &str = "pipe";

/// Final status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Failed,
}

/// Events that can occur during a pipeline run
#[derive(Debug, Clone)]
pub enum RunEvent {
    RunStarted {
        run_id: Uuid,
        pipes: usize,
        dry_run: bool,
    },
    PipeStarted {
        name: String,
        dry_run: bool,
    },
    PipeSkipped {
        name: String,
    },
    PipeCompleted {
        name: String,
        elapsed: Duration,
    },
    PipeFailed {
        name: String,
        error: String,
    },
    RunFinished {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(RunEvent) + Send + Sync>;

/// Runs the `pipes` list of a state against a registry
pub struct Runner {
    registry: Arc<Registry>,
    dry_run: bool,
    run_id: Uuid,
    event_handlers: Vec<EventHandler>,
}

impl Runner {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            dry_run: false,
            run_id: Uuid::new_v4(),
            event_handlers: Vec::new(),
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Add an event handler
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(RunEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Emit an event to all handlers
    fn emit_event(&self, event: RunEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    /// Run every pipe listed in the state, in order
    ///
    /// All pipe names are checked before the first pipe runs. The run stops
    /// at the first failing pipe.
    pub async fn run(&self, state: &mut State) -> Result<()> {
        // `runtime` is added by the caller and does not count
        let blank = state
            .tree()
            .as_object()
            .map_or(true, |map| map.keys().all(|key| key == RUNTIME));
        if blank {
            return Err(PipesError::config("invalid configuration, it's empty").into());
        }
        let pipes = get_pipes(state.tree())?;
        for entry in &pipes {
            if !self.registry.contains(&entry.name) {
                return Err(PipesError::config(format!("unknown pipe: {}", entry.name)).into());
            }
        }

        debug!("starting run {} with {} pipes", self.run_id, pipes.len());
        self.emit_event(RunEvent::RunStarted {
            run_id: self.run_id,
            pipes: pipes.len(),
            dry_run: self.dry_run,
        });

        for entry in &pipes {
            if let Err(e) = self.run_pipe(entry, state).await {
                error!("pipe '{}' failed in run {}: {:#}", entry.name, self.run_id, e);
                self.emit_event(RunEvent::PipeFailed {
                    name: entry.name.clone(),
                    error: e.to_string(),
                });
                self.emit_event(RunEvent::RunFinished {
                    run_id: self.run_id,
                    status: RunStatus::Failed,
                });
                return Err(e);
            }
        }

        self.emit_event(RunEvent::RunFinished {
            run_id: self.run_id,
            status: RunStatus::Completed,
        });
        Ok(())
    }

    /// Bind and run a single pipe
    pub async fn run_pipe(&self, entry: &PipeEntry, state: &mut State) -> Result<()> {
        let span = info_span!(PIPE_SPAN, name = %entry.name);
        self.run_pipe_inner(entry, state).instrument(span).await
    }

    async fn run_pipe_inner(&self, entry: &PipeEntry, state: &mut State) -> Result<()> {
        let registered = self
            .registry
            .find(&entry.name)
            .ok_or_else(|| PipesError::config(format!("unknown pipe: {}", entry.name)))?;
        let decl = &registered.decl;

        // bind first, so that misconfiguration shows up on dry runs too
        let bindings = bind(decl, &entry.config, state)?;

        if self.dry_run && !decl.dry_run {
            debug!("not executing pipe '{}'...", entry.name);
            self.emit_event(RunEvent::PipeSkipped {
                name: entry.name.clone(),
            });
            return Ok(());
        }

        if self.dry_run {
            debug!("dry executing pipe '{}'...", entry.name);
        } else {
            debug!("executing pipe '{}'...", entry.name);
        }
        self.emit_event(RunEvent::PipeStarted {
            name: entry.name.clone(),
            dry_run: self.dry_run,
        });

        let started = Instant::now();
        let scope = Scope::enter(&decl.contexts, &bindings)?;
        let mut ctx = PipeContext::new(&entry.name, bindings, state, scope, self.dry_run);
        let result = registered.pipe.run(&mut ctx).await;
        ctx.close();
        result?;

        self.emit_event(RunEvent::PipeCompleted {
            name: entry.name.clone(),
            elapsed: started.elapsed(),
        });
        Ok(())
    }
}
