//! Execution context of a pipe
//!
//! [`PipeContext`] is what a pipe body sees: its bound parameters, the shared
//! state and the contexts entered around it. Contexts are resources with
//! their own parameters; a [`Scope`] enters them in declaration order and
//! releases them in reverse, also when the body fails.

use crate::core::binding::Bindings;
use crate::core::path::NodePath;
use crate::core::pipe::Param;
use crate::core::state::{DocumentStream, Documents, State};
use anyhow::{anyhow, bail, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::{type_name, Any};
use std::fmt;
use tracing::debug;

/// A resource entered before the pipe body and released after it
pub trait Context: Send + Sized + 'static {
    /// Parameters the context needs, bound along with the pipe's own
    fn params() -> Vec<Param> {
        Vec::new()
    }

    fn acquire(bindings: &Bindings) -> Result<Self>;

    fn release(&mut self) {}
}

trait Entered: Send {
    fn release(&mut self);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C: Context> Entered for C {
    fn release(&mut self) {
        Context::release(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn acquire_boxed<C: Context>(bindings: &Bindings) -> Result<Box<dyn Entered>> {
    Ok(Box::new(C::acquire(bindings)?))
}

/// Declaration of a context used by a pipe
#[derive(Clone)]
pub struct ContextDecl {
    pub type_name: &'static str,
    pub params: Vec<Param>,
    acquire: fn(&Bindings) -> Result<Box<dyn Entered>>,
}

impl ContextDecl {
    pub fn of<C: Context>() -> Self {
        Self {
            type_name: type_name::<C>(),
            params: C::params(),
            acquire: acquire_boxed::<C>,
        }
    }
}

impl fmt::Debug for ContextDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextDecl")
            .field("type_name", &self.type_name)
            .field("params", &self.params)
            .finish()
    }
}

/// Contexts entered around one pipe run
#[derive(Default)]
pub struct Scope {
    entered: Vec<(&'static str, Box<dyn Entered>)>,
}

impl Scope {
    /// Enter every declared context
    ///
    /// If one fails to acquire, those already entered are released before
    /// the error is returned.
    pub fn enter(decls: &[ContextDecl], bindings: &Bindings) -> Result<Self> {
        let mut scope = Scope::default();
        for decl in decls {
            debug!("entering context {}", decl.type_name);
            let context = (decl.acquire)(bindings)?;
            scope.entered.push((decl.type_name, context));
        }
        Ok(scope)
    }

    pub fn len(&self) -> usize {
        self.entered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entered.is_empty()
    }

    pub fn get<C: Context>(&self) -> Option<&C> {
        self.entered
            .iter()
            .find_map(|(_, context)| context.as_any().downcast_ref::<C>())
    }

    pub fn get_mut<C: Context>(&mut self) -> Option<&mut C> {
        self.entered
            .iter_mut()
            .find_map(|(_, context)| context.as_any_mut().downcast_mut::<C>())
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        while let Some((name, mut context)) = self.entered.pop() {
            debug!("releasing context {}", name);
            context.release();
        }
    }
}

/// What a running pipe gets to work with
pub struct PipeContext<'a> {
    name: String,
    bindings: Bindings,
    state: &'a mut State,
    scope: Scope,
    dry_run: bool,
}

impl<'a> PipeContext<'a> {
    pub fn new(name: &str, bindings: Bindings, state: &'a mut State, scope: Scope, dry_run: bool) -> Self {
        Self {
            name: name.to_string(),
            bindings,
            state,
            scope,
            dry_run,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Bound config value of `param`
    pub fn config<T: DeserializeOwned>(&self, param: &str) -> Result<T> {
        self.bindings.get(param)
    }

    pub fn config_opt<T: DeserializeOwned>(&self, param: &str) -> Result<Option<T>> {
        self.bindings.get_opt(param)
    }

    /// Config values are the pipe's own copy and may be changed freely
    pub fn config_value_mut(&mut self, param: &str) -> Option<&mut Value> {
        self.bindings.value_mut(param)
    }

    pub fn state(&self) -> &State {
        &*self.state
    }

    pub fn state_mut(&mut self) -> &mut State {
        &mut *self.state
    }

    pub fn state_path(&self, param: &str) -> Result<NodePath> {
        self.bindings.state_path(param).cloned()
    }

    /// Current value of the state node bound to `param`, or its default
    pub fn state_value(&self, param: &str) -> Result<Option<&Value>> {
        let binding = self
            .bindings
            .state(param)
            .ok_or_else(|| anyhow!("param '{}' is not bound to the state", param))?;
        Ok(self.state.get(&binding.path).or(binding.default.as_ref()))
    }

    fn writable_path(&self, param: &str) -> Result<NodePath> {
        match self.bindings.state(param) {
            Some(binding) if binding.mutable => Ok(binding.path.clone()),
            Some(_) => bail!("param '{}' is not a mutable state binding", param),
            None => bail!("param '{}' is not bound to the state", param),
        }
    }

    pub fn set_state(&mut self, param: &str, value: Value) -> Result<()> {
        let path = self.writable_path(param)?;
        self.state.set(&path, value)?;
        Ok(())
    }

    pub fn set_state_stream(&mut self, param: &str, stream: DocumentStream) -> Result<()> {
        let path = self.writable_path(param)?;
        self.state.set_stream(&path, stream)?;
        Ok(())
    }

    /// Take the documents bound to `param` out of the state
    pub fn take_documents(&mut self, param: &str) -> Result<Option<Documents>> {
        let path = self.writable_path(param)?;
        Ok(self.state.take_documents(&path)?)
    }

    pub fn put_documents(&mut self, param: &str, docs: Documents) -> Result<()> {
        let path = self.writable_path(param)?;
        self.state.put_documents(&path, docs)?;
        Ok(())
    }

    pub fn context<C: Context>(&self) -> Result<&C> {
        self.scope
            .get::<C>()
            .ok_or_else(|| anyhow!("context {} is not entered", type_name::<C>()))
    }

    pub fn context_mut<C: Context>(&mut self) -> Result<&mut C> {
        self.scope
            .get_mut::<C>()
            .ok_or_else(|| anyhow!("context {} is not entered", type_name::<C>()))
    }

    /// A context and the state at once
    pub fn parts<C: Context>(&mut self) -> Result<(&mut C, &mut State)> {
        let context = self
            .scope
            .get_mut::<C>()
            .ok_or_else(|| anyhow!("context {} is not entered", type_name::<C>()))?;
        Ok((context, &mut *self.state))
    }

    /// Release entered contexts, in reverse order
    pub fn close(self) {
        drop(self.scope);
    }
}
