//! The shared state tree passed from pipe to pipe

use crate::core::error::{NodeKind, PipesError};
use crate::core::path::{self, NodePath};
use anyhow::Result;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Lazily produced documents
pub type DocumentStream = Box<dyn Iterator<Item = Result<Value>> + Send>;

/// Documents found at a state node, either in memory or still streaming
pub enum Documents {
    Materialized(Vec<Value>),
    Streaming(DocumentStream),
}

impl Documents {
    /// Collect the documents, draining a stream
    pub fn collect(self) -> Result<Vec<Value>> {
        match self {
            Documents::Materialized(docs) => Ok(docs),
            Documents::Streaming(stream) => stream.collect(),
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Documents::Streaming(_))
    }
}

impl fmt::Debug for Documents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Documents::Materialized(docs) => f.debug_tuple("Materialized").field(&docs.len()).finish(),
            Documents::Streaming(_) => f.debug_tuple("Streaming").finish(),
        }
    }
}

/// Pipeline state
///
/// A mapping at the root, plus nodes that are backed by a document stream
/// instead of a value. A streamed node shadows whatever the tree holds at the
/// same path.
pub struct State {
    tree: Value,
    streams: BTreeMap<NodePath, DocumentStream>,
}

impl State {
    /// Create an empty state
    pub fn new() -> Self {
        Self {
            tree: Value::Object(Map::new()),
            streams: BTreeMap::new(),
        }
    }

    /// Wrap a value tree; `null` becomes an empty state
    pub fn from_value(value: Value) -> Result<Self, PipesError> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::Object(_) => Ok(Self {
                tree: value,
                streams: BTreeMap::new(),
            }),
            other => Err(PipesError::config(format!(
                "invalid state: not a map: {} ({})",
                other,
                path::type_name(&other)
            ))),
        }
    }

    pub fn tree(&self) -> &Value {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Value {
        &mut self.tree
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty() && self.tree.as_object().map_or(true, Map::is_empty)
    }

    pub fn get(&self, path: &NodePath) -> Option<&Value> {
        path::get(&self.tree, path)
    }

    pub fn get_mut(&mut self, path: &NodePath) -> Option<&mut Value> {
        path::get_mut(&mut self.tree, path)
    }

    /// Whether a node, streamed or not, exists at `path`
    pub fn contains(&self, path: &NodePath) -> bool {
        self.streams.contains_key(path) || self.get(path).is_some()
    }

    pub fn is_streamed(&self, path: &NodePath) -> bool {
        self.streams.contains_key(path)
    }

    /// Store a value, replacing any stream at the same node
    pub fn set(&mut self, path: &NodePath, value: Value) -> Result<(), PipesError> {
        self.streams.retain(|streamed, _| !streamed.starts_with(path));
        path::set(&mut self.tree, path, value, NodeKind::State)
    }

    pub fn setdefault(&mut self, path: &NodePath, default: Value) -> Result<&mut Value, PipesError> {
        path::setdefault(&mut self.tree, path, default, NodeKind::State)
    }

    pub fn remove(&mut self, path: &NodePath) -> Option<Value> {
        self.streams.remove(path);
        path::remove(&mut self.tree, path)
    }

    /// Back the node at `path` with a lazy document stream
    pub fn set_stream(&mut self, path: &NodePath, stream: DocumentStream) -> Result<(), PipesError> {
        if path.is_root() {
            return Err(PipesError::config("cannot stream documents into the state root"));
        }
        path::set(&mut self.tree, path, Value::Null, NodeKind::State)?;
        self.streams.insert(path.clone(), stream);
        Ok(())
    }

    /// Take the documents at `path` out of the state
    ///
    /// Returns `Ok(None)` when the node is absent, and an error when it holds
    /// something other than a list.
    pub fn take_documents(&mut self, path: &NodePath) -> Result<Option<Documents>, PipesError> {
        if let Some(stream) = self.streams.remove(path) {
            return Ok(Some(Documents::Streaming(stream)));
        }
        let found = match self.get(path) {
            None => return Ok(None),
            Some(value) => path::type_name(value),
        };
        if found != "list" {
            return Err(PipesError::TypeMismatch {
                kind: NodeKind::State,
                path: path.to_string(),
                found,
                expected: "list",
            });
        }
        match path::remove(&mut self.tree, path) {
            Some(Value::Array(docs)) => Ok(Some(Documents::Materialized(docs))),
            _ => Ok(None),
        }
    }

    /// Put documents back at `path`, keeping streams lazy
    pub fn put_documents(&mut self, path: &NodePath, docs: Documents) -> Result<(), PipesError> {
        match docs {
            Documents::Materialized(docs) => self.set(path, Value::Array(docs)),
            Documents::Streaming(stream) => self.set_stream(path, stream),
        }
    }

    /// Drain every stream into the tree
    pub fn materialize(&mut self) -> Result<()> {
        let streams = std::mem::take(&mut self.streams);
        for (path, stream) in streams {
            let docs = stream.collect::<Result<Vec<_>>>()?;
            path::set(&mut self.tree, &path, Value::Array(docs), NodeKind::State)?;
        }
        Ok(())
    }

    /// Materialize and return the value tree
    pub fn into_value(mut self) -> Result<Value> {
        self.materialize()?;
        Ok(self.tree)
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("tree", &self.tree)
            .field("streams", &self.streams.keys().collect::<Vec<_>>())
            .finish()
    }
}
