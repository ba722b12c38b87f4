//! Dotted node paths into a value tree
//!
//! A path such as `elasticsearch.url` addresses `{"elasticsearch": {"url": ...}}`.
//! The empty path and `.` both address the root. Numeric segments index into
//! sequences on read; writes only ever create mappings.

use crate::core::error::{NodeKind, PipesError};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// A parsed dotted path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodePath {
    segments: Vec<String>,
}

impl NodePath {
    /// The path of the root node
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a dotted path, rejecting empty segments
    pub fn parse(path: &str) -> Result<Self, PipesError> {
        if path.is_empty() || path == "." {
            return Ok(Self::root());
        }
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(PipesError::InvalidPath(path.to_string()));
        }
        Ok(Self { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment, `None` for the root
    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Path of the parent node, `None` for the root
    pub fn parent(&self) -> Option<NodePath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn join(&self, segment: &str) -> NodePath {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self { segments }
    }

    /// Whether `self` is `prefix` or lies below it
    pub fn starts_with(&self, prefix: &NodePath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, ".")
        } else {
            write!(f, "{}", self.segments.join("."))
        }
    }
}

impl FromStr for NodePath {
    type Err = PipesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodePath::parse(s)
    }
}

fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(node: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |i| items.get_mut(i)),
        _ => None,
    }
}

/// Look up the node at `path`; `null` counts as absent
pub fn get<'a>(root: &'a Value, path: &NodePath) -> Option<&'a Value> {
    let mut node = root;
    for segment in path.segments() {
        node = child(node, segment)?;
    }
    (!node.is_null()).then_some(node)
}

/// Mutable lookup of the node at `path`; `null` counts as absent
pub fn get_mut<'a>(root: &'a mut Value, path: &NodePath) -> Option<&'a mut Value> {
    let mut node = root;
    for segment in path.segments() {
        node = child_mut(node, segment)?;
    }
    if node.is_null() {
        None
    } else {
        Some(node)
    }
}

/// Look up a node that must be present
pub fn require<'a>(root: &'a Value, path: &NodePath, kind: NodeKind) -> Result<&'a Value, PipesError> {
    get(root, path).ok_or_else(|| PipesError::MissingNode {
        kind,
        path: path.to_string(),
    })
}

/// Walk to the parent mapping of `path`, creating missing mappings on the way
fn parent_map_mut<'a>(
    root: &'a mut Value,
    path: &NodePath,
    kind: NodeKind,
) -> Result<&'a mut Map<String, Value>, PipesError> {
    let mut node = root;
    let parents = &path.segments()[..path.segments().len().saturating_sub(1)];
    for (depth, segment) in parents.iter().enumerate() {
        if node.is_null() {
            *node = Value::Object(Map::new());
        }
        let map = node.as_object_mut().ok_or_else(|| PipesError::NotAMapping {
            kind,
            path: parents[..depth].join("."),
        })?;
        node = map.entry(segment.clone()).or_insert(Value::Null);
    }
    if node.is_null() {
        *node = Value::Object(Map::new());
    }
    let parent_path = parents.join(".");
    node.as_object_mut().ok_or(PipesError::NotAMapping {
        kind,
        path: parent_path,
    })
}

/// Store `value` at `path`, creating intermediate mappings
///
/// Setting the root replaces the whole tree, which must stay a mapping.
pub fn set(root: &mut Value, path: &NodePath, value: Value, kind: NodeKind) -> Result<(), PipesError> {
    let Some(leaf) = path.leaf() else {
        if !value.is_object() {
            return Err(PipesError::NotAMapping {
                kind,
                path: path.to_string(),
            });
        }
        *root = value;
        return Ok(());
    };
    let leaf = leaf.to_string();
    parent_map_mut(root, path, kind)?.insert(leaf, value);
    Ok(())
}

/// Insert `default` at `path` unless a node is already there
pub fn setdefault<'a>(
    root: &'a mut Value,
    path: &NodePath,
    default: Value,
    kind: NodeKind,
) -> Result<&'a mut Value, PipesError> {
    let Some(leaf) = path.leaf() else {
        return Ok(root);
    };
    let leaf = leaf.to_string();
    let slot = parent_map_mut(root, path, kind)?
        .entry(leaf)
        .or_insert(Value::Null);
    if slot.is_null() {
        *slot = default;
    }
    Ok(slot)
}

/// Remove and return the node at `path`
pub fn remove(root: &mut Value, path: &NodePath) -> Option<Value> {
    let leaf = path.leaf()?;
    let parent = path.parent()?;
    let mut node = root;
    for segment in parent.segments() {
        node = child_mut(node, segment)?;
    }
    node.as_object_mut()?.remove(leaf)
}

/// Short type name of a value, as shown in error messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}
