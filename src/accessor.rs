//! Safe nested lookups into the heterogeneous JSON the router returns.
//!
//! Every metric reader goes through [`resolve`] or [`get`], so none of them
//! needs its own defensive branching. A path miss is a typed
//! [`FieldAccessError`], never a panic.

use crate::error::FieldAccessError;
use serde_json::Value;
use std::fmt;
use tracing::debug;

static NULL: Value = Value::Null;

/// One step of a field path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Object field name
    Field(&'static str),
    /// Array index
    Index(usize),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Field(name) => f.write_str(name),
            Key::Index(i) => write!(f, "[{i}]"),
        }
    }
}

impl From<&'static str> for Key {
    fn from(name: &'static str) -> Self {
        Key::Field(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

/// Name of a JSON node kind, used in diagnostics.
#[must_use]
pub fn node_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Walk `path` from `root`.
///
/// # Errors
///
/// Stops at the first key that does not match the current node and reports why.
pub fn resolve<'a>(root: &'a Value, path: &[Key]) -> Result<&'a Value, FieldAccessError> {
    let mut node = root;

    for (depth, key) in path.iter().enumerate() {
        node = match (key, node) {
            (Key::Field(name), Value::Object(map)) => {
                map.get(*name).ok_or_else(|| FieldAccessError::MissingKey {
                    key: (*name).to_string(),
                    depth,
                })?
            }
            (Key::Index(index), Value::Array(items)) => {
                items
                    .get(*index)
                    .ok_or(FieldAccessError::IndexOutOfRange {
                        index: *index,
                        len: items.len(),
                        depth,
                    })?
            }
            (Key::Field(_), other) => {
                return Err(FieldAccessError::WrongNodeKind {
                    expected: "object",
                    found: node_kind(other),
                    depth,
                })
            }
            (Key::Index(_), other) => {
                return Err(FieldAccessError::WrongNodeKind {
                    expected: "array",
                    found: node_kind(other),
                    depth,
                })
            }
        };
    }

    Ok(node)
}

/// Resolve `path` and run `transform` on the result.
///
/// # Errors
///
/// Returns the traversal error, or [`FieldAccessError::Transform`] carrying the
/// transform's own message.
pub fn resolve_with<T, F>(root: &Value, path: &[Key], transform: F) -> Result<T, FieldAccessError>
where
    F: FnOnce(&Value) -> Result<T, String>,
{
    let node = resolve(root, path)?;
    transform(node).map_err(FieldAccessError::Transform)
}

/// Like [`resolve_with`] but the outcome is logged and collapsed into an `Option`.
pub fn get<T, F>(root: &Value, path: &[Key], transform: F) -> Option<T>
where
    F: FnOnce(&Value) -> Result<T, String>,
{
    match resolve_with(root, path, transform) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Field lookup {} failed: {e}", display_path(path));
            None
        }
    }
}

/// Render a path as `a.b.[0].c` for logs.
#[must_use]
pub fn display_path(path: &[Key]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Measurement block of the primary component carrier.
///
/// With carrier aggregation active the router reports `{"data": [pcc, scc1, ...]}`;
/// without it the block is the flat object itself. This is the device's
/// behaviour and both shapes must keep working.
#[must_use]
pub fn primary_component(cellular_ex: &Value) -> &Value {
    match cellular_ex.get("data") {
        Some(Value::Array(blocks)) => blocks.first().unwrap_or(&NULL),
        _ => cellular_ex,
    }
}

/// Measurement block of secondary carrier `n` (1 for SCC1).
///
/// # Errors
///
/// Fails when no aggregation is active, which is the normal state of many links.
pub fn secondary_component(cellular_ex: &Value, n: usize) -> Result<&Value, FieldAccessError> {
    resolve(cellular_ex, &[Key::Field("data"), Key::Index(n)])
}
