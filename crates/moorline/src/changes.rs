//! Change descriptors and the reducer that folds them into a value.
//!
//! A host state store describes each mutation as a path into the JSON
//! tree plus the new value at that path (or no value, meaning a delete).
//! [`apply_changes`] replays a batch of those descriptors over a starting
//! value, creating intermediate containers as the path demands.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step of a change path.
///
/// Serializes untagged, so a wire path reads `["users", 0, "name"]` with
/// strings addressing object keys and numbers addressing array slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// A single mutation reported by the host store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    /// Path from the root to the mutated node. Empty means the root
    /// itself was replaced or deleted.
    pub path: Vec<PathSegment>,
    /// Value previously at the path, if the host tracked one. Carried
    /// for host bookkeeping; the reducer does not consult it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_at_path: Option<Value>,
    /// New value at the path. `None` deletes the node.
    #[serde(default)]
    pub value_at_path: Option<Value>,
}

impl Change {
    /// A change that sets `value` at `path`.
    pub fn set(path: Vec<PathSegment>, value: Value) -> Self {
        Self {
            path,
            prev_at_path: None,
            value_at_path: Some(value),
        }
    }

    /// A change that deletes the node at `path`.
    pub fn delete(path: Vec<PathSegment>) -> Self {
        Self {
            path,
            prev_at_path: None,
            value_at_path: None,
        }
    }
}

/// Fold a batch of changes over `initial`, in order.
///
/// Returns `None` when the final change set deletes the root, which the
/// persister treats as "this table holds nothing".
pub fn apply_changes(initial: Value, changes: &[Change]) -> Option<Value> {
    let mut current = Some(initial);
    for change in changes {
        current = set_at_path(current, &change.path, change.value_at_path.as_ref());
    }
    current
}

/// Write `leaf` at `path` inside `target`, building missing containers.
///
/// The segment kind decides what gets built: a key segment lands in an
/// object, an index segment in an array. Anything already present of the
/// wrong shape is replaced by a fresh container of the right one. Setting
/// an index past the end null-pads the array up to it; deleting an
/// in-bounds index leaves a null hole rather than shifting later slots.
fn set_at_path(target: Option<Value>, path: &[PathSegment], leaf: Option<&Value>) -> Option<Value> {
    let Some((head, rest)) = path.split_first() else {
        return leaf.cloned();
    };
    match head {
        PathSegment::Key(key) => {
            let mut map = match target {
                Some(Value::Object(map)) => map,
                _ => serde_json::Map::new(),
            };
            let child = map.remove(key);
            if let Some(next) = set_at_path(child, rest, leaf) {
                map.insert(key.clone(), next);
            }
            Some(Value::Object(map))
        }
        PathSegment::Index(index) => {
            let mut items = match target {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            if *index < items.len() {
                let child = std::mem::replace(&mut items[*index], Value::Null);
                items[*index] = set_at_path(Some(child), rest, leaf).unwrap_or(Value::Null);
            } else if let Some(next) = set_at_path(None, rest, leaf) {
                items.resize(*index, Value::Null);
                items.push(next);
            }
            Some(Value::Array(items))
        }
    }
}
