//! Configuration Document
//!
//! The in-memory form of the persisted document: a JSON tree whose root is
//! an object. All node-level primitives (get, append, replace, remove) are
//! implemented here against parsed `PathExpr`s. Persistence, locking and
//! revisions live in the backend.

use crate::db::path::{PathExpr, Segment};
use crate::db::BackendError;
use serde_json::{Map, Value};

/// The configuration document tree
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Value,
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

impl Document {
    /// Create a document with an empty root object
    pub fn empty() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Wrap a parsed JSON value, which must be an object
    pub fn from_value(root: Value) -> Result<Self, BackendError> {
        if !root.is_object() {
            return Err(BackendError::InvalidDocument(
                "document root must be an object".to_string(),
            ));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Serialized form written to disk
    pub fn to_pretty_string(&self) -> Result<String, serde_json::Error> {
        let mut out = serde_json::to_string_pretty(&self.root)?;
        out.push('\n');
        Ok(out)
    }

    /// Data of the single node matched by `path`
    ///
    /// Returns `Ok(None)` when nothing matches and an `Ambiguous` error when
    /// more than one node does.
    pub fn get(&self, path: &PathExpr) -> Result<Option<Value>, BackendError> {
        let locations = path.evaluate(&self.root);
        match locations.as_slice() {
            [] => Ok(None),
            [location] => Ok(get_at(&self.root, location).cloned()),
            _ => Err(BackendError::Ambiguous {
                path: path.to_string(),
                count: locations.len(),
            }),
        }
    }

    /// Data of every node matched by `path`, in document order
    pub fn get_list(&self, path: &PathExpr) -> Vec<Value> {
        path.evaluate(&self.root)
            .iter()
            .filter_map(|location| get_at(&self.root, location).cloned())
            .collect()
    }

    pub fn exists(&self, path: &PathExpr) -> bool {
        !path.evaluate(&self.root).is_empty()
    }

    /// Append `values` as a new sibling at the list named by `path`
    ///
    /// The parent must resolve to exactly one node. A missing parent made of
    /// plain names is created.
    pub fn append(&mut self, path: &PathExpr, values: Value) -> Result<(), BackendError> {
        ensure_node(&values)?;
        let (parent, name) = path.split_last()?;

        let container = match parent {
            None => &mut self.root,
            Some(parent) => {
                let locations = parent.evaluate(&self.root);
                match locations.len() {
                    0 => match parent.plain_names() {
                        Some(names) => materialize(&mut self.root, &names)?,
                        None => return Err(BackendError::no_match(parent.as_str())),
                    },
                    1 => get_at_mut(&mut self.root, &locations[0])
                        .ok_or_else(|| BackendError::no_match(parent.as_str()))?,
                    count => {
                        return Err(BackendError::Ambiguous {
                            path: parent.to_string(),
                            count,
                        })
                    }
                }
            }
        };

        let map = container.as_object_mut().ok_or_else(|| {
            BackendError::InvalidDocument(format!("parent of '{}' is not a node", path))
        })?;

        match map.get_mut(name) {
            None => {
                map.insert(name.to_string(), Value::Array(vec![values]));
            }
            Some(Value::Array(items)) => items.push(values),
            Some(existing @ Value::Object(_)) => {
                let previous = existing.take();
                *existing = Value::Array(vec![previous, values]);
            }
            Some(_) => {
                return Err(BackendError::InvalidDocument(format!(
                    "'{}' holds a property value, not a list of nodes",
                    path
                )))
            }
        }
        Ok(())
    }

    /// Overwrite every node matched by `path` with `values`
    ///
    /// When nothing matches and `path` is plain names only, the node is
    /// created. Returns the number of nodes written.
    pub fn replace(&mut self, path: &PathExpr, values: Value) -> Result<usize, BackendError> {
        ensure_node(&values)?;
        let locations = path.evaluate(&self.root);

        if locations.is_empty() {
            let names = path
                .plain_names()
                .ok_or_else(|| BackendError::no_match(path.as_str()))?;
            let slot = materialize(&mut self.root, &names)?;
            *slot = values;
            return Ok(1);
        }

        for location in &locations {
            if let Some(slot) = get_at_mut(&mut self.root, location) {
                *slot = values.clone();
            }
        }
        Ok(locations.len())
    }

    /// Remove every node matched by `path`, returning how many were removed
    pub fn remove(&mut self, path: &PathExpr) -> usize {
        let mut locations = path.evaluate(&self.root);
        // deepest and highest-index locations first so earlier removals
        // never shift the ones still pending
        locations.sort();
        locations.reverse();

        locations
            .iter()
            .filter(|location| remove_at(&mut self.root, location))
            .count()
    }
}

fn ensure_node(values: &Value) -> Result<(), BackendError> {
    if values.is_object() {
        Ok(())
    } else {
        Err(BackendError::InvalidValue(format!(
            "node data must be an object, got {}",
            values
        )))
    }
}

fn get_at<'a>(root: &'a Value, location: &[Segment]) -> Option<&'a Value> {
    location.iter().try_fold(root, |node, segment| match segment {
        Segment::Key(key) => node.as_object()?.get(key),
        Segment::Index(index) => node.as_array()?.get(*index),
    })
}

fn get_at_mut<'a>(root: &'a mut Value, location: &[Segment]) -> Option<&'a mut Value> {
    let mut cursor = root;
    for segment in location {
        cursor = match (segment, cursor) {
            (Segment::Key(key), Value::Object(map)) => map.get_mut(key)?,
            (Segment::Index(index), Value::Array(items)) => items.get_mut(*index)?,
            _ => return None,
        };
    }
    Some(cursor)
}

fn remove_at(root: &mut Value, location: &[Segment]) -> bool {
    let Some((last, parent)) = location.split_last() else {
        return false;
    };
    let Some(parent) = get_at_mut(root, parent) else {
        return false;
    };

    match (last, parent) {
        (Segment::Key(key), Value::Object(map)) => map.shift_remove(key).is_some(),
        (Segment::Index(index), Value::Array(items)) if *index < items.len() => {
            items.remove(*index);
            true
        }
        _ => false,
    }
}

/// Walk `names` from the root, creating empty objects where missing
fn materialize<'a>(root: &'a mut Value, names: &[&str]) -> Result<&'a mut Value, BackendError> {
    let mut cursor = root;
    for name in names {
        cursor = match cursor {
            Value::Object(map) => map
                .entry(name.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => {
                return Err(BackendError::InvalidDocument(format!(
                    "cannot create '{}' under a non-node value",
                    name
                )))
            }
        };
    }
    if cursor.is_object() {
        Ok(cursor)
    } else {
        Err(BackendError::InvalidDocument(format!(
            "'/{}' is not a node",
            names.join("/")
        )))
    }
}
