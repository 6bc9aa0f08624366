//! Reading and writing JSON values by [`FieldPath`].
//!
//! Reads never allocate and return `None` for any missing step. Writes create
//! missing containers on the way down: an object when the step is a key, an
//! array (padded with `null`) when it is an index. A scalar or `null` found
//! where a container is needed is replaced. Existing arrays are never turned
//! into objects: a key step on an array is rejected and the value is left
//! untouched.

use crate::models::schema::PathSegment;
use serde_json::{Map, Value};
use thiserror::Error;

/// Largest array index a write may pad up to
pub const MAX_ARRAY_INDEX: usize = 1 << 16;

/// A write that cannot be applied at its path
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// A key step landed on an existing array
    #[error("Cannot set key '{key}' on an array")]
    KeyOnArray { key: String },

    /// An index step is larger than [`MAX_ARRAY_INDEX`]
    #[error("Array index {index} is larger than {max}", max = MAX_ARRAY_INDEX)]
    IndexTooLarge { index: usize },
}

/// Get a value by path
pub fn get_path<'a>(value: &'a Value, path: &[PathSegment]) -> Option<&'a Value> {
    let mut current = value;
    for step in path {
        current = match (current, step) {
            (Value::Object(map), PathSegment::Key(key)) => map.get(key)?,
            (Value::Object(map), PathSegment::Index(index)) => map.get(&index.to_string())?,
            (Value::Array(items), PathSegment::Index(index)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Set a value by path, creating intermediate containers
///
/// An empty path replaces the whole value. On error nothing is written.
pub fn set_path(
    value: &mut Value,
    path: &[PathSegment],
    new_value: Value,
) -> Result<(), PathError> {
    check_path(value, path)?;
    write_path(value, path, new_value);
    Ok(())
}

/// Walk the existing part of the path and reject writes that would fail
fn check_path(value: &Value, path: &[PathSegment]) -> Result<(), PathError> {
    let mut current = Some(value);
    for step in path {
        match (current, step) {
            (Some(Value::Array(_)), PathSegment::Key(key)) => {
                return Err(PathError::KeyOnArray { key: key.clone() })
            }
            (_, PathSegment::Index(index)) if *index > MAX_ARRAY_INDEX => {
                return Err(PathError::IndexTooLarge { index: *index })
            }
            _ => {}
        }
        current = current.and_then(|value| get_path(value, std::slice::from_ref(step)));
    }
    Ok(())
}

fn write_path(value: &mut Value, path: &[PathSegment], new_value: Value) {
    let Some((step, rest)) = path.split_first() else {
        *value = new_value;
        return;
    };
    write_path(slot_mut(value, step), rest, new_value);
}

/// The child at `step`, creating it (and its container) when missing
fn slot_mut<'a>(current: &'a mut Value, step: &PathSegment) -> &'a mut Value {
    match (current, step) {
        (Value::Array(items), PathSegment::Index(index)) => {
            if items.len() <= *index {
                items.resize(*index + 1, Value::Null);
            }
            &mut items[*index]
        }
        (Value::Object(map), step) => map.entry(step.to_string()).or_insert(Value::Null),
        (other, step) => {
            *other = empty_container(step);
            slot_mut(other, step)
        }
    }
}

fn empty_container(step: &PathSegment) -> Value {
    match step {
        PathSegment::Index(_) => Value::Array(Vec::new()),
        PathSegment::Key(_) => Value::Object(Map::new()),
    }
}
