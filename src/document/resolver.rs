//! Path Resolution
//!
//! Walks a [`Path`] through a [`Value`] tree. Reads and writes resolve
//! differently:
//!
//! ```text
//!   read   $.a.b[3]        write  $.a.b[3]
//!   ─────────────────      ──────────────────────────────────────
//!   missing field  → None   missing field  → created (object / array
//!   index past end → None                    / null by the next step)
//!   step on scalar → PathType  index past end → padded with null
//!                                                (at most MAX_PADDING)
//!                           step on scalar → KeyType
//! ```
//!
//! A step of the wrong kind against a container (an index step on an
//! object, a field step on an array) is `PathType` for both.
//!
//! Writes are validated by a dry walk ([`check_writable`]) before anything
//! is created, so a failing write never leaves placeholder containers
//! behind.

use super::path::{Path, Step};
use super::value::Value;
use crate::error::{StoreError, StoreResult};

/// Maps a possibly negative index onto `0..`, or `None` if it reaches
/// before the start. The result may be `>= len`.
pub fn normalize_index(index: i64, len: usize) -> Option<usize> {
    if index >= 0 {
        usize::try_from(index).ok()
    } else {
        let adjusted = len as i64 + index;
        (adjusted >= 0).then_some(adjusted as usize)
    }
}

/// Most nulls a single write may pad an array with.
pub const MAX_PADDING: usize = 1024;

/// Position a write step lands on in an array of `len` items.
fn write_index(index: i64, len: usize) -> StoreResult<usize> {
    match normalize_index(index, len) {
        Some(i) if i.saturating_sub(len) <= MAX_PADDING => Ok(i),
        _ => Err(StoreError::IndexOutOfRange { index, len }),
    }
}

fn path_type(step: &Step, node: &Value) -> StoreError {
    StoreError::PathType {
        step: step.to_string(),
        found: node.kind(),
    }
}

/// Error for a write step that cannot descend into `node`.
fn write_mismatch(step: &Step, node: &Value) -> StoreError {
    if node.is_container() {
        path_type(step, node)
    } else {
        StoreError::KeyType {
            step: step.to_string(),
            found: node.kind(),
        }
    }
}

/// Resolves a path for reading.
///
/// Returns `Ok(None)` if a field or index along the way does not exist.
pub fn resolve<'a>(root: &'a Value, path: &Path) -> StoreResult<Option<&'a Value>> {
    resolve_steps(root, path.steps())
}

fn resolve_steps<'a>(root: &'a Value, steps: &[Step]) -> StoreResult<Option<&'a Value>> {
    let mut current = root;
    for step in steps {
        current = match (step, current) {
            (Step::Field(name), Value::Object(map)) => match map.get(name) {
                Some(child) => child,
                None => return Ok(None),
            },
            (Step::Index(index), Value::Array(items)) => {
                match normalize_index(*index, items.len()).and_then(|i| items.get(i)) {
                    Some(child) => child,
                    None => return Ok(None),
                }
            }
            (step, node) => return Err(path_type(step, node)),
        };
    }
    Ok(Some(current))
}

/// Resolves a path to an existing node for in-place mutation.
pub fn resolve_mut<'a>(root: &'a mut Value, path: &Path) -> StoreResult<Option<&'a mut Value>> {
    resolve_steps_mut(root, path.steps())
}

fn resolve_steps_mut<'a>(
    root: &'a mut Value,
    steps: &[Step],
) -> StoreResult<Option<&'a mut Value>> {
    let mut current = root;
    for step in steps {
        current = match (step, current) {
            (Step::Field(name), Value::Object(map)) => match map.get_mut(name) {
                Some(child) => child,
                None => return Ok(None),
            },
            (Step::Index(index), Value::Array(items)) => {
                let len = items.len();
                match normalize_index(*index, len).and_then(|i| items.get_mut(i)) {
                    Some(child) => child,
                    None => return Ok(None),
                }
            }
            (step, node) => return Err(path_type(step, node)),
        };
    }
    Ok(Some(current))
}

/// Checks that [`resolve_or_create`] would succeed without touching the tree.
pub fn check_writable(root: &Value, path: &Path) -> StoreResult<()> {
    let steps = path.steps();
    let mut current = root;
    for (pos, step) in steps.iter().enumerate() {
        let next = match (step, current) {
            (Step::Field(name), Value::Object(map)) => map.get(name),
            (Step::Index(index), Value::Array(items)) => {
                items.get(write_index(*index, items.len())?)
            }
            (step, node) => return Err(write_mismatch(step, node)),
        };
        match next {
            Some(child) => current = child,
            // Everything below a missing step lands in fresh, empty containers.
            None => return check_fresh(&steps[pos + 1..]),
        }
    }
    Ok(())
}

fn check_fresh(steps: &[Step]) -> StoreResult<()> {
    for step in steps {
        if let Step::Index(index) = step {
            write_index(*index, 0)?;
        }
    }
    Ok(())
}

/// The empty container a missing step is filled with, chosen by the step
/// that will descend into it. The last step gets a null slot that the
/// caller overwrites.
pub(crate) fn placeholder(next: Option<&Step>) -> Value {
    match next {
        Some(Step::Field(_)) => Value::object(),
        Some(Step::Index(_)) => Value::array(),
        None => Value::Null,
    }
}

/// Resolves a path for writing, creating missing intermediates.
///
/// Arrays indexed past their end are padded with nulls up to the index, by
/// at most [`MAX_PADDING`] slots.
pub fn resolve_or_create<'a>(root: &'a mut Value, path: &Path) -> StoreResult<&'a mut Value> {
    check_writable(root, path)?;

    let steps = path.steps();
    let mut current = root;
    for (pos, step) in steps.iter().enumerate() {
        let next = steps.get(pos + 1);
        current = match (step, current) {
            (Step::Field(name), Value::Object(map)) => map
                .entry(name.clone())
                .or_insert_with(|| placeholder(next)),
            (Step::Index(index), Value::Array(items)) => {
                let len = items.len();
                let i = write_index(*index, len)?;
                if i >= len {
                    items.resize(i, Value::Null);
                    items.push(placeholder(next));
                }
                &mut items[i]
            }
            (step, node) => return Err(write_mismatch(step, node)),
        };
    }
    Ok(current)
}

/// Detaches the node at a non-root path. Returns `None` if it does not
/// resolve. The caller handles the root.
pub fn remove(root: &mut Value, path: &Path) -> Option<Value> {
    let (last, parent_steps) = path.steps().split_last()?;
    let parent = resolve_steps_mut(root, parent_steps).ok().flatten()?;
    match (last, parent) {
        (Step::Field(name), Value::Object(map)) => map.remove(name),
        (Step::Index(index), Value::Array(items)) => {
            let i = normalize_index(*index, items.len())?;
            (i < items.len()).then(|| items.remove(i))
        }
        _ => None,
    }
}
