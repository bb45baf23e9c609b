//! Mutation Engine
//!
//! Each verb takes the document slot of one key (`None` when the key is
//! absent) and applies a single change. Every verb validates first and
//! mutates last, so an `Err` always leaves the document exactly as it was.
//!
//! The [`Mutation`] enum is the data form of the same verbs. Single-key
//! store calls and staged transaction operations both go through
//! [`Mutation::apply`].

use super::path::Path;
use super::resolver::{self, placeholder};
use super::value::{Number, Value};
use crate::error::{StoreError, StoreResult};

/// Replaces the node at `path`, creating missing intermediates.
///
/// Setting the root replaces the whole document. Setting a deeper path on
/// an absent document creates the root container from the first step.
pub fn set(document: &mut Option<Value>, path: &Path, value: Value) -> StoreResult<()> {
    if path.is_root() {
        *document = Some(value);
        return Ok(());
    }

    match document {
        Some(root) => {
            *resolver::resolve_or_create(root, path)? = value;
        }
        None => {
            let mut root = placeholder(path.steps().first());
            *resolver::resolve_or_create(&mut root, path)? = value;
            *document = Some(root);
        }
    }
    Ok(())
}

/// Removes the node at `path` and returns how many nodes were removed.
pub fn delete(document: &mut Option<Value>, path: &Path) -> usize {
    if path.is_root() {
        return usize::from(document.take().is_some());
    }
    document
        .as_mut()
        .and_then(|root| resolver::remove(root, path))
        .map_or(0, |_| 1)
}

/// Resolves an existing node or reports `NotFound`.
fn target<'a>(document: &'a mut Option<Value>, path: &Path) -> StoreResult<&'a mut Value> {
    let root = document.as_mut().ok_or(StoreError::NotFound)?;
    resolver::resolve_mut(root, path)?.ok_or(StoreError::NotFound)
}

fn sequence<'a>(node: &'a mut Value) -> StoreResult<&'a mut Vec<Value>> {
    match node {
        Value::Array(items) => Ok(items),
        other => Err(StoreError::TypeMismatch {
            expected: "array",
            found: other.kind(),
        }),
    }
}

/// Adds `delta` to the number at `path` and returns the new value.
pub fn num_incr_by(document: &mut Option<Value>, path: &Path, delta: Number) -> StoreResult<Number> {
    match target(document, path)? {
        Value::Number(current) => {
            let next = current.checked_add(delta)?;
            *current = next;
            Ok(next)
        }
        other => Err(StoreError::TypeMismatch {
            expected: "number",
            found: other.kind(),
        }),
    }
}

/// Appends `values` to the array at `path` and returns the new length.
pub fn arr_append(document: &mut Option<Value>, path: &Path, values: Vec<Value>) -> StoreResult<usize> {
    let items = sequence(target(document, path)?)?;
    items.extend(values);
    Ok(items.len())
}

/// Inserts `values` before `index` and returns the new length.
///
/// Negative indices count from the end; the position is clamped to
/// `0..=len`, so far-negative prepends and past-the-end appends.
pub fn arr_insert(
    document: &mut Option<Value>,
    path: &Path,
    index: i64,
    values: Vec<Value>,
) -> StoreResult<usize> {
    let items = sequence(target(document, path)?)?;
    let at = clamp_index(index, items.len(), items.len());
    items.splice(at..at, values);
    Ok(items.len())
}

/// Removes and returns the element at `index` (clamped to the array).
pub fn arr_pop(document: &mut Option<Value>, path: &Path, index: i64) -> StoreResult<Value> {
    let items = sequence(target(document, path)?)?;
    if items.is_empty() {
        return Err(StoreError::EmptyContainer);
    }
    let at = clamp_index(index, items.len(), items.len() - 1);
    Ok(items.remove(at))
}

fn clamp_index(index: i64, len: usize, max: usize) -> usize {
    match resolver::normalize_index(index, len) {
        Some(i) => i.min(max),
        None => 0,
    }
}

/// A single staged change to one key's document.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Set(Value),
    Delete,
    NumIncrBy(Number),
    ArrAppend(Vec<Value>),
    ArrInsert { index: i64, values: Vec<Value> },
    ArrPop { index: i64 },
}

/// What a successful operation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Set succeeded
    Done,
    /// Nodes removed by a delete
    Removed(usize),
    /// Result of a numeric increment
    Number(Number),
    /// Array length after an append or insert
    Length(usize),
    /// Element removed by a pop
    Popped(Value),
    /// Whether an expire/persist took effect
    Applied(bool),
}

impl Outcome {
    /// Whether the operation changed the record (and so bumps its version).
    pub fn changed(&self) -> bool {
        !matches!(self, Outcome::Removed(0) | Outcome::Applied(false))
    }
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::Set(_) => "set",
            Mutation::Delete => "delete",
            Mutation::NumIncrBy(_) => "numincrby",
            Mutation::ArrAppend(_) => "arrappend",
            Mutation::ArrInsert { .. } => "arrinsert",
            Mutation::ArrPop { .. } => "arrpop",
        }
    }

    pub fn apply(self, document: &mut Option<Value>, path: &Path) -> StoreResult<Outcome> {
        match self {
            Mutation::Set(value) => set(document, path, value).map(|()| Outcome::Done),
            Mutation::Delete => Ok(Outcome::Removed(delete(document, path))),
            Mutation::NumIncrBy(delta) => num_incr_by(document, path, delta).map(Outcome::Number),
            Mutation::ArrAppend(values) => arr_append(document, path, values).map(Outcome::Length),
            Mutation::ArrInsert { index, values } => {
                arr_insert(document, path, index, values).map(Outcome::Length)
            }
            Mutation::ArrPop { index } => arr_pop(document, path, index).map(Outcome::Popped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn doc(text: &str) -> Option<Value> {
        Some(Value::from_json(text).unwrap())
    }

    fn path(text: &str) -> Path {
        Path::parse(text).unwrap()
    }

    #[test]
    fn test_set_creates_document() {
        let mut document = None;
        set(&mut document, &path("$.profile.name"), Value::from("Ada")).unwrap();
        assert_eq!(document, doc(r#"{"profile":{"name":"Ada"}}"#));

        let mut document = None;
        set(&mut document, &path("[1]"), Value::from(true)).unwrap();
        assert_eq!(document, doc("[null,true]"));
    }

    #[test]
    fn test_set_failure_keeps_absent_document_absent() {
        let mut document = None;
        assert!(set(&mut document, &path("[-1]"), Value::from(1)).is_err());
        assert_eq!(document, None);
    }

    #[test]
    fn test_set_root_replaces() {
        let mut document = doc(r#"{"a":1}"#);
        set(&mut document, &Path::root(), Value::from(5)).unwrap();
        assert_eq!(document, doc("5"));
    }

    #[test]
    fn test_set_into_scalar_is_key_type() {
        let mut document = doc("7");
        let err = set(&mut document, &path("$.a"), Value::from(1)).unwrap_err();
        assert!(matches!(err, StoreError::KeyType { found: "integer", .. }));
        assert_eq!(document, doc("7"));
    }

    #[test]
    fn test_delete_counts() {
        let mut document = doc(r#"{"a":{"b":[1,2]}}"#);
        assert_eq!(delete(&mut document, &path("$.a.b[0]")), 1);
        assert_eq!(delete(&mut document, &path("$.a.b[5]")), 0);
        assert_eq!(delete(&mut document, &path("$.nope")), 0);
        assert_eq!(delete(&mut document, &path("$.a[0]")), 0);
        assert_eq!(document, doc(r#"{"a":{"b":[2]}}"#));
        assert_eq!(delete(&mut document, &Path::root()), 1);
        assert_eq!(document, None);
        assert_eq!(delete(&mut document, &Path::root()), 0);
    }

    #[test]
    fn test_num_incr_by() {
        let mut document = doc(r#"{"n":1,"s":"x"}"#);
        assert_eq!(
            num_incr_by(&mut document, &path("$.n"), Number::Int(4)),
            Ok(Number::Int(5))
        );
        assert_eq!(
            num_incr_by(&mut document, &path("$.n"), Number::Float(0.5)),
            Ok(Number::Float(5.5))
        );
        assert_eq!(
            num_incr_by(&mut document, &path("$.s"), Number::Int(1)),
            Err(StoreError::TypeMismatch {
                expected: "number",
                found: "string"
            })
        );
        assert_eq!(
            num_incr_by(&mut document, &path("$.missing"), Number::Int(1)),
            Err(StoreError::NotFound)
        );
        assert_eq!(
            num_incr_by(&mut None, &Path::root(), Number::Int(1)),
            Err(StoreError::NotFound)
        );
    }

    #[test]
    fn test_overflow_leaves_value() {
        let mut document = Some(Value::from(i64::MAX));
        assert_eq!(
            num_incr_by(&mut document, &Path::root(), Number::Int(1)),
            Err(StoreError::Overflow)
        );
        assert_eq!(document, Some(Value::from(i64::MAX)));
    }

    #[test]
    fn test_array_verbs() {
        let mut document = doc(r#"{"list":[1,2,3]}"#);
        let list = path("$.list");

        assert_eq!(arr_append(&mut document, &list, vec![Value::from(4)]), Ok(4));
        assert_eq!(
            arr_insert(&mut document, &list, 0, vec![Value::from(0)]),
            Ok(5)
        );
        assert_eq!(
            arr_insert(&mut document, &list, -1, vec![Value::from("x")]),
            Ok(6)
        );
        assert_eq!(document, doc(r#"{"list":[0,1,2,3,"x",4]}"#));

        assert_eq!(arr_pop(&mut document, &list, -1), Ok(Value::from(4)));
        assert_eq!(arr_pop(&mut document, &list, 0), Ok(Value::from(0)));
        assert_eq!(document, doc(r#"{"list":[1,2,3,"x"]}"#));
    }

    #[test]
    fn test_insert_clamps() {
        let mut document = doc("[1,2]");
        let root = Path::root();
        arr_insert(&mut document, &root, 99, vec![Value::from(3)]).unwrap();
        arr_insert(&mut document, &root, -99, vec![Value::from(0)]).unwrap();
        assert_eq!(document, doc("[0,1,2,3]"));
    }

    #[test]
    fn test_pop_clamps_and_empty() {
        let mut document = doc("[1,2,3]");
        let root = Path::root();
        assert_eq!(arr_pop(&mut document, &root, 99), Ok(Value::from(3)));
        assert_eq!(arr_pop(&mut document, &root, -99), Ok(Value::from(1)));
        assert_eq!(arr_pop(&mut document, &root, 0), Ok(Value::from(2)));
        assert_eq!(
            arr_pop(&mut document, &root, -1),
            Err(StoreError::EmptyContainer)
        );
        assert_eq!(document, doc("[]"));
    }

    #[test]
    fn test_array_verbs_on_non_array() {
        let mut document = doc(r#"{"o":{}}"#);
        assert_eq!(
            arr_append(&mut document, &path("$.o"), vec![Value::Null]),
            Err(StoreError::TypeMismatch {
                expected: "array",
                found: "object"
            })
        );
        assert_eq!(document, doc(r#"{"o":{}}"#));
    }

    #[test]
    fn test_outcome_changed() {
        assert!(Outcome::Done.changed());
        assert!(Outcome::Removed(1).changed());
        assert!(!Outcome::Removed(0).changed());
        assert!(!Outcome::Applied(false).changed());
    }

    fn scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-z]{0,8}".prop_map(Value::from),
        ]
    }

    proptest! {
        #[test]
        fn prop_set_then_get_round_trips(
            fields in prop::collection::vec("[a-z]{1,4}", 1..4),
            value in scalar(),
        ) {
            let mut target = Path::root();
            for field in &fields {
                target = target.field(field.clone());
            }
            let mut document = Some(Value::object());
            set(&mut document, &target, value.clone()).unwrap();
            let root = document.as_ref().unwrap();
            prop_assert_eq!(resolver::resolve(root, &target).unwrap(), Some(&value));
        }

        #[test]
        fn prop_increments_compose(
            start in -1_000_000i64..1_000_000,
            d1 in -1_000_000i64..1_000_000,
            d2 in -1_000_000i64..1_000_000,
        ) {
            let mut twice = Some(Value::from(start));
            num_incr_by(&mut twice, &Path::root(), Number::Int(d1)).unwrap();
            num_incr_by(&mut twice, &Path::root(), Number::Int(d2)).unwrap();

            let mut once = Some(Value::from(start));
            num_incr_by(&mut once, &Path::root(), Number::Int(d1 + d2)).unwrap();

            prop_assert_eq!(twice, once);
        }

        #[test]
        fn prop_append_then_pop_restores(
            items in prop::collection::vec(any::<i64>(), 0..8),
            pushed in scalar(),
        ) {
            let original = Value::Array(items.into_iter().map(Value::from).collect());
            let mut document = Some(original.clone());
            arr_append(&mut document, &Path::root(), vec![pushed.clone()]).unwrap();
            let popped = arr_pop(&mut document, &Path::root(), -1).unwrap();
            prop_assert_eq!(popped, pushed);
            prop_assert_eq!(document, Some(original));
        }
    }
}
