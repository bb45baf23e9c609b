//! Watch-then-commit transactions
//!
//! A [`Transaction`] records the versions of the keys a caller read
//! (`watch`) and a list of staged [`Operation`]s. [`DocumentStore::commit`]
//! then:
//!
//! 1. locks every watched and touched key, in sorted key order so two
//!    commits can never wait on each other,
//! 2. fails with `Conflict` if any watched key's version moved,
//! 3. applies the staged operations in order,
//! 4. on the first failing operation restores every touched key and
//!    returns `Aborted`.
//!
//! Callers retry on `Conflict`:
//!
//! ```
//! use patchkv::document::{Number, Path, Value};
//! use patchkv::error::StoreError;
//! use patchkv::storage::{DocumentStore, Operation, Transaction};
//!
//! let store = DocumentStore::new();
//! let balance = Path::parse("$.balance").unwrap();
//! store.set("acct:a", &balance, Value::from(100)).unwrap();
//! store.set("acct:b", &balance, Value::from(0)).unwrap();
//!
//! loop {
//!     let mut txn = Transaction::new();
//!     txn.watch(&store, "acct:a");
//!     let funds = store.get("acct:a", &balance).unwrap().and_then(|v| v.as_i64());
//!     if funds < Some(30) {
//!         break;
//!     }
//!     txn.push(Operation::num_incr_by("acct:a", balance.clone(), Number::Int(-30)))
//!         .push(Operation::num_incr_by("acct:b", balance.clone(), Number::Int(30)));
//!     match store.commit(txn) {
//!         Err(StoreError::Conflict { .. }) => continue,
//!         other => {
//!             other.unwrap();
//!             break;
//!         }
//!     }
//! }
//!
//! assert_eq!(store.get("acct:b", &balance).unwrap(), Some(Value::from(30)));
//! ```

use crate::document::{Mutation, Number, Outcome, Path, Value};
use crate::error::{StoreError, StoreResult};
use crate::storage::engine::{DocumentStore, KeyRecord, SlotState};
use parking_lot::RwLockWriteGuard;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::debug;

/// What a staged operation does to its key.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Mutate { path: Path, mutation: Mutation },
    Expire(Duration),
    Persist,
}

/// A single-key operation, staged in a transaction or executed directly.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub key: String,
    pub action: Action,
}

impl Operation {
    pub fn new(key: impl Into<String>, action: Action) -> Self {
        Self {
            key: key.into(),
            action,
        }
    }

    pub fn mutate(key: impl Into<String>, path: Path, mutation: Mutation) -> Self {
        Self::new(key, Action::Mutate { path, mutation })
    }

    pub fn set(key: impl Into<String>, path: Path, value: Value) -> Self {
        Self::mutate(key, path, Mutation::Set(value))
    }

    pub fn delete(key: impl Into<String>, path: Path) -> Self {
        Self::mutate(key, path, Mutation::Delete)
    }

    pub fn num_incr_by(key: impl Into<String>, path: Path, delta: Number) -> Self {
        Self::mutate(key, path, Mutation::NumIncrBy(delta))
    }

    pub fn arr_append(key: impl Into<String>, path: Path, values: Vec<Value>) -> Self {
        Self::mutate(key, path, Mutation::ArrAppend(values))
    }

    pub fn arr_insert(key: impl Into<String>, path: Path, index: i64, values: Vec<Value>) -> Self {
        Self::mutate(key, path, Mutation::ArrInsert { index, values })
    }

    pub fn arr_pop(key: impl Into<String>, path: Path, index: i64) -> Self {
        Self::mutate(key, path, Mutation::ArrPop { index })
    }

    pub fn expire(key: impl Into<String>, ttl: Duration) -> Self {
        Self::new(key, Action::Expire(ttl))
    }

    pub fn persist(key: impl Into<String>) -> Self {
        Self::new(key, Action::Persist)
    }
}

/// Applies an action to a locked record.
pub(crate) fn apply_action(record: &mut KeyRecord, action: Action, now: Instant) -> StoreResult<Outcome> {
    let outcome = match action {
        Action::Mutate { path, mutation } => mutation.apply(&mut record.document, &path)?,
        Action::Expire(ttl) => Outcome::Applied(record.expire(now, ttl)),
        Action::Persist => Outcome::Applied(record.persist()),
    };
    record.settle();
    Ok(outcome)
}

/// Watched versions plus staged operations.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    /// key → version seen at watch time (`None` = absent)
    watched: BTreeMap<String, Option<u64>>,
    operations: Vec<Operation>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the key's current version. Watching a key twice keeps the
    /// first observation.
    pub fn watch(&mut self, store: &DocumentStore, key: &str) -> Option<u64> {
        let version = store.version(key);
        *self.watched.entry(key.to_string()).or_insert(version)
    }

    /// Records a version the caller already holds, e.g. from
    /// [`DocumentStore::get_versioned`].
    pub fn watch_version(&mut self, key: impl Into<String>, version: Option<u64>) {
        self.watched.entry(key.into()).or_insert(version);
    }

    pub fn unwatch(&mut self) {
        self.watched.clear();
    }

    pub fn push(&mut self, operation: Operation) -> &mut Self {
        self.operations.push(operation);
        self
    }

    pub fn watched(&self) -> impl Iterator<Item = &str> {
        self.watched.keys().map(String::as_str)
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl DocumentStore {
    /// Executes a single operation under its key's lock.
    pub fn execute(&self, operation: Operation) -> StoreResult<Outcome> {
        let mut txn = Transaction::new();
        txn.push(operation);
        match self.commit(txn) {
            Ok(mut outcomes) => outcomes.pop().ok_or(StoreError::NotFound),
            Err(StoreError::Aborted { source, .. }) => Err(*source),
            Err(err) => Err(err),
        }
    }

    /// Commits a transaction. See the module docs for the protocol.
    ///
    /// Returns one [`Outcome`] per staged operation.
    pub fn commit(&self, txn: Transaction) -> StoreResult<Vec<Outcome>> {
        let Transaction {
            watched,
            operations,
        } = txn;

        let keys: Vec<String> = watched
            .keys()
            .chain(operations.iter().map(|op| &op.key))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        loop {
            let slots: Vec<_> = keys.iter().map(|key| self.slot_or_insert(key)).collect();
            let mut guards: Vec<_> = slots.iter().map(|slot| slot.state.write()).collect();
            if guards.iter().any(|guard| guard.retired) {
                continue;
            }

            let now = Instant::now();
            for guard in guards.iter_mut() {
                self.reclaim_if_expired(&mut guard.record, now);
            }
            let was_live: Vec<bool> = guards
                .iter()
                .map(|guard| guard.record.document.is_some())
                .collect();

            let result = self.apply_locked(&keys, &mut guards, &watched, operations, now);

            for (i, guard) in guards.iter_mut().enumerate() {
                let is_live = guard.record.document.is_some();
                self.track_liveness(was_live[i], is_live);
                if !is_live {
                    self.retire(&keys[i], &slots[i], guard);
                }
            }
            return result;
        }
    }

    fn apply_locked(
        &self,
        keys: &[String],
        guards: &mut [RwLockWriteGuard<'_, SlotState>],
        watched: &BTreeMap<String, Option<u64>>,
        operations: Vec<Operation>,
        now: Instant,
    ) -> StoreResult<Vec<Outcome>> {
        let position = |key: &str| keys.binary_search_by(|k| k.as_str().cmp(key)).ok();

        for (key, expected) in watched {
            let current = position(key.as_str()).and_then(|i| guards[i].record.live_version(now));
            if current != *expected {
                self.conflict_count.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Watched key changed, rejecting commit");
                return Err(StoreError::Conflict { key: key.clone() });
            }
        }

        let snapshots: Vec<KeyRecord> = guards.iter().map(|guard| guard.record.clone()).collect();
        let mut changed = vec![false; keys.len()];
        let mut outcomes = Vec::with_capacity(operations.len());

        for (index, operation) in operations.into_iter().enumerate() {
            let Some(i) = position(operation.key.as_str()) else {
                continue;
            };
            match apply_action(&mut guards[i].record, operation.action, now) {
                Ok(outcome) => {
                    changed[i] |= outcome.changed();
                    outcomes.push(outcome);
                }
                Err(source) => {
                    for (guard, snapshot) in guards.iter_mut().zip(snapshots) {
                        guard.record = snapshot;
                    }
                    debug!(
                        operation = index,
                        key = %operation.key,
                        error = %source,
                        "Staged operation failed, transaction rolled back"
                    );
                    return Err(StoreError::Aborted {
                        index,
                        source: Box::new(source),
                    });
                }
            }
        }

        for (guard, changed) in guards.iter_mut().zip(changed) {
            if changed {
                guard.record.version = self.next_version();
            }
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn path(text: &str) -> Path {
        Path::parse(text).unwrap()
    }

    #[test]
    fn test_commit_applies_all_operations() {
        let store = DocumentStore::new();
        let mut txn = Transaction::new();
        txn.push(Operation::set("a", path("$.n"), Value::from(1)))
            .push(Operation::num_incr_by("a", path("$.n"), Number::Int(2)))
            .push(Operation::arr_append("b", Path::root(), vec![Value::from(1)]));

        // `b` does not exist yet, so the append aborts the whole batch.
        let err = store.commit(txn).unwrap_err();
        assert!(matches!(err, StoreError::Aborted { index: 2, .. }));
        assert!(!store.exists("a"));
        assert_eq!(store.len(), 0);

        let mut txn = Transaction::new();
        txn.push(Operation::set("a", path("$.n"), Value::from(1)))
            .push(Operation::num_incr_by("a", path("$.n"), Number::Int(2)))
            .push(Operation::set("b", Path::root(), Value::array()))
            .push(Operation::arr_append("b", Path::root(), vec![Value::from(1)]));
        let outcomes = store.commit(txn).unwrap();
        assert_eq!(
            outcomes,
            vec![
                Outcome::Done,
                Outcome::Number(Number::Int(3)),
                Outcome::Done,
                Outcome::Length(1),
            ]
        );
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_rollback_restores_existing_documents() {
        let store = DocumentStore::new();
        store.set("k", &path("$.list"), Value::array()).unwrap();
        store.expire("k", Duration::from_secs(60));
        let before = store.get("k", &Path::root()).unwrap();
        let version = store.version("k");

        let mut txn = Transaction::new();
        txn.push(Operation::arr_append("k", path("$.list"), vec![Value::from(1)]))
            .push(Operation::delete("k", path("$.list[0]")))
            .push(Operation::persist("k"))
            .push(Operation::arr_pop("k", path("$.list"), -1));

        let err = store.commit(txn).unwrap_err();
        assert_eq!(
            err,
            StoreError::Aborted {
                index: 3,
                source: Box::new(StoreError::EmptyContainer)
            }
        );
        assert_eq!(store.get("k", &Path::root()).unwrap(), before);
        assert_eq!(store.version("k"), version);
        assert!(matches!(
            store.ttl("k"),
            Some(crate::storage::Ttl::Remaining(_))
        ));
    }

    #[test]
    fn test_watch_conflict() {
        let store = DocumentStore::new();
        store.set("w", &path("$.n"), Value::from(1)).unwrap();

        let mut txn = Transaction::new();
        txn.watch(&store, "w");
        txn.push(Operation::set("other", Path::root(), Value::from(true)));

        // Someone else writes between the watch and the commit.
        store.num_incr_by("w", &path("$.n"), Number::Int(1)).unwrap();

        assert_eq!(
            store.commit(txn),
            Err(StoreError::Conflict {
                key: "w".to_string()
            })
        );
        assert!(!store.exists("other"));
        assert_eq!(store.stats().conflicts, 1);
    }

    #[test]
    fn test_watch_unchanged_commits() {
        let store = DocumentStore::new();
        store.set("w", &path("$.n"), Value::from(1)).unwrap();

        let mut txn = Transaction::new();
        txn.watch(&store, "w");
        store.get("w", &Path::root()).unwrap();
        store.delete("w", &path("$.missing"));
        txn.push(Operation::num_incr_by("w", path("$.n"), Number::Int(1)));

        assert_eq!(store.commit(txn), Ok(vec![Outcome::Number(Number::Int(2))]));
    }

    #[test]
    fn test_watch_absent_key() {
        let store = DocumentStore::new();

        let mut txn = Transaction::new();
        assert_eq!(txn.watch(&store, "lock"), None);
        txn.push(Operation::set("lock", Path::root(), Value::from("me")));
        assert!(store.commit(txn).is_ok());

        // A second claimant that saw the key absent now conflicts.
        let mut txn = Transaction::new();
        txn.watch_version("lock", None);
        txn.push(Operation::set("lock", Path::root(), Value::from("you")));
        assert!(matches!(store.commit(txn), Err(StoreError::Conflict { .. })));
        assert_eq!(
            store.get("lock", &Path::root()).unwrap(),
            Some(Value::from("me"))
        );
    }

    #[test]
    fn test_watch_sees_expiry_as_change() {
        let store = DocumentStore::new();
        store.set("s", &Path::root(), Value::from(1)).unwrap();
        store.expire("s", Duration::from_millis(5));

        let mut txn = Transaction::new();
        assert!(txn.watch(&store, "s").is_some());
        thread::sleep(Duration::from_millis(15));
        txn.push(Operation::set("s", Path::root(), Value::from(2)));

        assert!(matches!(store.commit(txn), Err(StoreError::Conflict { .. })));
    }

    #[test]
    fn test_execute_single_operation() {
        let store = DocumentStore::new();
        assert_eq!(
            store.execute(Operation::set("x", path("$.a"), Value::from(1))),
            Ok(Outcome::Done)
        );
        assert_eq!(
            store.execute(Operation::arr_pop("x", path("$.a"), -1)),
            Err(StoreError::TypeMismatch {
                expected: "array",
                found: "integer"
            })
        );
        assert_eq!(
            store.execute(Operation::expire("x", Duration::from_secs(5))),
            Ok(Outcome::Applied(true))
        );
        assert_eq!(
            store.execute(Operation::delete("x", Path::root())),
            Ok(Outcome::Removed(1))
        );
        assert_eq!(
            store.execute(Operation::delete("x", Path::root())),
            Ok(Outcome::Removed(0))
        );
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_optimistic_retry_loop_under_contention() {
        let store = Arc::new(DocumentStore::new());
        let balance = path("$.balance");
        store.set("acct", &balance, Value::from(0)).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let balance = balance.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        loop {
                            let mut txn = Transaction::new();
                            let (value, version) =
                                store.get_versioned("acct", &balance).unwrap().unwrap();
                            txn.watch_version("acct", Some(version));
                            let next = value.as_i64().unwrap() + 1;
                            txn.push(Operation::set("acct", balance.clone(), Value::from(next)));
                            match store.commit(txn) {
                                Ok(_) => break,
                                Err(StoreError::Conflict { .. }) => continue,
                                Err(err) => panic!("unexpected error {err}"),
                            }
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get("acct", &balance).unwrap(), Some(Value::from(200)));
    }

    #[test]
    fn test_crossing_commits_do_not_deadlock() {
        let store = Arc::new(DocumentStore::new());
        store.set("x", &Path::root(), Value::from(0)).unwrap();
        store.set("y", &Path::root(), Value::from(0)).unwrap();

        let handles: Vec<_> = [("x", "y"), ("y", "x")]
            .into_iter()
            .map(|(first, second)| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..200 {
                        let mut txn = Transaction::new();
                        txn.push(Operation::num_incr_by(first, Path::root(), Number::Int(1)))
                            .push(Operation::num_incr_by(second, Path::root(), Number::Int(1)));
                        store.commit(txn).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get("x", &Path::root()).unwrap(), Some(Value::from(400)));
        assert_eq!(store.get("y", &Path::root()).unwrap(), Some(Value::from(400)));
    }
}
