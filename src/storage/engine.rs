//! Document Store
//!
//! A thread-safe map from string keys to JSON-like documents with per-key
//! locking, lazy expiry and optimistic-lock versions.
//!
//! ## Design Decisions
//!
//! 1. **Sharded key maps**: keys hash onto 64 shards, so creating and
//!    retiring keys rarely contend.
//! 2. **Per-key slots**: each key owns a slot behind its own `RwLock`. A
//!    mutation holds only that lock for its whole duration, so operations
//!    on different keys run in parallel and readers of a key never see a
//!    half-applied change.
//! 3. **Lazy expiry**: every access checks the deadline. The background
//!    sweeper reclaims keys that are never touched again.
//! 4. **Versions**: every successful mutation stamps the record with a
//!    fresh number from a store-wide counter. Watch-then-commit compares
//!    these stamps.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        DocumentStore                         │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐       ┌──────────┐   │
//! │  │ Shard 0  │ │ Shard 1  │ │ Shard 2  │  ...  │ Shard 63 │   │
//! │  │ RwLock<  │ │ RwLock<  │ │ RwLock<  │       │ RwLock<  │   │
//! │  │ HashMap> │ │ HashMap> │ │ HashMap> │       │ HashMap> │   │
//! │  └────┬─────┘ └──────────┘ └──────────┘       └──────────┘   │
//! │       │ key → Arc<Slot>                                      │
//! │       ▼                                                      │
//! │  ┌─────────────────────────────┐                             │
//! │  │ Slot: RwLock<KeyRecord>     │  document, expiration,      │
//! │  │                             │  version                    │
//! │  └─────────────────────────────┘                             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lock order is always slot first, shard second. Shard locks are held
//! only to look up, insert or remove a slot and never while waiting on a
//! slot. A slot whose key became absent is marked retired and unlinked
//! from its shard; anyone who grabbed it just before retries the lookup.

use crate::document::{mutation, resolver, Number, Path, Value};
use crate::error::{StoreError, StoreResult};
use crate::storage::expiry::{Expiration, Ttl};
use crate::storage::glob::GlobPattern;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Number of shards in the key maps.
pub const NUM_SHARDS: usize = 64;

/// Everything the store knows about one key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyRecord {
    /// `None` while the key is absent
    pub document: Option<Value>,
    pub expiration: Expiration,
    pub version: u64,
}

impl KeyRecord {
    /// Whether the key holds a document that has not expired.
    #[inline]
    pub fn is_live(&self, now: Instant) -> bool {
        self.document.is_some() && !self.expiration.is_expired(now)
    }

    /// The version a watcher would observe: `None` for an absent key.
    pub fn live_version(&self, now: Instant) -> Option<u64> {
        self.is_live(now).then_some(self.version)
    }

    /// Drops the document if its deadline has passed.
    pub(crate) fn purge_expired(&mut self, now: Instant) -> bool {
        if self.document.is_some() && self.expiration.is_expired(now) {
            self.document = None;
            self.expiration = Expiration::Never;
            true
        } else {
            false
        }
    }

    /// A deleted document takes its TTL with it.
    pub(crate) fn settle(&mut self) {
        if self.document.is_none() {
            self.expiration = Expiration::Never;
        }
    }

    pub(crate) fn expire(&mut self, now: Instant, ttl: Duration) -> bool {
        match Expiration::after(now, ttl) {
            Some(expiration) if self.document.is_some() => {
                self.expiration = expiration;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn expire_at(&mut self, deadline: Instant) -> bool {
        if self.document.is_none() {
            return false;
        }
        self.expiration = Expiration::At(deadline);
        true
    }

    pub(crate) fn persist(&mut self) -> bool {
        if self.document.is_none() || self.expiration == Expiration::Never {
            return false;
        }
        self.expiration = Expiration::Never;
        true
    }
}

#[derive(Debug, Default)]
pub(crate) struct SlotState {
    pub(crate) record: KeyRecord,
    /// Set once the slot has been unlinked from its shard.
    pub(crate) retired: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Slot {
    pub(crate) state: RwLock<SlotState>,
}

type Shard = RwLock<HashMap<String, Arc<Slot>>>;

/// The document store.
///
/// Wrap it in an `Arc` to share it between tasks and threads; every method
/// takes `&self`.
///
/// # Example
///
/// ```
/// use patchkv::document::{Number, Path, Value};
/// use patchkv::storage::DocumentStore;
///
/// let store = DocumentStore::new();
/// let visits = Path::parse("$.stats.visits").unwrap();
///
/// store.set("user:1", &visits, Value::from(0)).unwrap();
/// store.num_incr_by("user:1", &visits, Number::Int(1)).unwrap();
///
/// assert_eq!(store.get("user:1", &visits).unwrap(), Some(Value::from(1)));
/// ```
pub struct DocumentStore {
    shards: Vec<Shard>,

    /// Source of record versions
    versions: AtomicU64,

    /// Number of live keys (expired-but-unreclaimed keys still count)
    key_count: AtomicU64,

    read_count: AtomicU64,
    write_count: AtomicU64,
    delete_count: AtomicU64,
    expired_count: AtomicU64,
    pub(crate) conflict_count: AtomicU64,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("shards", &self.shards.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .field("read_count", &self.read_count.load(Ordering::Relaxed))
            .field("write_count", &self.write_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            shards: (0..NUM_SHARDS).map(|_| Shard::default()).collect(),
            versions: AtomicU64::new(0),
            key_count: AtomicU64::new(0),
            read_count: AtomicU64::new(0),
            write_count: AtomicU64::new(0),
            delete_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
            conflict_count: AtomicU64::new(0),
        }
    }

    #[inline]
    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    #[inline]
    fn shard(&self, key: &str) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    fn lookup(&self, key: &str) -> Option<Arc<Slot>> {
        self.shard(key).read().get(key).cloned()
    }

    pub(crate) fn slot_or_insert(&self, key: &str) -> Arc<Slot> {
        if let Some(slot) = self.lookup(key) {
            return slot;
        }
        Arc::clone(self.shard(key).write().entry(key.to_string()).or_default())
    }

    /// Unlinks a vacant slot. Must be called with the slot's write lock held.
    pub(crate) fn retire(&self, key: &str, slot: &Arc<Slot>, state: &mut SlotState) {
        state.retired = true;
        let mut map = self.shard(key).write();
        if map.get(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            map.remove(key);
        }
    }

    pub(crate) fn next_version(&self) -> u64 {
        self.versions.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Keeps `key_count` in step with a record going from `was` to `is` live.
    pub(crate) fn track_liveness(&self, was: bool, is: bool) {
        match (was, is) {
            (false, true) => {
                self.key_count.fetch_add(1, Ordering::Relaxed);
            }
            (true, false) => {
                self.key_count.fetch_sub(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    /// Drops an expired document under a held slot lock.
    pub(crate) fn reclaim_if_expired(&self, record: &mut KeyRecord, now: Instant) {
        if record.purge_expired(now) {
            self.key_count.fetch_sub(1, Ordering::Relaxed);
            self.expired_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Runs `f` against a live record under the slot's read lock.
    fn read<T>(&self, key: &str, f: impl FnOnce(&KeyRecord) -> T) -> Option<T> {
        self.read_count.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        loop {
            let slot = self.lookup(key)?;
            let state = slot.state.read();
            if state.retired {
                continue;
            }
            return state.record.is_live(now).then(|| f(&state.record));
        }
    }

    /// Runs `f` under the key's exclusive lock.
    ///
    /// `f` returns its result and whether it changed the record. A change
    /// stamps a new version; a record left without a document is retired.
    fn update<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut KeyRecord, Instant) -> StoreResult<(T, bool)>,
    ) -> StoreResult<T> {
        self.write_count.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        loop {
            let slot = self.slot_or_insert(key);
            let mut state = slot.state.write();
            if state.retired {
                continue;
            }

            self.reclaim_if_expired(&mut state.record, now);
            let was_live = state.record.document.is_some();

            let result = f(&mut state.record, now);
            state.record.settle();
            if let Ok((_, true)) = &result {
                state.record.version = self.next_version();
            }

            let is_live = state.record.document.is_some();
            self.track_liveness(was_live, is_live);
            if !is_live {
                self.retire(key, &slot, &mut state);
            }
            return result.map(|(value, _)| value);
        }
    }

    // ========================================================================
    // DOCUMENT OPERATIONS
    // ========================================================================

    /// Replaces the node at `path`, creating the key and any missing
    /// intermediate containers.
    pub fn set(&self, key: &str, path: &Path, value: Value) -> StoreResult<()> {
        self.update(key, |record, _| {
            mutation::set(&mut record.document, path, value).map(|()| ((), true))
        })
    }

    /// Returns a copy of the node at `path`.
    ///
    /// `Ok(None)` if the key is absent or expired or the path does not
    /// resolve. A step of the wrong kind is a `PathType` error.
    pub fn get(&self, key: &str, path: &Path) -> StoreResult<Option<Value>> {
        self.read(key, |record| read_node(record, path, Value::clone))
            .transpose()
            .map(Option::flatten)
    }

    /// Like [`get`](Self::get), also returning the record version the value
    /// was read at. Feed the version to
    /// [`Transaction::watch_version`](crate::storage::Transaction::watch_version).
    pub fn get_versioned(&self, key: &str, path: &Path) -> StoreResult<Option<(Value, u64)>> {
        self.read(key, |record| {
            read_node(record, path, |node| (node.clone(), record.version))
        })
        .transpose()
        .map(Option::flatten)
    }

    /// Removes the node at `path` and returns the number of nodes removed.
    ///
    /// Deleting the root removes the key. A path that does not resolve
    /// removes nothing.
    pub fn delete(&self, key: &str, path: &Path) -> usize {
        let removed = self
            .update(key, |record, _| {
                let removed = mutation::delete(&mut record.document, path);
                Ok((removed, removed > 0))
            })
            .unwrap_or(0);
        self.delete_count.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Removes whole keys and returns how many existed.
    pub fn delete_many(&self, keys: &[String]) -> usize {
        keys.iter()
            .map(|key| self.delete(key, &Path::root()))
            .sum()
    }

    /// Adds `delta` to the number at `path` and returns the result.
    pub fn num_incr_by(&self, key: &str, path: &Path, delta: Number) -> StoreResult<Number> {
        self.update(key, |record, _| {
            mutation::num_incr_by(&mut record.document, path, delta).map(|n| (n, true))
        })
    }

    /// Appends to the array at `path` and returns its new length.
    pub fn arr_append(&self, key: &str, path: &Path, values: Vec<Value>) -> StoreResult<usize> {
        self.update(key, |record, _| {
            mutation::arr_append(&mut record.document, path, values).map(|n| (n, true))
        })
    }

    /// Inserts into the array at `path` and returns its new length.
    pub fn arr_insert(
        &self,
        key: &str,
        path: &Path,
        index: i64,
        values: Vec<Value>,
    ) -> StoreResult<usize> {
        self.update(key, |record, _| {
            mutation::arr_insert(&mut record.document, path, index, values).map(|n| (n, true))
        })
    }

    /// Removes and returns an element of the array at `path`.
    pub fn arr_pop(&self, key: &str, path: &Path, index: i64) -> StoreResult<Value> {
        self.update(key, |record, _| {
            mutation::arr_pop(&mut record.document, path, index).map(|v| (v, true))
        })
    }

    /// Length of the array at `path`, `None` if it does not resolve.
    pub fn arr_len(&self, key: &str, path: &Path) -> StoreResult<Option<usize>> {
        let resolved = self.read(key, |record| {
            read_node(record, path, |node| match node {
                Value::Array(items) => Ok(items.len()),
                other => Err(StoreError::TypeMismatch {
                    expected: "array",
                    found: other.kind(),
                }),
            })
        });
        match resolved {
            Some(found) => found?.transpose(),
            None => Ok(None),
        }
    }

    /// Kind name of the node at `path`, `None` if it does not resolve.
    pub fn type_of(&self, key: &str, path: &Path) -> StoreResult<Option<&'static str>> {
        self.read(key, |record| read_node(record, path, Value::kind))
            .transpose()
            .map(Option::flatten)
    }

    // ========================================================================
    // KEYSPACE OPERATIONS
    // ========================================================================

    pub fn exists(&self, key: &str) -> bool {
        self.read(key, |_| ()).is_some()
    }

    pub fn exists_many(&self, keys: &[String]) -> usize {
        keys.iter().filter(|key| self.exists(key)).count()
    }

    /// The key's current version, `None` if it is absent.
    pub fn version(&self, key: &str) -> Option<u64> {
        self.read(key, |record| record.version)
    }

    /// Sets a time-to-live. Returns `false` if the key does not exist or the
    /// deadline is too far out to represent, leaving the key unchanged.
    ///
    /// A zero TTL makes the key absent immediately.
    pub fn expire(&self, key: &str, ttl: Duration) -> bool {
        self.update(key, |record, now| {
            let applied = record.expire(now, ttl);
            Ok((applied, applied))
        })
        .unwrap_or(false)
    }

    /// Sets an absolute deadline. Returns `false` if the key does not exist.
    pub fn expire_at(&self, key: &str, deadline: Instant) -> bool {
        self.update(key, |record, _| {
            let applied = record.expire_at(deadline);
            Ok((applied, applied))
        })
        .unwrap_or(false)
    }

    /// Removes the TTL. Returns `false` if the key is absent or had none.
    pub fn persist(&self, key: &str) -> bool {
        self.update(key, |record, _| {
            let applied = record.persist();
            Ok((applied, applied))
        })
        .unwrap_or(false)
    }

    /// TTL of a live key, `None` if the key does not exist.
    pub fn ttl(&self, key: &str) -> Option<Ttl> {
        let now = Instant::now();
        self.read(key, |record| match record.expiration.remaining(now) {
            Some(left) => Ttl::Remaining(left),
            None => Ttl::Persistent,
        })
    }

    /// Live keys matching a glob pattern, sorted.
    ///
    /// **Warning**: scans every key.
    pub fn keys(&self, pattern: &str) -> Vec<String> {
        let pattern = GlobPattern::new(pattern);
        let now = Instant::now();
        let mut result: Vec<String> = self
            .snapshot_slots()
            .into_iter()
            .filter(|(key, slot)| {
                let state = slot.state.read();
                !state.retired && state.record.is_live(now) && pattern.matches(key)
            })
            .map(|(key, _)| key)
            .collect();
        result.sort_unstable();
        result
    }

    /// Removes every key.
    pub fn flush(&self) {
        for shard in &self.shards {
            let drained: Vec<Arc<Slot>> = shard.write().drain().map(|(_, slot)| slot).collect();
            for slot in drained {
                let mut state = slot.state.write();
                if state.record.document.take().is_some() {
                    self.key_count.fetch_sub(1, Ordering::Relaxed);
                }
                state.record.settle();
                state.retired = true;
            }
        }
    }

    /// Number of keys, counting expired keys not reclaimed yet.
    pub fn len(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.key_count.load(Ordering::Relaxed),
            reads: self.read_count.load(Ordering::Relaxed),
            writes: self.write_count.load(Ordering::Relaxed),
            deletes: self.delete_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
            conflicts: self.conflict_count.load(Ordering::Relaxed),
        }
    }

    /// Reclaims every expired key and returns how many were dropped.
    ///
    /// Called by the background expiry sweeper.
    pub fn purge_expired(&self) -> u64 {
        let now = Instant::now();
        let mut purged = 0;

        for (key, slot) in self.snapshot_slots() {
            let mut state = slot.state.write();
            if state.retired || !state.record.expiration.is_expired(now) {
                continue;
            }
            if state.record.purge_expired(now) {
                purged += 1;
                self.retire(&key, &slot, &mut state);
            }
        }

        if purged > 0 {
            self.key_count.fetch_sub(purged, Ordering::Relaxed);
            self.expired_count.fetch_add(purged, Ordering::Relaxed);
        }
        purged
    }

    /// Copies out every (key, slot) pair, holding each shard lock briefly.
    fn snapshot_slots(&self) -> Vec<(String, Arc<Slot>)> {
        self.shards
            .iter()
            .flat_map(|shard| {
                shard
                    .read()
                    .iter()
                    .map(|(key, slot)| (key.clone(), Arc::clone(slot)))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

/// Resolves `path` in a live record and maps the node.
fn read_node<T>(
    record: &KeyRecord,
    path: &Path,
    f: impl FnOnce(&Value) -> T,
) -> StoreResult<Option<T>> {
    match &record.document {
        Some(root) => Ok(resolver::resolve(root, path)?.map(f)),
        None => Ok(None),
    }
}

/// Store statistics.
#[derive(Debug, Clone, Default)]
pub struct StorageStats {
    pub keys: u64,
    pub reads: u64,
    pub writes: u64,
    pub deletes: u64,
    pub expired: u64,
    pub conflicts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn path(text: &str) -> Path {
        Path::parse(text).unwrap()
    }

    fn json(text: &str) -> Value {
        Value::from_json(text).unwrap()
    }

    #[test]
    fn test_set_and_get() {
        let store = DocumentStore::new();
        store
            .set("user:1", &Path::root(), json(r#"{"name":"Ariz","tags":[]}"#))
            .unwrap();

        assert_eq!(
            store.get("user:1", &path("$.name")).unwrap(),
            Some(Value::from("Ariz"))
        );
        assert_eq!(store.get("user:1", &path("$.age")).unwrap(), None);
        assert_eq!(store.get("nobody", &Path::root()).unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_does_not_create() {
        let store = DocumentStore::new();
        assert_eq!(store.get("ghost", &path("$.a.b")).unwrap(), None);
        assert!(!store.exists("ghost"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_nested_set_creates_key() {
        let store = DocumentStore::new();
        store
            .set("cfg", &path("$.features.beta[1]"), Value::from(true))
            .unwrap();
        assert_eq!(
            store.get("cfg", &Path::root()).unwrap(),
            Some(json(r#"{"features":{"beta":[null,true]}}"#))
        );
    }

    #[test]
    fn test_failed_write_on_absent_key_leaves_nothing() {
        let store = DocumentStore::new();
        assert_eq!(
            store.num_incr_by("ghost", &path("$.n"), Number::Int(1)),
            Err(StoreError::NotFound)
        );
        assert!(!store.exists("ghost"));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_set_into_scalar() {
        let store = DocumentStore::new();
        store.set("k", &path("$.name"), Value::from("x")).unwrap();
        let version = store.version("k");
        assert!(matches!(
            store.set("k", &path("$.name.first"), Value::from("y")),
            Err(StoreError::KeyType { .. })
        ));
        assert_eq!(store.version("k"), version);
    }

    #[test]
    fn test_delete() {
        let store = DocumentStore::new();
        store
            .set("doc", &Path::root(), json(r#"{"a":1,"b":[1,2]}"#))
            .unwrap();

        assert_eq!(store.delete("doc", &path("$.a")), 1);
        assert_eq!(store.delete("doc", &path("$.a")), 0);
        assert_eq!(store.delete("doc", &path("$.b[9]")), 0);
        assert_eq!(store.delete("missing", &path("$.x")), 0);
        assert!(store.exists("doc"));

        assert_eq!(store.delete("doc", &Path::root()), 1);
        assert!(!store.exists("doc"));
        assert_eq!(store.len(), 0);
        assert_eq!(store.stats().deletes, 2);
    }

    #[test]
    fn test_delete_many_and_exists_many() {
        let store = DocumentStore::new();
        for key in ["a", "b", "c"] {
            store.set(key, &Path::root(), Value::from(1)).unwrap();
        }
        let keys: Vec<String> = ["a", "b", "zz"].iter().map(|k| k.to_string()).collect();
        assert_eq!(store.exists_many(&keys), 2);
        assert_eq!(store.delete_many(&keys), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_num_incr_by() {
        let store = DocumentStore::new();
        store.set("ctr", &path("$.hits"), Value::from(10)).unwrap();
        assert_eq!(
            store.num_incr_by("ctr", &path("$.hits"), Number::Int(5)),
            Ok(Number::Int(15))
        );
        assert_eq!(
            store.num_incr_by("ctr", &path("$.hits"), Number::Float(0.5)),
            Ok(Number::Float(15.5))
        );
        store.set("ctr", &path("$.label"), Value::from("x")).unwrap();
        assert!(matches!(
            store.num_incr_by("ctr", &path("$.label"), Number::Int(1)),
            Err(StoreError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_array_operations() {
        let store = DocumentStore::new();
        let list = path("$.list");
        store.set("arr", &list, json("[1,2]")).unwrap();

        assert_eq!(store.arr_append("arr", &list, vec![Value::from(3)]), Ok(3));
        assert_eq!(
            store.arr_insert("arr", &list, 0, vec![Value::from(0)]),
            Ok(4)
        );
        assert_eq!(store.arr_len("arr", &list), Ok(Some(4)));
        assert_eq!(store.arr_pop("arr", &list, -1), Ok(Value::from(3)));
        assert_eq!(store.get("arr", &list).unwrap(), Some(json("[0,1,2]")));
        assert_eq!(store.arr_len("arr", &path("$.nope")), Ok(None));
        assert!(matches!(
            store.arr_len("arr", &Path::root()),
            Err(StoreError::TypeMismatch { .. })
        ));

        store.set("empty", &Path::root(), json("[]")).unwrap();
        assert_eq!(
            store.arr_pop("empty", &Path::root(), -1),
            Err(StoreError::EmptyContainer)
        );
    }

    #[test]
    fn test_type_of() {
        let store = DocumentStore::new();
        store
            .set("t", &Path::root(), json(r#"{"n":1.5,"s":"x","l":[]}"#))
            .unwrap();
        assert_eq!(store.type_of("t", &Path::root()), Ok(Some("object")));
        assert_eq!(store.type_of("t", &path("$.n")), Ok(Some("number")));
        assert_eq!(store.type_of("t", &path("$.l")), Ok(Some("array")));
        assert_eq!(store.type_of("t", &path("$.zz")), Ok(None));
        assert!(store.type_of("t", &path("$.l.x")).is_err());
    }

    #[test]
    fn test_versions_move_on_change_only() {
        let store = DocumentStore::new();
        assert_eq!(store.version("v"), None);

        store.set("v", &path("$.a"), Value::from(1)).unwrap();
        let first = store.version("v").unwrap();

        store.get("v", &Path::root()).unwrap();
        assert_eq!(store.delete("v", &path("$.zz")), 0);
        assert_eq!(store.version("v"), Some(first));

        store.num_incr_by("v", &path("$.a"), Number::Int(1)).unwrap();
        let second = store.version("v").unwrap();
        assert!(second > first);

        let (value, at) = store.get_versioned("v", &path("$.a")).unwrap().unwrap();
        assert_eq!(value, Value::from(2));
        assert_eq!(at, second);
    }

    #[test]
    fn test_expiry() {
        let store = DocumentStore::new();
        store.set("temp", &Path::root(), Value::from(1)).unwrap();
        assert!(store.expire("temp", Duration::from_millis(10)));
        assert!(store.get("temp", &Path::root()).unwrap().is_some());

        thread::sleep(Duration::from_millis(20));

        assert_eq!(store.get("temp", &Path::root()).unwrap(), None);
        assert!(!store.exists("temp"));
        assert_eq!(store.ttl("temp"), None);
        assert_eq!(store.version("temp"), None);
    }

    #[test]
    fn test_expire_missing_key() {
        let store = DocumentStore::new();
        assert!(!store.expire("nope", Duration::from_secs(1)));
        assert!(!store.persist("nope"));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_unrepresentable_ttl_is_refused() {
        let store = DocumentStore::new();
        store.set("k", &Path::root(), Value::from(1)).unwrap();
        store.expire("k", Duration::from_secs(100));
        let version = store.version("k");

        assert!(!store.expire("k", Duration::MAX));
        assert!(matches!(store.ttl("k"), Some(Ttl::Remaining(_))));
        assert_eq!(store.version("k"), version);
    }

    #[test]
    fn test_zero_ttl_is_immediately_absent() {
        let store = DocumentStore::new();
        store.set("k", &Path::root(), Value::from(1)).unwrap();
        assert!(store.expire("k", Duration::ZERO));
        assert_eq!(store.get("k", &Path::root()).unwrap(), None);
    }

    #[test]
    fn test_ttl_and_persist() {
        let store = DocumentStore::new();
        store.set("k", &Path::root(), Value::from(1)).unwrap();
        assert_eq!(store.ttl("k"), Some(Ttl::Persistent));
        assert!(!store.persist("k"));

        store.expire("k", Duration::from_secs(100));
        match store.ttl("k") {
            Some(Ttl::Remaining(left)) => assert!(left <= Duration::from_secs(100)),
            other => panic!("unexpected ttl {:?}", other),
        }

        // Writes keep the deadline.
        store.set("k", &Path::root(), Value::from(2)).unwrap();
        assert!(matches!(store.ttl("k"), Some(Ttl::Remaining(_))));

        assert!(store.persist("k"));
        assert_eq!(store.ttl("k"), Some(Ttl::Persistent));
    }

    #[test]
    fn test_expire_at() {
        let store = DocumentStore::new();
        store.set("k", &Path::root(), Value::from(1)).unwrap();
        assert!(store.expire_at("k", Instant::now()));
        assert!(!store.exists("k"));
    }

    #[test]
    fn test_recreated_key_forgets_old_ttl() {
        let store = DocumentStore::new();
        store.set("k", &Path::root(), Value::from(1)).unwrap();
        store.expire("k", Duration::from_millis(5));
        thread::sleep(Duration::from_millis(15));

        store.set("k", &Path::root(), Value::from(2)).unwrap();
        assert_eq!(store.ttl("k"), Some(Ttl::Persistent));
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().expired, 1);
    }

    #[test]
    fn test_keys_pattern() {
        let store = DocumentStore::new();
        for key in ["user:1", "user:2", "order:1"] {
            store.set(key, &Path::root(), Value::Null).unwrap();
        }
        assert_eq!(store.keys("user:*"), vec!["user:1", "user:2"]);
        assert_eq!(store.keys("*:1"), vec!["order:1", "user:1"]);
        assert_eq!(store.keys("*").len(), 3);
    }

    #[test]
    fn test_flush() {
        let store = DocumentStore::new();
        for i in 0..10 {
            store
                .set(&format!("k{}", i), &Path::root(), Value::from(i))
                .unwrap();
        }
        store.flush();
        assert!(store.is_empty());
        assert!(store.keys("*").is_empty());

        store.set("k1", &Path::root(), Value::from(1)).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_purge_expired() {
        let store = DocumentStore::new();
        store.set("a", &Path::root(), Value::from(1)).unwrap();
        store.set("b", &Path::root(), Value::from(2)).unwrap();
        store.set("c", &Path::root(), Value::from(3)).unwrap();
        store.expire("a", Duration::from_millis(5));
        store.expire("b", Duration::from_millis(5));
        thread::sleep(Duration::from_millis(15));

        assert_eq!(store.purge_expired(), 2);
        assert_eq!(store.len(), 1);
        assert!(store.exists("c"));
        assert_eq!(store.purge_expired(), 0);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(DocumentStore::new());
        let counter = path("$.stats.count");
        store.set("page", &counter, Value::from(0)).unwrap();

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let store = Arc::clone(&store);
                let counter = counter.clone();
                thread::spawn(move || {
                    store.num_incr_by("page", &counter, Number::Int(1)).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            store.get("page", &counter).unwrap(),
            Some(Value::from(100))
        );
    }

    #[test]
    fn test_concurrent_access_across_keys() {
        let store = Arc::new(DocumentStore::new());
        let mut handles = vec![];

        for i in 0..10 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("key-{}-{}", i, j);
                    store.set(&key, &Path::root(), Value::from(j)).unwrap();
                    store.get(&key, &Path::root()).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 1000);
    }

    #[test]
    fn test_concurrent_create_and_delete() {
        let store = Arc::new(DocumentStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..500 {
                        if t % 2 == 0 {
                            store.set("hot", &Path::root(), json("[]")).unwrap();
                        } else {
                            store.delete("hot", &Path::root());
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let live = u64::from(store.exists("hot"));
        assert_eq!(store.len(), live);
    }

    #[test]
    fn test_readers_never_see_partial_writes() {
        let store = Arc::new(DocumentStore::new());
        store.set("pair", &Path::root(), json(r#"{"a":0,"b":0}"#)).unwrap();

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 1..=500 {
                    let doc = Value::from_json(&format!(r#"{{"a":{i},"b":{i}}}"#)).unwrap();
                    store.set("pair", &Path::root(), doc).unwrap();
                }
            })
        };

        for _ in 0..500 {
            let doc = store.get("pair", &Path::root()).unwrap().unwrap();
            let object = doc.as_object().unwrap();
            assert_eq!(object["a"], object["b"]);
        }
        writer.join().unwrap();
    }
}
