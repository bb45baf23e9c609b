//! Storage Module
//!
//! The keyspace: a sharded map of per-key slots holding documents, their
//! TTLs and versions, plus the background expiry sweeper and the
//! watch-then-commit transaction layer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     DocumentStore                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐            │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │            │
//! │  │ slots   │ │ slots   │ │ slots   │ │ shards  │            │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘            │
//! └─────────────────────────────────────────────────────────────┘
//!        ▲                                   ▲
//!        │                                   │
//!  ┌─────┴─────────────────┐   ┌─────────────┴─────────────┐
//!  │ Transaction::commit   │   │     ExpirySweeper         │
//!  │ (sorted slot locks)   │   │  (Background Tokio Task)  │
//!  └───────────────────────┘   └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use patchkv::document::{Path, Value};
//! use patchkv::storage::{DocumentStore, Ttl};
//! use std::time::Duration;
//!
//! let store = DocumentStore::new();
//! let root = Path::root();
//!
//! store.set("session:1", &root, Value::from_json(r#"{"user":"ada"}"#).unwrap()).unwrap();
//! store.expire("session:1", Duration::from_secs(3600));
//!
//! assert!(matches!(store.ttl("session:1"), Some(Ttl::Remaining(_))));
//! assert_eq!(store.ttl("missing"), None);
//! ```

pub mod engine;
pub mod expiry;
pub mod glob;
pub mod transaction;

pub use engine::{DocumentStore, KeyRecord, StorageStats, NUM_SHARDS};
pub use expiry::{start_expiry_sweeper, Expiration, ExpiryConfig, ExpiryState, ExpirySweeper, Ttl};
pub use transaction::{Action, Operation, Transaction};
