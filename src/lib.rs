//! # PatchKV - An In-Memory JSON Document Store
//!
//! PatchKV keeps JSON documents under string keys and updates them in place:
//! a caller names a path inside a document and changes just that node, under
//! the key's own lock, instead of reading, editing and rewriting the whole
//! value.
//!
//! ## Features
//!
//! - **Partial updates**: set, delete, numeric increment and array
//!   append/insert/pop at any path
//! - **Per-key atomicity**: each operation runs under an exclusive lock on
//!   its key; other keys are never blocked
//! - **TTL Support**: keys can expire, reclaimed lazily and by a background sweeper
//! - **Watch-then-commit**: optimistic multi-key transactions with full rollback
//! - **Leaderboards**: named ranking indexes with O(log n) rank queries
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              PatchKV                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │  Console    │───>│ split_line  │───>│  Command    │                  │
//! │  │ (stdin/file)│    │             │    │  Handler    │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                        ┌──────────────────────┼─────────────┐           │
//! │                        ▼                      ▼             ▼           │
//! │  ┌──────────────────────────────────┐  ┌───────────┐ ┌────────────┐     │
//! │  │           DocumentStore          │  │Transaction│ │Leaderboards│     │
//! │  │ ┌───────┐ ┌───────┐ ┌───────┐    │  │  commit   │ │ (AVL rank  │     │
//! │  │ │Shard 0│ │Shard 1│ │...64  │    │<─┤           │ │   trees)   │     │
//! │  │ │ slots │ │ slots │ │shards │    │  └───────────┘ └────────────┘     │
//! │  │ └───────┘ └───────┘ └───────┘    │                                   │
//! │  └──────────────────────────────────┘                                   │
//! │                    ▲                                                    │
//! │  ┌─────────────────┴───────────────────────────────┐                    │
//! │  │           ExpirySweeper (Background Tokio Task) │                    │
//! │  └─────────────────────────────────────────────────┘                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use patchkv::document::{Number, Path, Value};
//! use patchkv::storage::DocumentStore;
//!
//! let store = DocumentStore::new();
//! let doc = Value::from_json(r#"{"name":"ada","stats":{"visits":0}}"#).unwrap();
//! store.set("user:1", &Path::root(), doc).unwrap();
//!
//! let visits = Path::parse("$.stats.visits").unwrap();
//! store.num_incr_by("user:1", &visits, Number::Int(1)).unwrap();
//!
//! assert_eq!(store.get("user:1", &visits).unwrap(), Some(Value::from(1)));
//! ```
//!
//! ## Module Overview
//!
//! - [`document`]: the JSON value tree, paths, the resolver and the mutation verbs
//! - [`storage`]: the sharded keyspace, expiry and transactions
//! - [`ranking`]: leaderboards
//! - [`commands`]: console commands and replies
//! - [`console`]: the async read-execute-respond loop
//!
//! ## Design Highlights
//!
//! ### Thread Safety
//!
//! The keyspace is split over 64 shards. A shard lock is held only to find
//! or create a key's slot; the operation itself runs under the slot's own
//! lock, so writers to different keys never wait on each other.
//!
//! ### Lazy + Active Expiry
//!
//! Keys with TTL are expired in two ways:
//! 1. **Lazy**: When a key is accessed, we check if it's expired
//! 2. **Active**: A background task periodically scans for expired keys

pub mod commands;
pub mod console;
pub mod document;
pub mod error;
pub mod ranking;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandHandler, Reply};
pub use console::{Console, ConsoleError, ConsoleStats};
pub use document::{Mutation, Number, Outcome, Path, Value};
pub use error::{StoreError, StoreResult};
pub use ranking::{Leaderboards, Order, RankingIndex};
pub use storage::{
    start_expiry_sweeper, DocumentStore, ExpiryConfig, ExpirySweeper, Operation, Transaction,
};

/// Version of PatchKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
