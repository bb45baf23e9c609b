//! Document Module
//!
//! The tree model stored under every key, the path language that addresses
//! nodes inside it, and the verbs that change it.
//!
//! ## Module Structure
//!
//! - `value` - closed `Value` / `Number` tree and JSON conversion
//! - `path` - `Path` / `Step` and the path-string parser
//! - `resolver` - walking paths for reads, writes and removal
//! - `mutation` - the Mutation Engine (set, delete, incr, array verbs)

pub mod mutation;
pub mod path;
pub mod resolver;
pub mod value;

pub use mutation::{Mutation, Outcome};
pub use path::{Path, PathError, Step};
pub use value::{Number, Value};
