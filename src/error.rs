//! Error types shared by the document store, the ranking index and the
//! transaction layer.
//!
//! Every failure is a recoverable, typed result. A missing key on a read is
//! not an error at all: reads return `Option` and only verbs that need an
//! existing target report [`StoreError::NotFound`].

use crate::document::path::PathError;
use thiserror::Error;

/// Errors returned by store operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// The key or the path does not resolve.
    #[error("key or path does not exist")]
    NotFound,

    /// A path step does not match the container it is applied to,
    /// e.g. an index step against a mapping.
    #[error("path step {step} cannot be applied to {found}")]
    PathType { step: String, found: &'static str },

    /// The addressed node has the wrong type for the operation.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Pop on an empty sequence.
    #[error("cannot pop from an empty array")]
    EmptyContainer,

    /// A watched key changed between the watch and the commit.
    #[error("watched key '{key}' was modified")]
    Conflict { key: String },

    /// A write needs a container where the document holds a scalar.
    #[error("path step {step} needs a container but found {found}")]
    KeyType { step: String, found: &'static str },

    /// An index reaches before the start of a sequence, or a write would
    /// pad it by more than `MAX_PADDING` slots.
    #[error("index {index} out of range for array of length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    /// The path string could not be parsed.
    #[error("invalid path: {0}")]
    PathSyntax(#[from] PathError),

    /// Numeric result does not fit.
    #[error("numeric result out of range")]
    Overflow,

    /// A score or increment is NaN.
    #[error("value is not a number")]
    NotANumber,

    /// A value argument is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// A staged operation failed at commit time and every touched key was restored.
    #[error("transaction aborted at operation {index}: {source}")]
    Aborted {
        index: usize,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// Short upper-case code used as the prefix of console error replies.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound => "NOTFOUND",
            StoreError::PathType { .. } => "PATHTYPE",
            StoreError::TypeMismatch { .. } => "WRONGTYPE",
            StoreError::EmptyContainer => "EMPTY",
            StoreError::Conflict { .. } => "CONFLICT",
            StoreError::KeyType { .. } => "KEYTYPE",
            StoreError::IndexOutOfRange { .. } => "RANGE",
            StoreError::PathSyntax(_) => "SYNTAX",
            StoreError::Overflow => "OVERFLOW",
            StoreError::NotANumber => "NAN",
            StoreError::InvalidJson(_) => "JSON",
            StoreError::Aborted { .. } => "EXECABORT",
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::InvalidJson(err.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
