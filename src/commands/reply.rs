//! Console Replies
//!
//! The value a command produces, independent of how it is printed. Display
//! follows redis-cli conventions:
//!
//! | Reply | Printed as |
//! |-------|------------|
//! | `Simple("OK")` | `OK` |
//! | `Error("ERR boom")` | `(error) ERR boom` |
//! | `Integer(3)` | `(integer) 3` |
//! | `Bulk("hi")` | `"hi"` |
//! | `Null` | `(nil)` |
//! | `Array([..])` | numbered lines, nested arrays indented |

use crate::error::StoreError;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Status text such as `OK` or `QUEUED`
    Simple(String),
    Error(String),
    Integer(i64),
    /// Arbitrary text, including JSON documents
    Bulk(String),
    Null,
    Array(Vec<Reply>),
}

impl Reply {
    pub fn simple(s: impl Into<String>) -> Self {
        Reply::Simple(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        Reply::Error(s.into())
    }

    pub fn integer(n: i64) -> Self {
        Reply::Integer(n)
    }

    pub fn bulk(s: impl Into<String>) -> Self {
        Reply::Bulk(s.into())
    }

    pub fn array(values: Vec<Reply>) -> Self {
        Reply::Array(values)
    }

    pub fn ok() -> Self {
        Reply::Simple("OK".to_string())
    }

    pub fn pong() -> Self {
        Reply::Simple("PONG".to_string())
    }

    pub fn queued() -> Self {
        Reply::Simple("QUEUED".to_string())
    }

    /// `Bulk` for `Some`, `Null` for `None`.
    pub fn bulk_or_null(value: Option<impl Into<String>>) -> Self {
        value.map_or(Reply::Null, |s| Reply::Bulk(s.into()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Reply::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Reply::Simple(s) | Reply::Bulk(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Reply::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Reply]> {
        match self {
            Reply::Array(values) => Some(values),
            _ => None,
        }
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        match self {
            Reply::Simple(s) => write!(f, "{}", s),
            Reply::Error(s) => write!(f, "(error) {}", s),
            Reply::Integer(n) => write!(f, "(integer) {}", n),
            Reply::Bulk(s) => write!(f, "{:?}", s),
            Reply::Null => write!(f, "(nil)"),
            Reply::Array(values) if values.is_empty() => write!(f, "(empty array)"),
            Reply::Array(values) => {
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                        write!(f, "{:indent$}", "", indent = indent)?;
                    }
                    let label = format!("{}) ", i + 1);
                    write!(f, "{}", label)?;
                    value.render(f, indent + label.len())?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}

impl From<StoreError> for Reply {
    fn from(err: StoreError) -> Self {
        Reply::Error(format!("{} {}", err.code(), err))
    }
}
