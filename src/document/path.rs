//! Document Paths
//!
//! A [`Path`] is an ordered list of steps into a document. A step either
//! names an object field or indexes into an array; negative indices count
//! from the end of the array.
//!
//! ## Syntax
//!
//! | Text | Steps |
//! |------|-------|
//! | `$`, `.` or empty | root |
//! | `$.user.name` | field `user`, field `name` |
//! | `user.name` | same, leading `$.` is optional |
//! | `items[0]`, `items[-1]` | field `items`, index `0` / `-1` |
//! | `$["display name"]`, `$['a.b']` | field with characters that need quoting |
//!
//! Wildcards and recursive descent are not part of the path language.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while parsing a path string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("empty field name at position {0}")]
    EmptyField(usize),

    #[error("unclosed bracket starting at position {0}")]
    UnclosedBracket(usize),

    #[error("invalid array index at position {0}: {1}")]
    InvalidIndex(usize, String),

    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),

    #[error("wildcards are not supported (position {0})")]
    Wildcard(usize),
}

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    /// Object field
    Field(String),
    /// Array index, negative counts from the end
    Index(i64),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Field(name) if is_plain_field(name) => write!(f, ".{}", name),
            Step::Field(name) => {
                f.write_str("[\"")?;
                for c in name.chars() {
                    if c == '"' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{}", c)?;
                }
                f.write_str("\"]")
            }
            Step::Index(i) => write!(f, "[{}]", i),
        }
    }
}

fn is_plain_field(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == ':')
}

/// A structural address into a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    steps: Vec<Step>,
}

impl Path {
    /// The root path, addressing the whole document.
    pub fn root() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Appends a field step (builder style).
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.steps.push(Step::Field(name.into()));
        self
    }

    /// Appends an index step (builder style).
    pub fn index(mut self, index: i64) -> Self {
        self.steps.push(Step::Index(index));
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    /// Parses a path string.
    pub fn parse(text: &str) -> Result<Self, PathError> {
        text.parse()
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = s.trim().chars().collect();
        if chars.is_empty() || chars == ['$'] || chars == ['.'] {
            return Ok(Path::root());
        }

        let mut steps = Vec::new();
        let mut i = 0;
        let anchored = chars[0] == '$';
        if anchored {
            i = 1;
        } else if chars[0] != '.' && chars[0] != '[' {
            // Bare leading field: `user.name`
            let (name, next) = read_field(&chars, 0)?;
            steps.push(Step::Field(name));
            i = next;
        }

        while i < chars.len() {
            match chars[i] {
                '.' => {
                    if chars.get(i + 1) == Some(&'.') {
                        return Err(PathError::Wildcard(i));
                    }
                    let (name, next) = read_field(&chars, i + 1)?;
                    steps.push(Step::Field(name));
                    i = next;
                }
                '[' => {
                    let (step, next) = read_bracket(&chars, i)?;
                    steps.push(step);
                    i = next;
                }
                c => return Err(PathError::UnexpectedChar(c, i)),
            }
        }

        Ok(Path { steps })
    }
}

/// Reads an unquoted field name starting at `start`, stopping at `.` or `[`.
fn read_field(chars: &[char], start: usize) -> Result<(String, usize), PathError> {
    let mut end = start;
    while end < chars.len() && chars[end] != '.' && chars[end] != '[' {
        match chars[end] {
            '*' => return Err(PathError::Wildcard(end)),
            ']' | '$' => return Err(PathError::UnexpectedChar(chars[end], end)),
            _ => end += 1,
        }
    }
    if end == start {
        return Err(PathError::EmptyField(start));
    }
    Ok((chars[start..end].iter().collect(), end))
}

/// Reads `[n]`, `['name']` or `["name"]` starting at the opening bracket.
fn read_bracket(chars: &[char], open: usize) -> Result<(Step, usize), PathError> {
    let mut i = open + 1;
    match chars.get(i) {
        Some(&quote) if quote == '\'' || quote == '"' => {
            i += 1;
            let mut name = String::new();
            loop {
                match chars.get(i) {
                    None => return Err(PathError::UnclosedBracket(open)),
                    Some('\\') => {
                        let escaped = chars.get(i + 1).ok_or(PathError::UnclosedBracket(open))?;
                        name.push(*escaped);
                        i += 2;
                    }
                    Some(&c) if c == quote => {
                        i += 1;
                        break;
                    }
                    Some(&c) => {
                        name.push(c);
                        i += 1;
                    }
                }
            }
            match chars.get(i) {
                Some(']') => Ok((Step::Field(name), i + 1)),
                Some(&c) => Err(PathError::UnexpectedChar(c, i)),
                None => Err(PathError::UnclosedBracket(open)),
            }
        }
        _ => {
            let start = i;
            while i < chars.len() && chars[i] != ']' {
                i += 1;
            }
            if i >= chars.len() {
                return Err(PathError::UnclosedBracket(open));
            }
            let text: String = chars[start..i].iter().collect();
            let text = text.trim();
            if text == "*" {
                return Err(PathError::Wildcard(start));
            }
            let index = text
                .parse::<i64>()
                .map_err(|_| PathError::InvalidIndex(start, text.to_string()))?;
            Ok((Step::Index(index), i + 1))
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for step in &self.steps {
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}
