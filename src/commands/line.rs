//! Console Line Tokenizer
//!
//! Splits one console line into arguments. Arguments are separated by
//! whitespace; an argument that starts with a quote runs to the matching
//! quote, so JSON values can be passed as one argument:
//!
//! ```text
//! JSON.SET user:1 $ '{"name": "ada", "tags": []}'
//! JSON.SET user:1 $.name "\"grace\""
//! ```
//!
//! Inside double quotes `\n`, `\r`, `\t`, `\"`, `\\` and `\xHH` are
//! unescaped; inside single quotes only `\'` is. A quote that does not open
//! an argument is an ordinary character, which keeps unquoted JSON such as
//! `{"a":1}` in one piece.

use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("unbalanced quotes in request")]
    UnbalancedQuotes,

    /// A closing quote must end the argument.
    #[error("closing quote at byte {0} must be followed by a space")]
    TrailingQuote(usize),
}

/// Splits a line into arguments. An empty or all-whitespace line yields no
/// arguments.
pub fn split_line(line: &str) -> Result<Vec<String>, LineError> {
    let mut args = Vec::new();
    let mut chars = line.char_indices().peekable();

    loop {
        while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}

        let Some(&(_, first)) = chars.peek() else {
            return Ok(args);
        };

        let arg = match first {
            '"' | '\'' => {
                chars.next();
                let arg = quoted(&mut chars, first)?;
                if let Some(&(pos, c)) = chars.peek() {
                    if !c.is_whitespace() {
                        return Err(LineError::TrailingQuote(pos - 1));
                    }
                }
                arg
            }
            _ => {
                let mut arg = String::new();
                while let Some((_, c)) = chars.next_if(|(_, c)| !c.is_whitespace()) {
                    arg.push(c);
                }
                arg
            }
        };
        args.push(arg);
    }
}

fn quoted(chars: &mut Peekable<CharIndices<'_>>, quote: char) -> Result<String, LineError> {
    let mut arg = String::new();
    while let Some((_, c)) = chars.next() {
        match c {
            c if c == quote => return Ok(arg),
            '\\' if quote == '"' => match chars.next() {
                Some((_, 'n')) => arg.push('\n'),
                Some((_, 'r')) => arg.push('\r'),
                Some((_, 't')) => arg.push('\t'),
                Some((_, 'x')) => arg.push(hex_escape(chars)),
                Some((_, other)) => arg.push(other),
                None => break,
            },
            '\\' if chars.peek().is_some_and(|&(_, next)| next == '\'') => {
                chars.next();
                arg.push('\'');
            }
            c => arg.push(c),
        }
    }
    Err(LineError::UnbalancedQuotes)
}

/// `\xHH`; anything that is not two hex digits is kept as a literal `x`.
fn hex_escape(chars: &mut Peekable<CharIndices<'_>>) -> char {
    let mut probe = chars.clone();
    let digits: Option<u32> = match (probe.next(), probe.next()) {
        (Some((_, hi)), Some((_, lo))) => hi
            .to_digit(16)
            .zip(lo.to_digit(16))
            .map(|(hi, lo)| hi * 16 + lo),
        _ => None,
    };
    match digits.and_then(char::from_u32) {
        Some(c) => {
            *chars = probe;
            c
        }
        None => 'x',
    }
}
