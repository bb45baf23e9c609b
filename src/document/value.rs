//! Document Values
//!
//! A document is a closed tree: every node is one of null, boolean, number,
//! string, array or object. Keeping the set closed lets the resolver and the
//! mutation verbs match exhaustively on node kinds.
//!
//! JSON text is the exchange format. Parsing goes through `serde_json`, and
//! `Value` implements `Serialize`/`Deserialize` directly so callers can embed
//! documents in their own serde types.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A numeric node. Integers stay integers until a float is mixed in.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// The value widened to `f64`.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    /// The value as `i64` if it is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Number::Int(i) => Some(i),
            Number::Float(_) => None,
        }
    }

    /// Adds two numbers.
    ///
    /// Integer + integer is checked integer arithmetic. Any float operand
    /// produces a float, which must stay finite.
    pub fn checked_add(self, other: Number) -> StoreResult<Number> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => {
                a.checked_add(b).map(Number::Int).ok_or(StoreError::Overflow)
            }
            (a, b) => {
                let sum = a.as_f64() + b.as_f64();
                if sum.is_nan() {
                    Err(StoreError::NotANumber)
                } else if sum.is_infinite() {
                    Err(StoreError::Overflow)
                } else {
                    Ok(Number::Float(sum))
                }
            }
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (a, b) => a.as_f64() == b.as_f64(),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Float(x) => match serde_json::Number::from_f64(x) {
                Some(n) => write!(f, "{}", n),
                None => write!(f, "{}", x),
            },
        }
    }
}

impl FromStr for Number {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(i) = s.parse::<i64>() {
            return Ok(Number::Int(i));
        }
        match s.parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(Number::Float(f)),
            _ => Err(StoreError::NotANumber),
        }
    }
}

impl From<i64> for Number {
    fn from(v: i64) -> Self {
        Number::Int(v)
    }
}

impl From<f64> for Number {
    fn from(v: f64) -> Self {
        Number::Float(v)
    }
}

/// A node in a document tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// An empty object.
    pub fn object() -> Self {
        Value::Object(BTreeMap::new())
    }

    /// An empty array.
    pub fn array() -> Self {
        Value::Array(Vec::new())
    }

    /// Parses JSON text.
    pub fn from_json(text: &str) -> StoreResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Renders the value as compact JSON text.
    pub fn to_json(&self) -> String {
        self.to_string()
    }

    /// The kind name used in type reports and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(Number::Int(_)) => "integer",
            Value::Number(Number::Float(_)) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_number().and_then(|n| n.as_i64())
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_number().map(|n| n.as_f64())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl FromStr for Value {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Value::from_json(s)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(Number::Int(i)) => serializer.serialize_i64(*i),
            Value::Number(Number::Float(x)) => serializer.serialize_f64(*x),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => items.serialize(serializer),
            Value::Object(map) => map.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Number(Number::Int(i)),
                None => n
                    .as_f64()
                    .map_or(Value::Null, |f| Value::Number(Number::Float(f))),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Number(Number::Int(i)) => serde_json::Value::from(i),
            Value::Number(Number::Float(x)) => serde_json::Number::from_f64(x)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::String(s) => serde_json::Value::String(s),
            Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(Number::Int(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(Number::Int(v as i64))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(Number::Float(v))
    }
}

impl From<Number> for Value {
    fn from(v: Number) -> Self {
        Value::Number(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_and_render() {
        let value = Value::from_json(r#"{"name":"Ariz","tags":["a","b"],"score":1.5,"age":30}"#)
            .unwrap();
        assert_eq!(value.kind(), "object");
        assert_eq!(
            value.to_json(),
            r#"{"age":30,"name":"Ariz","score":1.5,"tags":["a","b"]}"#
        );
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            Value::from_json("{not json"),
            Err(StoreError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_integer_and_float_kinds() {
        assert_eq!(Value::from(1).kind(), "integer");
        assert_eq!(Value::from(1.0).kind(), "number");
        assert_eq!(Value::from(1.0).to_json(), "1.0");
        assert_eq!(Value::from(1), Value::from(1.0));
    }

    #[test]
    fn test_number_add() {
        assert_eq!(
            Number::Int(2).checked_add(Number::Int(3)),
            Ok(Number::Int(5))
        );
        assert_eq!(
            Number::Int(2).checked_add(Number::Float(0.5)),
            Ok(Number::Float(2.5))
        );
        assert_eq!(
            Number::Int(i64::MAX).checked_add(Number::Int(1)),
            Err(StoreError::Overflow)
        );
        assert_eq!(
            Number::Float(f64::MAX).checked_add(Number::Float(f64::MAX)),
            Err(StoreError::Overflow)
        );
        assert_eq!(
            Number::Float(f64::NAN).checked_add(Number::Int(1)),
            Err(StoreError::NotANumber)
        );
    }

    #[test]
    fn test_number_from_str() {
        assert_eq!("42".parse::<Number>(), Ok(Number::Int(42)));
        assert_eq!("-1.25".parse::<Number>(), Ok(Number::Float(-1.25)));
        assert_eq!("abc".parse::<Number>(), Err(StoreError::NotANumber));
        assert_eq!("inf".parse::<Number>(), Err(StoreError::NotANumber));
    }

    #[test]
    fn test_serde_json_conversion() {
        let source = json!({"a": [1, 2.5, null, true, "x"], "b": {"c": {}}});
        let value = Value::from(source.clone());
        let back: serde_json::Value = value.into();
        assert_eq!(back, source);
    }

    #[test]
    fn test_serde_roundtrip_through_struct() {
        #[derive(Serialize, Deserialize)]
        struct Envelope {
            id: String,
            body: Value,
        }

        let text = r#"{"id":"u1","body":{"visits":3}}"#;
        let envelope: Envelope = serde_json::from_str(text).unwrap();
        assert_eq!(envelope.body, Value::from(json!({"visits": 3})));
        assert_eq!(serde_json::to_string(&envelope).unwrap(), text);
    }
}
