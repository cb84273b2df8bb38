//! The dynamically-typed payload carried between operations and held in
//! node interfaces.
//!
//! The original source is dynamically typed end-to-end; a Rust port needs
//! some concrete representation to be runnable. A closed `enum` is used
//! (rather than `Box<dyn Any>`) so that equality, `Debug`, and cloning are
//! all structural and total — equality in particular backs the
//! differential-update short circuit in the node layer.

use indexmap::IndexMap;
use std::fmt;

/// A mapping from data slot name to value, used as both the input
/// dictionary to a [`crate::Operation`] and the result of computing one.
///
/// Backed by an [`IndexMap`] rather than a plain hash map: the
/// sequential executor's cache must preserve insertion order so an
/// unfiltered result reproduces the order values entered it.
pub type ValueMap = IndexMap<String, Value, ahash::RandomState>;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Float(f64),
    Int(i64),
    Bool(bool),
    String(String),
}

impl Value {
    pub fn as_f64(&self) -> Result<f64, ValueTypeError> {
        match self {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            other => Err(ValueTypeError::expected("float", other)),
        }
    }

    pub fn as_i64(&self) -> Result<i64, ValueTypeError> {
        match self {
            Value::Int(v) => Ok(*v),
            other => Err(ValueTypeError::expected("int", other)),
        }
    }

    pub fn as_bool(&self) -> Result<bool, ValueTypeError> {
        match self {
            Value::Bool(v) => Ok(*v),
            other => Err(ValueTypeError::expected("bool", other)),
        }
    }

    pub fn as_str(&self) -> Result<&str, ValueTypeError> {
        match self {
            Value::String(v) => Ok(v.as_str()),
            other => Err(ValueTypeError::expected("string", other)),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
        }
    }
}

/// Returned by the `as_*` accessors when a [`Value`] does not hold the
/// requested variant. Operation closures surface this as an
/// [`crate::OperationError::Value`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTypeError {
    pub expected: &'static str,
    pub found: Value,
}

impl ValueTypeError {
    fn expected(expected: &'static str, found: &Value) -> Self {
        Self {
            expected,
            found: found.clone(),
        }
    }
}

impl fmt::Display for ValueTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected a {} value, found {:?}",
            self.expected, self.found
        )
    }
}

impl std::error::Error for ValueTypeError {}
