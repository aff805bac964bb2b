use std::fmt;
use std::fmt::{Display, Formatter};

use bincode::{Decode, Encode};

/// A single column value.
///
/// Join keys compare with SQL semantics (see [`Value::join_eq`]): `Null` never
/// matches anything, itself included. The derived `PartialEq` is plain
/// structural equality and is what tests and the unmatched-row fill use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    VarChar(String),
    Binary(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Strict key equality: values of the same type that compare equal.
    pub fn join_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::VarChar(a), Value::VarChar(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            _ => false,
        }
    }

    /// Approximate in-memory size, used for work-memory accounting.
    pub fn get_storage_size(&self) -> usize {
        match self {
            Value::Null => 1,
            Value::Boolean(_) => 1,
            Value::Integer(_) => 8,
            Value::VarChar(s) => 4 + s.len(),
            Value::Binary(b) => 4 + b.len(),
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::VarChar(s) => write!(f, "{}", s),
            Value::Binary(b) => write!(f, "\\x{}", b.iter().map(|x| format!("{:02x}", x)).collect::<String>()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::VarChar(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::VarChar(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
