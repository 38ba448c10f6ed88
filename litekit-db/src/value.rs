//! Parameter and column value types for the safe `SQLite` wrapper.
//!
//! [`Value`] is the closed set of storage classes the engine knows about.
//! Host types convert into it with `From` and back out with `TryFrom`:
//!
//! | host type            | into `Value`         | out of `Value`                    |
//! |----------------------|----------------------|-----------------------------------|
//! | `i64`, `i32`, `u32`  | `Integer`            | `Integer` only                    |
//! | `bool`               | `Integer(0 \| 1)`    | `Integer` (non-zero is `true`)    |
//! | `f64`                | `Real`               | `Real`, or `Integer` widened      |
//! | `String`, `&str`     | `Text`               | `Text` only                       |
//! | `Vec<u8>`, `&[u8]`   | `Blob`               | `Blob`, or `Text` as UTF-8 bytes  |
//! | `Option<T>`          | `Null` for `None`    | `Null` becomes `None`             |

use crate::error::DbError;

/// A value that can be bound to a prepared statement parameter or read from
/// a result column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit IEEE floating point number.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Binary blob.
    Blob(Vec<u8>),
}

impl Value {
    /// Name of the storage class, as the engine's `typeof()` spells it.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
        }
    }

    /// Returns `true` for SQL NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn mismatch(&self, expected: &'static str) -> DbError {
        DbError::InvalidType {
            expected,
            found: self.type_name(),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Blob(v.to_vec())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl TryFrom<Value> for i64 {
    type Error = DbError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Integer(v) => Ok(v),
            other => Err(other.mismatch("i64")),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = DbError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Integer(v) => Ok(v != 0),
            other => Err(other.mismatch("bool")),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = DbError;

    #[allow(clippy::cast_precision_loss)]
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Real(v) => Ok(v),
            Value::Integer(v) => Ok(v as Self),
            other => Err(other.mismatch("f64")),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = DbError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Text(v) => Ok(v),
            other => Err(other.mismatch("String")),
        }
    }
}

impl TryFrom<Value> for Vec<u8> {
    type Error = DbError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Blob(v) => Ok(v),
            Value::Text(v) => Ok(v.into_bytes()),
            other => Err(other.mismatch("Vec<u8>")),
        }
    }
}

/// Converts a nullable column value, mapping `Null` to `None`.
///
/// # Errors
///
/// Returns [`DbError::InvalidType`] when a non-null value does not convert.
pub fn optional<T>(value: Value) -> Result<Option<T>, DbError>
where
    T: TryFrom<Value, Error = DbError>,
{
    match value {
        Value::Null => Ok(None),
        other => T::try_from(other).map(Some),
    }
}

/// Convenience macro for building parameter lists.
///
/// Usage: `params![1_i64, blob.as_slice(), "text"]`
#[macro_export]
macro_rules! params {
    ($($val:expr),* $(,)?) => {
        &[$($crate::Value::from($val)),*][..]
    };
}
