//! Runtime values produced by expression evaluation.

use crate::encoding::Encoding;

/// A single evaluated value: either a computed integer or a byte slice with the
/// encoding it was read with.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i128),
    Bytes { data: Vec<u8>, encoding: Encoding },
}

impl Value {
    pub fn bytes(data: impl Into<Vec<u8>>, encoding: Encoding) -> Self {
        Value::Bytes {
            data: data.into(),
            encoding,
        }
    }

    /// Numeric reading; slices use their own encoding.
    pub fn as_int(&self) -> Option<i128> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bytes { data, encoding } => encoding.to_int(data),
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_int().and_then(|v| u64::try_from(v).ok())
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes { data, .. } => Some(data),
            Value::Int(_) => None,
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Value::Int(v) => v.to_string(),
            Value::Bytes { data, encoding } => encoding.to_text(data),
        }
    }
}

impl From<i128> for Value {
    fn from(v: i128) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::bytes(s.as_bytes(), Encoding::default())
    }
}
