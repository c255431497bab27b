//! Value types for the storage engine
//!
//! Redforge's keyspace only carries three shapes: raw strings, hashes, and
//! append-only streams. Expiry is tracked as an absolute wall-clock
//! timestamp (seconds since the epoch) rather than an `Instant`, since
//! expiry times have to survive an RDB round-trip and be compared against
//! values loaded from disk.

use crate::storage::stream::Stream;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// All value shapes the core keyspace can hold.
#[derive(Debug, Clone)]
pub enum Value {
    /// Raw byte string.
    String(Vec<u8>),

    /// Field-value pairs.
    Hash(HashMap<Vec<u8>, Vec<u8>>),

    /// Append-only entry log keyed by (ms, seq) ids. `Arc`-wrapped so a
    /// caller can hold a handle to the stream and block on it after
    /// releasing the keyspace lock.
    Stream(Arc<Stream>),
}

/// Value type enumeration, used for TYPE and WRONGTYPE checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String,
    Hash,
    Stream,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Hash => "hash",
            ValueType::Stream => "stream",
        }
    }
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::String(_) => ValueType::String,
            Value::Hash(_) => ValueType::Hash,
            Value::Stream(_) => ValueType::Stream,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Hash(_) => "hash",
            Value::Stream(_) => "stream",
        }
    }

    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Value::String(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_string_mut(&mut self) -> Option<&mut Vec<u8>> {
        match self {
            Value::String(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_hash(&self) -> Option<&HashMap<Vec<u8>, Vec<u8>>> {
        match self {
            Value::Hash(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_hash_mut(&mut self) -> Option<&mut HashMap<Vec<u8>, Vec<u8>>> {
        match self {
            Value::Hash(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Arc<Stream>> {
        match self {
            Value::Stream(s) => Some(s),
            _ => None,
        }
    }
}

/// Current time as seconds since the epoch, matching the absolute-expiry
/// model RDB expire opcodes use.
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// A keyspace entry and its optional absolute expiry.
#[derive(Debug, Clone)]
pub struct StoredValue {
    pub value: Value,
    /// Wall-clock expiry in seconds since the epoch. `None` means the key
    /// never expires.
    pub expires_at: Option<f64>,
}

impl StoredValue {
    pub fn new(value: Value) -> Self {
        StoredValue {
            value,
            expires_at: None,
        }
    }

    pub fn with_expiry(value: Value, expires_at: f64) -> Self {
        StoredValue {
            value,
            expires_at: Some(expires_at),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|at| now_secs() >= at)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type() {
        let v = Value::String(b"hello".to_vec());
        assert_eq!(v.value_type(), ValueType::String);
        assert_eq!(v.type_name(), "string");
    }

    #[test]
    fn test_expiry() {
        let stored = StoredValue::with_expiry(Value::String(b"x".to_vec()), now_secs() - 1.0);
        assert!(stored.is_expired());

        let stored = StoredValue::with_expiry(Value::String(b"x".to_vec()), now_secs() + 60.0);
        assert!(!stored.is_expired());

        let stored = StoredValue::new(Value::String(b"x".to_vec()));
        assert!(!stored.is_expired());
    }
}
