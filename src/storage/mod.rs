//! Storage engine for Redforge
//!
//! Core data structures and storage functionality for the subset of
//! Redis-compatible data types this crate implements: strings, hashes, and
//! streams.

pub mod commands;
pub mod engine;
pub mod rdb;
pub mod stream;
pub mod value;

pub use engine::{GetResult, StorageEngine};
pub use rdb::RdbLoader;
pub use stream::{Stream, StreamEntry, StreamId};
pub use value::{now_secs, StoredValue, Value, ValueType};

/// Key type for storage.
pub type Key = Vec<u8>;
