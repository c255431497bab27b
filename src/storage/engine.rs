//! Main storage engine implementation
//!
//! A single flat keyspace behind one mutex. Redis proper keeps 16 numbered
//! databases selected with SELECT; that's out of scope here, so `Database`
//! collapses to one `HashMap` guarded directly by `StorageEngine`.

use super::stream::{Stream, StreamEntry, StreamId};
use super::value::{now_secs, StoredValue, Value, ValueType};
use super::Key;
use crate::error::{CommandError, Result, StorageError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Main storage engine: the live keyspace plus the operations the command
/// handlers call into.
pub struct StorageEngine {
    data: Mutex<HashMap<Key, StoredValue>>,
}

/// Result of a GET-style lookup.
#[derive(Debug)]
pub enum GetResult {
    Found(Value),
    NotFound,
    Expired,
}

impl StorageEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(StorageEngine {
            data: Mutex::new(HashMap::new()),
        })
    }

    /// Used by the RDB loader to populate the keyspace at startup without
    /// going through per-key expiry bookkeeping.
    pub fn load_entry(&self, key: Key, stored: StoredValue) {
        let mut data = self.data.lock().unwrap();
        data.insert(key, stored);
    }

    pub fn key_count(&self) -> usize {
        self.data.lock().unwrap().len()
    }

    fn is_live(stored: &StoredValue) -> bool {
        !stored.is_expired()
    }

    /// Remove the key if present and expired. Returns whether it was live.
    fn reap_if_expired(data: &mut HashMap<Key, StoredValue>, key: &[u8]) -> bool {
        match data.get(key) {
            Some(stored) if stored.is_expired() => {
                data.remove(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    // ---- generic key operations ----

    pub fn get(&self, key: &[u8]) -> GetResult {
        let mut data = self.data.lock().unwrap();
        if !Self::reap_if_expired(&mut data, key) {
            return GetResult::NotFound;
        }
        match data.get(key) {
            Some(stored) => GetResult::Found(stored.value.clone()),
            None => GetResult::NotFound,
        }
    }

    pub fn get_string(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.get(key) {
            GetResult::Found(Value::String(bytes)) => Ok(Some(bytes)),
            GetResult::Found(_) => Err(StorageError::WrongType.into()),
            GetResult::NotFound | GetResult::Expired => Ok(None),
        }
    }

    pub fn key_type(&self, key: &[u8]) -> Option<ValueType> {
        let mut data = self.data.lock().unwrap();
        if !Self::reap_if_expired(&mut data, key) {
            return None;
        }
        data.get(key).map(|s| s.value.value_type())
    }

    /// SET key value [NX|XX] [EX secs | PX millis]
    pub fn set(&self, key: Key, value: Vec<u8>, nx: bool, xx: bool, expires_at: Option<f64>) -> bool {
        let mut data = self.data.lock().unwrap();
        let exists = Self::reap_if_expired(&mut data, &key);

        if nx && exists {
            return false;
        }
        if xx && !exists {
            return false;
        }

        let stored = match expires_at {
            Some(at) => StoredValue::with_expiry(Value::String(value), at),
            None => StoredValue::new(Value::String(value)),
        };
        data.insert(key, stored);
        true
    }

    /// SETEX key seconds value — unconditional set with expiry.
    pub fn setex(&self, key: Key, seconds: u64, value: Vec<u8>) {
        let mut data = self.data.lock().unwrap();
        let expires_at = now_secs() + seconds as f64;
        data.insert(key, StoredValue::with_expiry(Value::String(value), expires_at));
    }

    /// GETSET key value — set new value, return the old one.
    pub fn getset(&self, key: Key, value: Vec<u8>) -> Result<Option<Vec<u8>>> {
        let mut data = self.data.lock().unwrap();
        let exists = Self::reap_if_expired(&mut data, &key);
        let old = if exists {
            match data.get(&key).map(|s| &s.value) {
                Some(Value::String(bytes)) => Some(bytes.clone()),
                Some(_) => return Err(StorageError::WrongType.into()),
                None => None,
            }
        } else {
            None
        };
        data.insert(key, StoredValue::new(Value::String(value)));
        Ok(old)
    }

    pub fn del(&self, keys: &[Vec<u8>]) -> usize {
        let mut data = self.data.lock().unwrap();
        let mut count = 0;
        for key in keys {
            if Self::reap_if_expired(&mut data, key) && data.remove(key.as_slice()).is_some() {
                count += 1;
            }
        }
        count
    }

    /// KEYS pattern — only "*" is required by the core.
    pub fn keys(&self, pattern: &[u8]) -> Vec<Key> {
        let mut data = self.data.lock().unwrap();
        let live_keys: Vec<Key> = data.keys().cloned().collect();
        for key in &live_keys {
            Self::reap_if_expired(&mut data, key);
        }
        if pattern == b"*" {
            data.keys().cloned().collect()
        } else {
            // Only glob support required by the core is "*"; anything else
            // degenerates to an exact-match lookup.
            if data.contains_key(pattern) {
                vec![pattern.to_vec()]
            } else {
                Vec::new()
            }
        }
    }

    // ---- counters and string ops ----

    pub fn incr_by(&self, key: Key, delta: i64) -> Result<i64> {
        let mut data = self.data.lock().unwrap();
        let exists = Self::reap_if_expired(&mut data, &key);

        let current = if exists {
            match data.get(&key).map(|s| &s.value) {
                Some(Value::String(bytes)) => {
                    let text = std::str::from_utf8(bytes).map_err(|_| CommandError::NotInteger)?;
                    text.trim().parse::<i64>().map_err(|_| CommandError::NotInteger)?
                }
                Some(_) => return Err(StorageError::WrongType.into()),
                None => 0,
            }
        } else {
            0
        };

        let new_value = current
            .checked_add(delta)
            .ok_or(CommandError::IntegerOverflow)?;

        data.insert(key, StoredValue::new(Value::String(new_value.to_string().into_bytes())));
        Ok(new_value)
    }

    pub fn append(&self, key: Key, value: Vec<u8>) -> Result<usize> {
        let mut data = self.data.lock().unwrap();
        let exists = Self::reap_if_expired(&mut data, &key);

        if exists {
            match data.get_mut(&key).map(|s| &mut s.value) {
                Some(Value::String(bytes)) => {
                    bytes.extend_from_slice(&value);
                    Ok(bytes.len())
                }
                Some(_) => Err(StorageError::WrongType.into()),
                None => unreachable!(),
            }
        } else {
            let len = value.len();
            data.insert(key, StoredValue::new(Value::String(value)));
            Ok(len)
        }
    }

    /// SETBIT key offset bit — returns the previous bit value.
    pub fn setbit(&self, key: Key, offset: usize, bit: u8) -> Result<u8> {
        let mut data = self.data.lock().unwrap();
        let exists = Self::reap_if_expired(&mut data, &key);
        let byte_index = offset / 8;
        let bit_index = 7 - (offset % 8);

        let bytes = if exists {
            match data.get_mut(&key).map(|s| &mut s.value) {
                Some(Value::String(bytes)) => bytes,
                Some(_) => return Err(StorageError::WrongType.into()),
                None => unreachable!(),
            }
        } else {
            data.insert(key.clone(), StoredValue::new(Value::String(Vec::new())));
            match data.get_mut(&key).map(|s| &mut s.value) {
                Some(Value::String(bytes)) => bytes,
                _ => unreachable!(),
            }
        };

        if bytes.len() <= byte_index {
            bytes.resize(byte_index + 1, 0);
        }

        let old_bit = (bytes[byte_index] >> bit_index) & 1;
        if bit == 1 {
            bytes[byte_index] |= 1 << bit_index;
        } else {
            bytes[byte_index] &= !(1 << bit_index);
        }

        Ok(old_bit)
    }

    pub fn mset(&self, pairs: Vec<(Key, Vec<u8>)>) {
        let mut data = self.data.lock().unwrap();
        for (key, value) in pairs {
            data.insert(key, StoredValue::new(Value::String(value)));
        }
    }

    /// MSETNX — set all keys only if none of them already exist (live).
    pub fn msetnx(&self, pairs: Vec<(Key, Vec<u8>)>) -> bool {
        let mut data = self.data.lock().unwrap();
        for (key, _) in &pairs {
            if Self::reap_if_expired(&mut data, key) {
                return false;
            }
        }
        for (key, value) in pairs {
            data.insert(key, StoredValue::new(Value::String(value)));
        }
        true
    }

    // ---- hash ops ----

    fn with_hash_mut<F, T>(&self, key: &Key, create_if_missing: bool, f: F) -> Result<T>
    where
        F: FnOnce(&mut HashMap<Vec<u8>, Vec<u8>>) -> T,
    {
        let mut data = self.data.lock().unwrap();
        let exists = Self::reap_if_expired(&mut data, key);

        if !exists {
            if !create_if_missing {
                return Ok(f(&mut HashMap::new()));
            }
            data.insert(key.clone(), StoredValue::new(Value::Hash(HashMap::new())));
        }

        match data.get_mut(key.as_slice()).map(|s| &mut s.value) {
            Some(Value::Hash(h)) => Ok(f(h)),
            Some(_) => Err(StorageError::WrongType.into()),
            None => unreachable!(),
        }
    }

    pub fn hset(&self, key: Key, field_values: Vec<(Vec<u8>, Vec<u8>)>) -> Result<usize> {
        self.with_hash_mut(&key, true, |h| {
            let mut added = 0;
            for (field, value) in field_values {
                if h.insert(field, value).is_none() {
                    added += 1;
                }
            }
            added
        })
    }

    pub fn hsetnx(&self, key: Key, field: Vec<u8>, value: Vec<u8>) -> Result<bool> {
        self.with_hash_mut(&key, true, |h| {
            if h.contains_key(&field) {
                false
            } else {
                h.insert(field, value);
                true
            }
        })
    }

    pub fn hget(&self, key: &Key, field: &[u8]) -> Result<Option<Vec<u8>>> {
        self.with_hash_mut(key, false, |h| h.get(field).cloned())
    }

    pub fn hmget(&self, key: &Key, fields: &[&[u8]]) -> Result<Vec<Option<Vec<u8>>>> {
        self.with_hash_mut(key, false, |h| {
            fields.iter().map(|f| h.get(*f).cloned()).collect()
        })
    }

    pub fn hgetall(&self, key: &Key) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.with_hash_mut(key, false, |h| {
            h.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        })
    }

    pub fn hdel(&self, key: &Key, fields: &[&[u8]]) -> Result<usize> {
        self.with_hash_mut(key, false, |h| {
            fields.iter().filter(|f| h.remove(**f).is_some()).count()
        })
    }

    pub fn hlen(&self, key: &Key) -> Result<usize> {
        self.with_hash_mut(key, false, |h| h.len())
    }

    pub fn hexists(&self, key: &Key, field: &[u8]) -> Result<bool> {
        self.with_hash_mut(key, false, |h| h.contains_key(field))
    }

    pub fn hkeys(&self, key: &Key) -> Result<Vec<Vec<u8>>> {
        self.with_hash_mut(key, false, |h| h.keys().cloned().collect())
    }

    pub fn hvals(&self, key: &Key) -> Result<Vec<Vec<u8>>> {
        self.with_hash_mut(key, false, |h| h.values().cloned().collect())
    }

    pub fn hincrby(&self, key: Key, field: Vec<u8>, increment: i64) -> Result<i64> {
        self.with_hash_mut(&key, true, |h| -> Result<i64> {
            let current = match h.get(&field) {
                Some(bytes) => {
                    let text = std::str::from_utf8(bytes).map_err(|_| CommandError::NotInteger)?;
                    text.trim().parse::<i64>().map_err(|_| CommandError::NotInteger)?
                }
                None => 0,
            };
            let new_value = current.checked_add(increment).ok_or(CommandError::IntegerOverflow)?;
            h.insert(field, new_value.to_string().into_bytes());
            Ok(new_value)
        })?
    }

    // ---- stream ops ----

    fn get_or_create_stream(&self, key: &Key) -> Result<Arc<Stream>> {
        let mut data = self.data.lock().unwrap();
        let exists = Self::reap_if_expired(&mut data, key);

        if !exists {
            data.insert(key.clone(), StoredValue::new(Value::Stream(Arc::new(Stream::new()))));
        }

        match data.get(key.as_slice()).map(|s| &s.value) {
            Some(Value::Stream(s)) => Ok(Arc::clone(s)),
            Some(_) => Err(StorageError::WrongType.into()),
            None => unreachable!(),
        }
    }

    fn get_stream(&self, key: &[u8]) -> Option<Arc<Stream>> {
        let mut data = self.data.lock().unwrap();
        if !Self::reap_if_expired(&mut data, key) {
            return None;
        }
        match data.get(key).map(|s| &s.value) {
            Some(Value::Stream(s)) => Some(Arc::clone(s)),
            _ => None,
        }
    }

    pub fn xadd_auto(&self, key: Key, fields: Vec<(Vec<u8>, Vec<u8>)>) -> Result<StreamId> {
        let stream = self.get_or_create_stream(&key)?;
        Ok(stream.add_auto(fields))
    }

    /// XADD with an explicit or partially-wildcarded id ("ms-*" or full
    /// "ms-seq"). `seq = None` means the `*` sequence wildcard. Returns the
    /// exact §4.3 error strings on ordering violations.
    pub fn xadd_with_id_spec(
        &self,
        key: Key,
        millis: u64,
        seq: Option<u64>,
        fields: Vec<(Vec<u8>, Vec<u8>)>,
    ) -> Result<std::result::Result<StreamId, &'static str>> {
        let stream = self.get_or_create_stream(&key)?;
        let id = match seq {
            Some(seq) => StreamId::new(millis, seq),
            None => stream.next_id_for_millis(millis),
        };

        if id.millis() == 0 && id.seq() == 0 {
            return Ok(Err("The ID specified in XADD must be greater than 0-0"));
        }

        Ok(stream.add_with_id(id, fields))
    }

    pub fn xrange(
        &self,
        key: &[u8],
        start: StreamId,
        end: StreamId,
        count: Option<usize>,
    ) -> Vec<StreamEntry> {
        match self.get_stream(key) {
            Some(stream) => stream.range(start, end, count),
            None => Vec::new(),
        }
    }

    /// XREAD over one or more streams. Blocks (polling at a ~50ms cadence,
    /// per the documented fallback) until new data arrives or `block`
    /// elapses; `None` means don't block at all.
    pub fn xread(
        &self,
        keys_and_ids: &[(Vec<u8>, StreamId)],
        count: Option<usize>,
        block: Option<Duration>,
    ) -> Vec<(Vec<u8>, Vec<StreamEntry>)> {
        const POLL_INTERVAL: Duration = Duration::from_millis(50);
        let deadline = block.map(|d| std::time::Instant::now() + d);

        loop {
            let mut results = Vec::new();
            for (key, after) in keys_and_ids {
                if let Some(stream) = self.get_stream(key) {
                    let entries = stream.range_after(*after, count);
                    if !entries.is_empty() {
                        results.push((key.clone(), entries));
                    }
                }
            }

            if !results.is_empty() || deadline.is_none() {
                return results;
            }

            match deadline {
                Some(deadline) if std::time::Instant::now() >= deadline => return Vec::new(),
                _ => thread::sleep(POLL_INTERVAL),
            }
        }
    }
}
