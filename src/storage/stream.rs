//! Append-only stream storage.
//!
//! A stream is a single mutex-protected, strictly-ordered log of entries
//! keyed by `(milliseconds, sequence)` ids. The id is bit-packed into a
//! `u128` so ordering and formatting stay cheap.

use std::cmp::Ordering as CmpOrdering;
use std::fmt::{self, Display};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A stream entry id: high 64 bits are the millisecond timestamp, low 64
/// bits are the per-millisecond sequence counter.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct StreamId {
    packed: u128,
}

impl StreamId {
    #[inline]
    pub fn new(millis: u64, seq: u64) -> Self {
        StreamId {
            packed: ((millis as u128) << 64) | (seq as u128),
        }
    }

    #[inline]
    pub fn millis(&self) -> u64 {
        (self.packed >> 64) as u64
    }

    #[inline]
    pub fn seq(&self) -> u64 {
        self.packed as u64
    }

    pub fn min() -> Self {
        StreamId { packed: 0 }
    }

    pub fn max() -> Self {
        StreamId { packed: u128::MAX }
    }

    /// Parse a fully-qualified "ms-seq" id, used by XRANGE bounds and
    /// explicit XADD ids.
    pub fn from_string(s: &str) -> Option<Self> {
        let (millis_str, seq_str) = s.split_once('-')?;
        let millis = millis_str.parse::<u64>().ok()?;
        let seq = seq_str.parse::<u64>().ok()?;
        Some(StreamId::new(millis, seq))
    }

    /// Parse just the millis portion of a partial id (e.g. XADD's `5-*`).
    pub fn parse_millis(s: &str) -> Option<u64> {
        s.parse::<u64>().ok()
    }
}

impl PartialOrd for StreamId {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for StreamId {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.packed.cmp(&other.packed)
    }
}

impl Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis(), self.seq())
    }
}

#[derive(Clone, Debug)]
pub struct StreamEntry {
    pub id: StreamId,
    pub fields: Vec<(Vec<u8>, Vec<u8>)>,
}

struct Inner {
    entries: Vec<StreamEntry>,
    last_id: StreamId,
}

/// A single stream's entry log plus a condvar so XREAD BLOCK can wait for
/// new entries without busy-polling.
pub struct Stream {
    inner: Mutex<Inner>,
    new_entry: Condvar,
}

impl Stream {
    pub fn new() -> Self {
        Stream {
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                last_id: StreamId::new(0, 0),
            }),
            new_entry: Condvar::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn last_id(&self) -> StreamId {
        self.inner.lock().unwrap().last_id
    }

    /// Generate the next auto id for the current wall-clock millisecond,
    /// bumping the sequence if two entries land in the same millisecond.
    pub fn add_auto(&self, fields: Vec<(Vec<u8>, Vec<u8>)>) -> StreamId {
        let mut inner = self.inner.lock().unwrap();
        let now_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;

        let id = if now_millis > inner.last_id.millis() {
            StreamId::new(now_millis, 0)
        } else {
            StreamId::new(inner.last_id.millis(), inner.last_id.seq() + 1)
        };

        inner.entries.push(StreamEntry { id, fields });
        inner.last_id = id;
        drop(inner);
        self.new_entry.notify_all();
        id
    }

    /// Add an entry at an explicit id. Rejects ids that aren't strictly
    /// greater than the stream's last id.
    pub fn add_with_id(
        &self,
        id: StreamId,
        fields: Vec<(Vec<u8>, Vec<u8>)>,
    ) -> Result<StreamId, &'static str> {
        let mut inner = self.inner.lock().unwrap();
        if id <= inner.last_id {
            return Err("The ID specified in XADD is equal or smaller than the target stream top item");
        }
        inner.entries.push(StreamEntry { id, fields });
        inner.last_id = id;
        drop(inner);
        self.new_entry.notify_all();
        Ok(id)
    }

    /// Resolve the next id after an explicit millis component and an
    /// optional `*` sequence wildcard, per XADD's partial-id rules.
    pub fn next_id_for_millis(&self, millis: u64) -> StreamId {
        let inner = self.inner.lock().unwrap();
        if millis == inner.last_id.millis() {
            StreamId::new(millis, inner.last_id.seq() + 1)
        } else {
            StreamId::new(millis, 0)
        }
    }

    pub fn range(&self, start: StreamId, end: StreamId, count: Option<usize>) -> Vec<StreamEntry> {
        let inner = self.inner.lock().unwrap();
        let max = count.unwrap_or(usize::MAX);
        inner
            .entries
            .iter()
            .filter(|e| e.id >= start && e.id <= end)
            .take(max)
            .cloned()
            .collect()
    }

    pub fn range_after(&self, after: StreamId, count: Option<usize>) -> Vec<StreamEntry> {
        let inner = self.inner.lock().unwrap();
        let max = count.unwrap_or(usize::MAX);
        inner
            .entries
            .iter()
            .filter(|e| e.id > after)
            .take(max)
            .cloned()
            .collect()
    }

    /// Block until an entry newer than `after` is appended, or the
    /// timeout elapses. `None` timeout blocks indefinitely.
    pub fn wait_for_entry_after(&self, after: StreamId, timeout: Option<Duration>) -> Vec<StreamEntry> {
        let deadline = timeout.map(|d| Instant::now() + d);
        let mut inner = self.inner.lock().unwrap();
        loop {
            let fresh: Vec<StreamEntry> = inner
                .entries
                .iter()
                .filter(|e| e.id > after)
                .cloned()
                .collect();
            if !fresh.is_empty() {
                return fresh;
            }

            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Vec::new();
                    }
                    let (guard, timeout_result) = self
                        .new_entry
                        .wait_timeout(inner, deadline - now)
                        .unwrap();
                    inner = guard;
                    if timeout_result.timed_out() {
                        // one more check above before giving up
                        let fresh: Vec<StreamEntry> = inner
                            .entries
                            .iter()
                            .filter(|e| e.id > after)
                            .cloned()
                            .collect();
                        return fresh;
                    }
                }
                None => {
                    inner = self.new_entry.wait(inner).unwrap();
                }
            }
        }
    }
}

impl Clone for Stream {
    fn clone(&self) -> Self {
        let inner = self.inner.lock().unwrap();
        Stream {
            inner: Mutex::new(Inner {
                entries: inner.entries.clone(),
                last_id: inner.last_id,
            }),
            new_entry: Condvar::new(),
        }
    }
}

impl Default for Stream {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        write!(f, "Stream {{ len: {}, last_id: {} }}", inner.entries.len(), inner.last_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_auto_monotonic() {
        let s = Stream::new();
        let id1 = s.add_auto(vec![(b"a".to_vec(), b"1".to_vec())]);
        let id2 = s.add_auto(vec![(b"a".to_vec(), b"2".to_vec())]);
        assert!(id2 > id1);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_add_with_id_rejects_non_increasing() {
        let s = Stream::new();
        s.add_with_id(StreamId::new(5, 0), vec![]).unwrap();
        let err = s.add_with_id(StreamId::new(5, 0), vec![]).unwrap_err();
        assert!(err.contains("equal or smaller"));
        let err = s.add_with_id(StreamId::new(4, 9), vec![]).unwrap_err();
        assert!(err.contains("equal or smaller"));
    }

    #[test]
    fn test_range() {
        let s = Stream::new();
        for i in 1..=5u64 {
            s.add_with_id(StreamId::new(i, 0), vec![]).unwrap();
        }
        let entries = s.range(StreamId::new(2, 0), StreamId::new(4, 0), None);
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn test_blocking_wakes_on_append() {
        use std::sync::Arc;
        use std::thread;

        let stream = Arc::new(Stream::new());
        let last = stream.last_id();

        let reader = {
            let stream = Arc::clone(&stream);
            thread::spawn(move || stream.wait_for_entry_after(last, Some(Duration::from_secs(5))))
        };

        thread::sleep(Duration::from_millis(20));
        stream.add_auto(vec![(b"k".to_vec(), b"v".to_vec())]);

        let entries = reader.join().unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_block_timeout_returns_empty() {
        let stream = Stream::new();
        let last = stream.last_id();
        let entries = stream.wait_for_entry_after(last, Some(Duration::from_millis(30)));
        assert!(entries.is_empty());
    }
}
