//! RDB snapshot loader
//!
//! Only a loader is implemented: the core never writes a snapshot of its
//! own, it just bootstraps from one at startup and hands replicas a
//! hard-coded empty blob during full resync.

use crate::error::{ForgeError, Result};
use crate::storage::value::now_secs;
use crate::storage::{StorageEngine, StoredValue, Value};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::sync::Arc;

const RDB_MAGIC: &[u8] = b"REDIS";

/// A complete, valid, empty RDB file: magic + version "0009" + EOF opcode +
/// an 8-byte checksum (unchecked by this loader, so zeros suffice). Handed
/// to replicas verbatim as the FULLRESYNC payload.
pub const EMPTY_RDB: &[u8] = b"REDIS0009\xFF\x00\x00\x00\x00\x00\x00\x00\x00";

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RdbOpcode {
    Eof = 0xFF,
    SelectDb = 0xFE,
    ExpireTimeS = 0xFD,
    ExpireTimeMs = 0xFC,
    ResizeDb = 0xFB,
    Aux = 0xFA,
    String = 0x00,
}

impl RdbOpcode {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0xFF => Some(Self::Eof),
            0xFE => Some(Self::SelectDb),
            0xFD => Some(Self::ExpireTimeS),
            0xFC => Some(Self::ExpireTimeMs),
            0xFB => Some(Self::ResizeDb),
            0xFA => Some(Self::Aux),
            0x00 => Some(Self::String),
            _ => None,
        }
    }
}

/// Loads an RDB snapshot from a file or an in-memory buffer into a
/// `StorageEngine`.
pub struct RdbLoader;

impl RdbLoader {
    /// Load `<dir>/<dbfilename>` if it exists. A missing file is not an
    /// error — the keyspace just starts empty.
    pub fn load_file(path: &Path, storage: &Arc<StorageEngine>) -> Result<usize> {
        if !path.exists() {
            println!("RDB: no dump file found at {}", path.display());
            return Ok(0);
        }

        let file = File::open(path).map_err(|e| ForgeError::Io(e.to_string()))?;
        let count = Self::load_reader(BufReader::new(file), storage)?;
        println!("RDB: loaded {} keys from {}", count, path.display());
        Ok(count)
    }

    /// Load a complete RDB image already in memory, as received over a
    /// replication PSYNC.
    pub fn load_bytes(bytes: &[u8], storage: &Arc<StorageEngine>) -> Result<usize> {
        Self::load_reader(io::Cursor::new(bytes), storage)
    }

    fn load_reader<R: Read>(reader: R, storage: &Arc<StorageEngine>) -> Result<usize> {
        let mut reader = RdbReader::new(reader);
        reader.read_header()?;

        let mut loaded = 0;
        loop {
            let byte = reader.read_byte()?;
            let opcode = RdbOpcode::from_byte(byte)
                .ok_or_else(|| ForgeError::Storage(crate::error::StorageError::CorruptRdb(
                    format!("unknown opcode 0x{:02x}", byte),
                )))?;

            match opcode {
                RdbOpcode::Eof => {
                    let _checksum = reader.read_u64_le()?;
                    break;
                }
                RdbOpcode::SelectDb => {
                    let _db = reader.read_length()?;
                }
                RdbOpcode::ResizeDb => {
                    let _hash_size = reader.read_length()?;
                    let _expires_size = reader.read_length()?;
                }
                RdbOpcode::Aux => {
                    let _key = reader.read_string()?;
                    let _value = reader.read_string()?;
                }
                RdbOpcode::ExpireTimeMs => {
                    let expiry_ms = reader.read_u64_le()?;
                    if reader.read_string_entry(storage, Some(expiry_ms as f64 / 1000.0))? {
                        loaded += 1;
                    }
                }
                RdbOpcode::ExpireTimeS => {
                    let expiry_s = reader.read_u32_le()?;
                    if reader.read_string_entry(storage, Some(expiry_s as f64))? {
                        loaded += 1;
                    }
                }
                RdbOpcode::String => {
                    if reader.read_string_body(storage, None)? {
                        loaded += 1;
                    }
                }
            }
        }

        Ok(loaded)
    }
}

struct RdbReader<R: Read> {
    reader: R,
}

impl<R: Read> RdbReader<R> {
    fn new(reader: R) -> Self {
        RdbReader { reader }
    }

    fn read_header(&mut self) -> Result<()> {
        let mut magic = [0u8; 5];
        self.read_exact(&mut magic)?;
        if magic != RDB_MAGIC {
            return Err(crate::error::StorageError::CorruptRdb("bad magic".into()).into());
        }

        let mut version = [0u8; 4];
        self.read_exact(&mut version)?;
        String::from_utf8_lossy(&version)
            .parse::<u16>()
            .map_err(|_| crate::error::StorageError::CorruptRdb("bad version".into()))?;

        Ok(())
    }

    /// Read a value-type opcode byte followed by its payload, for the
    /// `ExpireTimeMs`/`ExpireTimeS` cases where the opcode was already
    /// consumed as a record header.
    fn read_string_entry(&mut self, storage: &Arc<StorageEngine>, expires_at: Option<f64>) -> Result<bool> {
        let value_type = self.read_byte()?;
        if RdbOpcode::from_byte(value_type) != Some(RdbOpcode::String) {
            return Err(crate::error::StorageError::CorruptRdb(
                format!("unsupported value type 0x{:02x}", value_type),
            )
            .into());
        }
        self.read_string_body(storage, expires_at)
    }

    fn read_string_body(&mut self, storage: &Arc<StorageEngine>, expires_at: Option<f64>) -> Result<bool> {
        let key = self.read_string()?;
        let value = self.read_string()?;

        if let Some(at) = expires_at {
            if at <= now_secs() {
                return Ok(false);
            }
            storage.load_entry(key, StoredValue::with_expiry(Value::String(value), at));
        } else {
            storage.load_entry(key, StoredValue::new(Value::String(value)));
        }
        Ok(true)
    }

    fn read_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.reader
            .read_exact(buf)
            .map_err(|e| ForgeError::Io(e.to_string()))
    }

    /// Variable-width length prefix per §4.5: 6-bit, 14-bit, 32-bit, or the
    /// `11xxxxxx` integer-string special encoding. The integer forms are
    /// decoded to their decimal text representation since the core only
    /// stores byte strings.
    fn read_length(&mut self) -> Result<usize> {
        match self.read_length_or_special()? {
            LengthOrEncoding::Length(n) => Ok(n),
            LengthOrEncoding::Special(_) => Err(crate::error::StorageError::CorruptRdb(
                "unexpected integer-string encoding in a length-only context".into(),
            )
            .into()),
        }
    }

    fn read_length_or_special(&mut self) -> Result<LengthOrEncoding> {
        let first = self.read_byte()?;
        match first >> 6 {
            0 => Ok(LengthOrEncoding::Length((first & 0x3F) as usize)),
            1 => {
                let second = self.read_byte()?;
                Ok(LengthOrEncoding::Length((((first & 0x3F) as usize) << 8) | second as usize))
            }
            2 => {
                let len = self.read_u32_be()?;
                Ok(LengthOrEncoding::Length(len as usize))
            }
            _ => Ok(LengthOrEncoding::Special(first & 0x3F)),
        }
    }

    fn read_string(&mut self) -> Result<Vec<u8>> {
        match self.read_length_or_special()? {
            LengthOrEncoding::Length(len) => {
                let mut buf = vec![0u8; len];
                self.read_exact(&mut buf)?;
                Ok(buf)
            }
            LengthOrEncoding::Special(encoding) => match encoding {
                0 => {
                    let v = self.read_byte()? as i8;
                    Ok(v.to_string().into_bytes())
                }
                1 => {
                    let mut buf = [0u8; 2];
                    self.read_exact(&mut buf)?;
                    Ok((i16::from_le_bytes(buf)).to_string().into_bytes())
                }
                2 => {
                    let mut buf = [0u8; 4];
                    self.read_exact(&mut buf)?;
                    Ok((i32::from_le_bytes(buf)).to_string().into_bytes())
                }
                _ => Err(crate::error::StorageError::CorruptRdb(
                    "LZF-compressed strings are not supported".into(),
                )
                .into()),
            },
        }
    }

    fn read_u32_le(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u32_be(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    fn read_u64_le(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}

enum LengthOrEncoding {
    Length(usize),
    Special(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_rdb(entries: &[(&[u8], &[u8], Option<f64>)]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(RDB_MAGIC);
        buf.extend_from_slice(b"0009");
        buf.push(RdbOpcode::SelectDb as u8);
        buf.push(0);

        for (key, value, expiry) in entries {
            if let Some(secs) = expiry {
                buf.push(RdbOpcode::ExpireTimeMs as u8);
                buf.extend_from_slice(&((*secs * 1000.0) as u64).to_le_bytes());
            }
            buf.push(RdbOpcode::String as u8);
            buf.push(key.len() as u8);
            buf.extend_from_slice(key);
            buf.push(value.len() as u8);
            buf.extend_from_slice(value);
        }

        buf.push(RdbOpcode::Eof as u8);
        buf.extend_from_slice(&0u64.to_le_bytes());
        buf
    }

    #[test]
    fn test_load_bytes_roundtrip() {
        let storage = StorageEngine::new();
        let bytes = build_rdb(&[(b"foo", b"bar", None), (b"baz", b"qux", None)]);
        let loaded = RdbLoader::load_bytes(&bytes, &storage).unwrap();
        assert_eq!(loaded, 2);
        assert_eq!(storage.get_string(b"foo").unwrap(), Some(b"bar".to_vec()));
        assert_eq!(storage.get_string(b"baz").unwrap(), Some(b"qux".to_vec()));
    }

    #[test]
    fn test_load_skips_expired_entries() {
        let storage = StorageEngine::new();
        let bytes = build_rdb(&[(b"gone", b"v", Some(now_secs() - 10.0))]);
        let loaded = RdbLoader::load_bytes(&bytes, &storage).unwrap();
        assert_eq!(loaded, 0);
        assert_eq!(storage.get_string(b"gone").unwrap(), None);
    }

    #[test]
    fn test_load_missing_file_is_not_an_error() {
        let storage = StorageEngine::new();
        let path = Path::new("/nonexistent/path/to/dump.rdb");
        let loaded = RdbLoader::load_file(path, &storage).unwrap();
        assert_eq!(loaded, 0);
    }

    #[test]
    fn test_load_file_from_disk() {
        use std::io::Write as _;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.rdb");
        let bytes = build_rdb(&[(b"k", b"v", None)]);
        std::fs::File::create(&path).unwrap().write_all(&bytes).unwrap();

        let storage = StorageEngine::new();
        let loaded = RdbLoader::load_file(&path, &storage).unwrap();
        assert_eq!(loaded, 1);
        assert_eq!(storage.get_string(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_empty_rdb_blob_parses() {
        let storage = StorageEngine::new();
        let loaded = RdbLoader::load_bytes(EMPTY_RDB, &storage).unwrap();
        assert_eq!(loaded, 0);
    }
}
