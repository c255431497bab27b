//! Hash command implementations
//!
//! Redis-compatible hash operations for field-value pairs within a key.

use crate::error::{CommandError, Result};
use crate::protocol::RespFrame;
use crate::storage::StorageEngine;
use std::sync::Arc;

fn arg_bytes(frame: &RespFrame) -> Result<&[u8]> {
    match frame {
        RespFrame::BulkString(Some(bytes)) => Ok(bytes.as_ref()),
        _ => Err(CommandError::Generic("invalid argument format".into()).into()),
    }
}

/// HSET key field value [field value ...]
pub fn handle_hset(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() < 4 || (parts.len() - 2) % 2 != 0 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'hset' command"));
    }

    let key = arg_bytes(&parts[1])?.to_vec();

    let mut field_values = Vec::new();
    for i in (2..parts.len()).step_by(2) {
        let field = arg_bytes(&parts[i])?.to_vec();
        let value = arg_bytes(&parts[i + 1])?.to_vec();
        field_values.push((field, value));
    }

    match storage.hset(key, field_values) {
        Ok(added) => Ok(RespFrame::Integer(added as i64)),
        Err(e) => Ok(RespFrame::error(e.to_string())),
    }
}

/// HSETNX key field value
pub fn handle_hsetnx(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() != 4 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'hsetnx' command"));
    }

    let key = arg_bytes(&parts[1])?.to_vec();
    let field = arg_bytes(&parts[2])?.to_vec();
    let value = arg_bytes(&parts[3])?.to_vec();

    match storage.hsetnx(key, field, value) {
        Ok(set) => Ok(RespFrame::Integer(if set { 1 } else { 0 })),
        Err(e) => Ok(RespFrame::error(e.to_string())),
    }
}

/// HMSET key field value [field value ...] — same semantics as HSET, old
/// reply shape (+OK instead of the added-field count).
pub fn handle_hmset(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() < 4 || (parts.len() - 2) % 2 != 0 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'hmset' command"));
    }

    let key = arg_bytes(&parts[1])?.to_vec();

    let mut field_values = Vec::new();
    for i in (2..parts.len()).step_by(2) {
        let field = arg_bytes(&parts[i])?.to_vec();
        let value = arg_bytes(&parts[i + 1])?.to_vec();
        field_values.push((field, value));
    }

    match storage.hset(key, field_values) {
        Ok(_) => Ok(RespFrame::ok()),
        Err(e) => Ok(RespFrame::error(e.to_string())),
    }
}

/// HGET key field
pub fn handle_hget(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() != 3 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'hget' command"));
    }

    let key = arg_bytes(&parts[1])?.to_vec();
    let field = arg_bytes(&parts[2])?;

    match storage.hget(&key, field) {
        Ok(Some(value)) => Ok(RespFrame::from_bytes(value)),
        Ok(None) => Ok(RespFrame::null_bulk()),
        Err(e) => Ok(RespFrame::error(e.to_string())),
    }
}

/// HMGET key field [field ...]
pub fn handle_hmget(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() < 3 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'hmget' command"));
    }

    let key = arg_bytes(&parts[1])?.to_vec();
    let fields: Vec<&[u8]> = parts[2..].iter().map(arg_bytes).collect::<Result<Vec<_>>>()?;

    match storage.hmget(&key, &fields) {
        Ok(values) => Ok(RespFrame::array(
            values
                .into_iter()
                .map(|v| match v {
                    Some(bytes) => RespFrame::from_bytes(bytes),
                    None => RespFrame::null_bulk(),
                })
                .collect(),
        )),
        Err(e) => Ok(RespFrame::error(e.to_string())),
    }
}

/// HGETALL key
pub fn handle_hgetall(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() != 2 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'hgetall' command"));
    }

    let key = arg_bytes(&parts[1])?.to_vec();

    match storage.hgetall(&key) {
        Ok(pairs) => {
            let mut flat = Vec::with_capacity(pairs.len() * 2);
            for (field, value) in pairs {
                flat.push(RespFrame::from_bytes(field));
                flat.push(RespFrame::from_bytes(value));
            }
            Ok(RespFrame::array(flat))
        }
        Err(e) => Ok(RespFrame::error(e.to_string())),
    }
}

/// HDEL key field [field ...]
pub fn handle_hdel(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() < 3 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'hdel' command"));
    }

    let key = arg_bytes(&parts[1])?.to_vec();
    let fields: Vec<&[u8]> = parts[2..].iter().map(arg_bytes).collect::<Result<Vec<_>>>()?;

    match storage.hdel(&key, &fields) {
        Ok(removed) => Ok(RespFrame::Integer(removed as i64)),
        Err(e) => Ok(RespFrame::error(e.to_string())),
    }
}

/// HLEN key
pub fn handle_hlen(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() != 2 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'hlen' command"));
    }

    let key = arg_bytes(&parts[1])?.to_vec();

    match storage.hlen(&key) {
        Ok(len) => Ok(RespFrame::Integer(len as i64)),
        Err(e) => Ok(RespFrame::error(e.to_string())),
    }
}

/// HEXISTS key field
pub fn handle_hexists(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() != 3 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'hexists' command"));
    }

    let key = arg_bytes(&parts[1])?.to_vec();
    let field = arg_bytes(&parts[2])?;

    match storage.hexists(&key, field) {
        Ok(exists) => Ok(RespFrame::Integer(if exists { 1 } else { 0 })),
        Err(e) => Ok(RespFrame::error(e.to_string())),
    }
}

/// HKEYS key
pub fn handle_hkeys(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() != 2 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'hkeys' command"));
    }

    let key = arg_bytes(&parts[1])?.to_vec();

    match storage.hkeys(&key) {
        Ok(fields) => Ok(RespFrame::array(fields.into_iter().map(RespFrame::from_bytes).collect())),
        Err(e) => Ok(RespFrame::error(e.to_string())),
    }
}

/// HVALS key
pub fn handle_hvals(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() != 2 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'hvals' command"));
    }

    let key = arg_bytes(&parts[1])?.to_vec();

    match storage.hvals(&key) {
        Ok(values) => Ok(RespFrame::array(values.into_iter().map(RespFrame::from_bytes).collect())),
        Err(e) => Ok(RespFrame::error(e.to_string())),
    }
}

/// HINCRBY key field increment
pub fn handle_hincrby(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() != 4 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'hincrby' command"));
    }

    let key = arg_bytes(&parts[1])?.to_vec();
    let field = arg_bytes(&parts[2])?.to_vec();
    let increment: i64 = match std::str::from_utf8(arg_bytes(&parts[3])?).ok().and_then(|s| s.parse().ok()) {
        Some(n) => n,
        None => return Err(CommandError::NotInteger.into()),
    };

    match storage.hincrby(key, field, increment) {
        Ok(n) => Ok(RespFrame::Integer(n)),
        Err(e) => Ok(RespFrame::error(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> RespFrame {
        RespFrame::from_string(s)
    }

    #[test]
    fn test_hset_hget() {
        let storage = StorageEngine::new();
        let hset_parts = vec![bulk("HSET"), bulk("h"), bulk("f1"), bulk("v1")];
        assert_eq!(handle_hset(&storage, &hset_parts).unwrap(), RespFrame::Integer(1));

        let hget_parts = vec![bulk("HGET"), bulk("h"), bulk("f1")];
        assert_eq!(handle_hget(&storage, &hget_parts).unwrap(), RespFrame::from_string("v1"));
    }

    #[test]
    fn test_hsetnx_respects_existing_field() {
        let storage = StorageEngine::new();
        handle_hset(&storage, &[bulk("HSET"), bulk("h"), bulk("f"), bulk("v1")]).unwrap();

        let result = handle_hsetnx(&storage, &[bulk("HSETNX"), bulk("h"), bulk("f"), bulk("v2")]).unwrap();
        assert_eq!(result, RespFrame::Integer(0));

        let get_result = handle_hget(&storage, &[bulk("HGET"), bulk("h"), bulk("f")]).unwrap();
        assert_eq!(get_result, RespFrame::from_string("v1"));
    }

    #[test]
    fn test_hdel_hlen_hexists() {
        let storage = StorageEngine::new();
        handle_hset(
            &storage,
            &[bulk("HSET"), bulk("h"), bulk("a"), bulk("1"), bulk("b"), bulk("2")],
        )
        .unwrap();

        assert_eq!(handle_hlen(&storage, &[bulk("HLEN"), bulk("h")]).unwrap(), RespFrame::Integer(2));
        assert_eq!(
            handle_hexists(&storage, &[bulk("HEXISTS"), bulk("h"), bulk("a")]).unwrap(),
            RespFrame::Integer(1)
        );
        assert_eq!(
            handle_hdel(&storage, &[bulk("HDEL"), bulk("h"), bulk("a")]).unwrap(),
            RespFrame::Integer(1)
        );
        assert_eq!(handle_hlen(&storage, &[bulk("HLEN"), bulk("h")]).unwrap(), RespFrame::Integer(1));
    }

    #[test]
    fn test_hincrby() {
        let storage = StorageEngine::new();
        let parts = vec![bulk("HINCRBY"), bulk("h"), bulk("counter"), bulk("5")];
        assert_eq!(handle_hincrby(&storage, &parts).unwrap(), RespFrame::Integer(5));
        assert_eq!(handle_hincrby(&storage, &parts).unwrap(), RespFrame::Integer(10));
    }

    #[test]
    fn test_hgetall_hkeys_hvals() {
        let storage = StorageEngine::new();
        handle_hset(
            &storage,
            &[bulk("HSET"), bulk("h"), bulk("a"), bulk("1"), bulk("b"), bulk("2")],
        )
        .unwrap();

        let all = handle_hgetall(&storage, &[bulk("HGETALL"), bulk("h")]).unwrap();
        assert!(matches!(all, RespFrame::Array(Some(ref v)) if v.len() == 4));

        let keys = handle_hkeys(&storage, &[bulk("HKEYS"), bulk("h")]).unwrap();
        assert!(matches!(keys, RespFrame::Array(Some(ref v)) if v.len() == 2));

        let vals = handle_hvals(&storage, &[bulk("HVALS"), bulk("h")]).unwrap();
        assert!(matches!(vals, RespFrame::Array(Some(ref v)) if v.len() == 2));
    }
}
