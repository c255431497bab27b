//! String command implementations, plus a few connection-level commands
//! (PING/ECHO) that don't warrant their own module.

use crate::error::{CommandError, Result};
use crate::protocol::RespFrame;
use crate::storage::value::now_secs;
use crate::storage::StorageEngine;
use std::sync::Arc;

fn arg_bytes(frame: &RespFrame) -> Result<&[u8]> {
    match frame {
        RespFrame::BulkString(Some(bytes)) => Ok(bytes.as_ref()),
        _ => Err(CommandError::Generic("invalid argument format".into()).into()),
    }
}

fn arg_string(frame: &RespFrame) -> Result<String> {
    let bytes = arg_bytes(frame)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| CommandError::Generic("invalid UTF-8 argument".into()).into())
}

/// SET key value [NX|XX] [EX seconds|PX milliseconds]
pub fn handle_set(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() < 3 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'set' command"));
    }

    let key = arg_bytes(&parts[1])?.to_vec();
    let value = arg_bytes(&parts[2])?.to_vec();

    let mut nx = false;
    let mut xx = false;
    let mut expires_at: Option<f64> = None;

    let mut i = 3;
    while i < parts.len() {
        let opt = arg_string(&parts[i])?.to_uppercase();
        match opt.as_str() {
            "NX" => nx = true,
            "XX" => xx = true,
            "EX" => {
                i += 1;
                if i >= parts.len() {
                    return Ok(RespFrame::error("ERR syntax error"));
                }
                let secs: i64 = arg_string(&parts[i])?
                    .parse()
                    .map_err(|_| CommandError::NotInteger)?;
                expires_at = Some(now_secs() + secs as f64);
            }
            "PX" => {
                i += 1;
                if i >= parts.len() {
                    return Ok(RespFrame::error("ERR syntax error"));
                }
                let millis: i64 = arg_string(&parts[i])?
                    .parse()
                    .map_err(|_| CommandError::NotInteger)?;
                expires_at = Some(now_secs() + (millis as f64) / 1000.0);
            }
            _ => return Ok(RespFrame::error("ERR syntax error")),
        }
        i += 1;
    }

    if nx && xx {
        return Ok(RespFrame::error("ERR syntax error"));
    }

    if storage.set(key, value, nx, xx, expires_at) {
        Ok(RespFrame::ok())
    } else {
        Ok(RespFrame::null_bulk())
    }
}

/// SETEX key seconds value
pub fn handle_setex(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() != 4 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'setex' command"));
    }

    let key = arg_bytes(&parts[1])?.to_vec();
    let seconds: u64 = arg_string(&parts[2])?
        .parse()
        .map_err(|_| CommandError::NotInteger)?;
    let value = arg_bytes(&parts[3])?.to_vec();

    storage.setex(key, seconds, value);
    Ok(RespFrame::ok())
}

/// GETSET key value
pub fn handle_getset(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() != 3 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'getset' command"));
    }

    let key = arg_bytes(&parts[1])?.to_vec();
    let value = arg_bytes(&parts[2])?.to_vec();

    match storage.getset(key, value) {
        Ok(Some(old)) => Ok(RespFrame::from_bytes(old)),
        Ok(None) => Ok(RespFrame::null_bulk()),
        Err(e) => Ok(RespFrame::error(e.to_string())),
    }
}

/// DEL key [key ...]
pub fn handle_del(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() < 2 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'del' command"));
    }

    let keys: Vec<Vec<u8>> = parts[1..]
        .iter()
        .map(arg_bytes)
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .map(|b| b.to_vec())
        .collect();

    Ok(RespFrame::Integer(storage.del(&keys) as i64))
}

fn incr_handler(storage: &Arc<StorageEngine>, parts: &[RespFrame], name: &str, sign: i64) -> Result<RespFrame> {
    if parts.len() != 2 {
        return Ok(RespFrame::error(format!("ERR wrong number of arguments for '{}' command", name)));
    }
    let key = arg_bytes(&parts[1])?.to_vec();
    match storage.incr_by(key, sign) {
        Ok(n) => Ok(RespFrame::Integer(n)),
        Err(e) => Ok(RespFrame::error(e.to_string())),
    }
}

fn incr_by_handler(storage: &Arc<StorageEngine>, parts: &[RespFrame], name: &str, sign: i64) -> Result<RespFrame> {
    if parts.len() != 3 {
        return Ok(RespFrame::error(format!("ERR wrong number of arguments for '{}' command", name)));
    }
    let key = arg_bytes(&parts[1])?.to_vec();
    let delta: i64 = arg_string(&parts[2])?
        .parse()
        .map_err(|_| CommandError::NotInteger)?;
    match storage.incr_by(key, sign * delta) {
        Ok(n) => Ok(RespFrame::Integer(n)),
        Err(e) => Ok(RespFrame::error(e.to_string())),
    }
}

/// INCR key
pub fn handle_incr(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    incr_handler(storage, parts, "incr", 1)
}

/// DECR key
pub fn handle_decr(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    incr_handler(storage, parts, "decr", -1)
}

/// INCRBY key increment
pub fn handle_incrby(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    incr_by_handler(storage, parts, "incrby", 1)
}

/// DECRBY key decrement
pub fn handle_decrby(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    incr_by_handler(storage, parts, "decrby", -1)
}

/// APPEND key value
pub fn handle_append(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() != 3 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'append' command"));
    }
    let key = arg_bytes(&parts[1])?.to_vec();
    let value = arg_bytes(&parts[2])?.to_vec();

    match storage.append(key, value) {
        Ok(len) => Ok(RespFrame::Integer(len as i64)),
        Err(e) => Ok(RespFrame::error(e.to_string())),
    }
}

/// SETBIT key offset value
pub fn handle_setbit(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() != 4 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'setbit' command"));
    }
    let key = arg_bytes(&parts[1])?.to_vec();
    let offset: usize = arg_string(&parts[2])?
        .parse()
        .map_err(|_| CommandError::NotInteger)?;
    let bit: u8 = arg_string(&parts[3])?
        .parse()
        .map_err(|_| CommandError::NotInteger)?;

    if bit != 0 && bit != 1 {
        return Ok(RespFrame::error("ERR bit is not an integer or out of range"));
    }

    match storage.setbit(key, offset, bit) {
        Ok(old) => Ok(RespFrame::Integer(old as i64)),
        Err(e) => Ok(RespFrame::error(e.to_string())),
    }
}

/// MSET key value [key value ...]
pub fn handle_mset(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() < 3 || parts.len() % 2 == 0 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'mset' command"));
    }

    let mut pairs = Vec::with_capacity(parts.len() / 2);
    for i in (1..parts.len()).step_by(2) {
        let key = arg_bytes(&parts[i])?.to_vec();
        let value = arg_bytes(&parts[i + 1])?.to_vec();
        pairs.push((key, value));
    }

    storage.mset(pairs);
    Ok(RespFrame::ok())
}

/// MSETNX key value [key value ...]
pub fn handle_msetnx(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() < 3 || parts.len() % 2 == 0 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'msetnx' command"));
    }

    let mut pairs = Vec::with_capacity(parts.len() / 2);
    for i in (1..parts.len()).step_by(2) {
        let key = arg_bytes(&parts[i])?.to_vec();
        let value = arg_bytes(&parts[i + 1])?.to_vec();
        pairs.push((key, value));
    }

    Ok(RespFrame::Integer(if storage.msetnx(pairs) { 1 } else { 0 }))
}

/// TYPE key
pub fn handle_type(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() != 2 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'type' command"));
    }
    let key = arg_bytes(&parts[1])?;
    match storage.key_type(key) {
        Some(vt) => Ok(RespFrame::simple_string(vt.as_str())),
        None => Ok(RespFrame::simple_string("none")),
    }
}

/// KEYS pattern — only the `*` pattern (all keys) is supported.
pub fn handle_keys(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() != 2 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'keys' command"));
    }
    let pattern = arg_bytes(&parts[1])?;
    let keys = storage.keys(pattern);
    Ok(RespFrame::array(keys.into_iter().map(RespFrame::from_bytes).collect()))
}

/// PING [message]
pub fn handle_ping(parts: &[RespFrame]) -> Result<RespFrame> {
    match parts.len() {
        1 => Ok(RespFrame::simple_string("PONG")),
        2 => Ok(RespFrame::from_bytes(arg_bytes(&parts[1])?.to_vec())),
        _ => Ok(RespFrame::error("ERR wrong number of arguments for 'ping' command")),
    }
}

/// ECHO message
pub fn handle_echo(parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() != 2 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'echo' command"));
    }
    Ok(RespFrame::from_bytes(arg_bytes(&parts[1])?.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> RespFrame {
        RespFrame::from_string(s)
    }

    #[test]
    fn test_set_and_getset() {
        let storage = StorageEngine::new();
        let set_parts = vec![bulk("SET"), bulk("k"), bulk("v1")];
        assert_eq!(handle_set(&storage, &set_parts).unwrap(), RespFrame::ok());

        let getset_parts = vec![bulk("GETSET"), bulk("k"), bulk("v2")];
        let result = handle_getset(&storage, &getset_parts).unwrap();
        assert_eq!(result, RespFrame::from_string("v1"));
    }

    #[test]
    fn test_getset_against_hash_key_returns_wrongtype_reply() {
        let storage = StorageEngine::new();
        storage.hset(b"h".to_vec(), vec![(b"f".to_vec(), b"v".to_vec())]).unwrap();
        let result = handle_getset(&storage, &[bulk("GETSET"), bulk("h"), bulk("v")]).unwrap();
        assert!(result.is_error());
    }

    #[test]
    fn test_set_nx_on_existing_key_fails() {
        let storage = StorageEngine::new();
        let set_parts = vec![bulk("SET"), bulk("k"), bulk("v1")];
        handle_set(&storage, &set_parts).unwrap();

        let nx_parts = vec![bulk("SET"), bulk("k"), bulk("v2"), bulk("NX")];
        let result = handle_set(&storage, &nx_parts).unwrap();
        assert_eq!(result, RespFrame::null_bulk());
    }

    #[test]
    fn test_incr_decr() {
        let storage = StorageEngine::new();
        let parts = vec![bulk("INCR"), bulk("counter")];
        assert_eq!(handle_incr(&storage, &parts).unwrap(), RespFrame::Integer(1));
        assert_eq!(handle_incr(&storage, &parts).unwrap(), RespFrame::Integer(2));

        let decr_parts = vec![bulk("DECR"), bulk("counter")];
        assert_eq!(handle_decr(&storage, &decr_parts).unwrap(), RespFrame::Integer(1));
    }

    #[test]
    fn test_mset_msetnx() {
        let storage = StorageEngine::new();
        let mset_parts = vec![bulk("MSET"), bulk("a"), bulk("1"), bulk("b"), bulk("2")];
        handle_mset(&storage, &mset_parts).unwrap();

        let msetnx_parts = vec![bulk("MSETNX"), bulk("a"), bulk("9"), bulk("c"), bulk("3")];
        let result = handle_msetnx(&storage, &msetnx_parts).unwrap();
        assert_eq!(result, RespFrame::Integer(0));
    }

    #[test]
    fn test_type_and_keys() {
        let storage = StorageEngine::new();
        handle_set(&storage, &[bulk("SET"), bulk("k"), bulk("v")]).unwrap();

        let type_result = handle_type(&storage, &[bulk("TYPE"), bulk("k")]).unwrap();
        assert_eq!(type_result, RespFrame::simple_string("string"));

        let missing = handle_type(&storage, &[bulk("TYPE"), bulk("missing")]).unwrap();
        assert_eq!(missing, RespFrame::simple_string("none"));

        let keys_result = handle_keys(&storage, &[bulk("KEYS"), bulk("*")]).unwrap();
        assert!(matches!(keys_result, RespFrame::Array(Some(ref v)) if v.len() == 1));
    }

    #[test]
    fn test_ping_echo() {
        assert_eq!(handle_ping(&[bulk("PING")]).unwrap(), RespFrame::simple_string("PONG"));
        assert_eq!(
            handle_ping(&[bulk("PING"), bulk("hello")]).unwrap(),
            RespFrame::from_string("hello")
        );
        assert_eq!(
            handle_echo(&[bulk("ECHO"), bulk("hi")]).unwrap(),
            RespFrame::from_string("hi")
        );
    }
}
