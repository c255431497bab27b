//! Command dispatcher: maps an uppercased command name to its handler.
//!
//! Grounded in the same "big match on command name" shape as the original
//! executor, but only the commands actually in scope survive here.

use crate::config::Config;
use crate::error::{CommandError, Result};
use crate::protocol::RespFrame;
use crate::replication::commands::{handle_info, handle_psync, handle_replconf, handle_wait, Effect};
use crate::replication::ReplicationState;
use crate::storage::StorageEngine;
use std::sync::Arc;

use super::config::handle_config;
use super::hashes::*;
use super::streams::{handle_xadd, handle_xrange, handle_xread};
use super::strings::*;

/// Commands whose successful application must be propagated to replicas.
pub const WRITABLE_COMMANDS: &[&str] = &[
    "SET", "GETSET", "DEL", "INCR", "DECR", "INCRBY", "DECRBY", "APPEND", "SETBIT", "SETEX", "MSET",
    "MSETNX", "HSET", "HSETNX", "HMSET",
];

pub fn is_writable(command: &str) -> bool {
    WRITABLE_COMMANDS.contains(&command)
}

fn command_name(parts: &[RespFrame]) -> Result<String> {
    match parts.first() {
        Some(RespFrame::BulkString(Some(bytes))) => String::from_utf8(bytes.as_ref().clone())
            .map(|s| s.to_uppercase())
            .map_err(|_| CommandError::Generic("invalid command name".into()).into()),
        _ => Err(CommandError::Generic("invalid command format".into()).into()),
    }
}

/// Execute one parsed command. Returns the reply frame plus a connection
/// effect (only REPLCONF listening-port produces a non-trivial one).
pub fn dispatch(
    storage: &Arc<StorageEngine>,
    config: &Config,
    repl: &Arc<ReplicationState>,
    parts: &[RespFrame],
) -> Result<(RespFrame, Effect)> {
    if parts.is_empty() {
        return Ok((RespFrame::error("ERR empty command"), Effect::None));
    }

    let name = command_name(parts)?;

    let reply = match name.as_str() {
        "PING" => handle_ping(parts)?,
        "ECHO" => handle_echo(parts)?,
        "SET" => handle_set(storage, parts)?,
        "SETEX" => handle_setex(storage, parts)?,
        "GETSET" => handle_getset(storage, parts)?,
        "GET" => handle_get(storage, parts)?,
        "DEL" => handle_del(storage, parts)?,
        "INCR" => handle_incr(storage, parts)?,
        "DECR" => handle_decr(storage, parts)?,
        "INCRBY" => handle_incrby(storage, parts)?,
        "DECRBY" => handle_decrby(storage, parts)?,
        "APPEND" => handle_append(storage, parts)?,
        "SETBIT" => handle_setbit(storage, parts)?,
        "MSET" => handle_mset(storage, parts)?,
        "MSETNX" => handle_msetnx(storage, parts)?,
        "TYPE" => handle_type(storage, parts)?,
        "KEYS" => handle_keys(storage, parts)?,
        "HSET" => handle_hset(storage, parts)?,
        "HSETNX" => handle_hsetnx(storage, parts)?,
        "HMSET" => handle_hmset(storage, parts)?,
        "HGET" => handle_hget(storage, parts)?,
        "HMGET" => handle_hmget(storage, parts)?,
        "HGETALL" => handle_hgetall(storage, parts)?,
        "HDEL" => handle_hdel(storage, parts)?,
        "HLEN" => handle_hlen(storage, parts)?,
        "HEXISTS" => handle_hexists(storage, parts)?,
        "HKEYS" => handle_hkeys(storage, parts)?,
        "HVALS" => handle_hvals(storage, parts)?,
        "HINCRBY" => handle_hincrby(storage, parts)?,
        "XADD" => handle_xadd(storage, parts)?,
        "XRANGE" => handle_xrange(storage, parts)?,
        "XREAD" => handle_xread(storage, parts)?,
        "CONFIG" => handle_config(config, parts)?,
        "INFO" => handle_info(repl)?,
        "PSYNC" => handle_psync(repl, parts)?,
        "WAIT" => handle_wait(repl, parts)?,
        "REPLCONF" => {
            let (reply, effect) = handle_replconf(parts)?;
            return Ok((reply, effect));
        }
        other => RespFrame::error(format!("ERR unknown command '{}'", other.to_lowercase())),
    };

    Ok((reply, Effect::None))
}

/// GET key
fn handle_get(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() != 2 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'get' command"));
    }
    let key = match &parts[1] {
        RespFrame::BulkString(Some(bytes)) => bytes.as_ref(),
        _ => return Ok(RespFrame::error("ERR invalid key format")),
    };
    match storage.get_string(key) {
        Ok(Some(value)) => Ok(RespFrame::from_bytes(value)),
        Ok(None) => Ok(RespFrame::null_bulk()),
        Err(e) => Ok(RespFrame::error(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replication::Role;

    fn bulk(s: &str) -> RespFrame {
        RespFrame::from_string(s)
    }

    #[test]
    fn test_dispatch_ping() {
        let storage = StorageEngine::new();
        let config = Config::default();
        let repl = ReplicationState::new(Role::Master);
        let (reply, _) = dispatch(&storage, &config, &repl, &[bulk("PING")]).unwrap();
        assert_eq!(reply, RespFrame::simple_string("PONG"));
    }

    #[test]
    fn test_dispatch_set_then_get() {
        let storage = StorageEngine::new();
        let config = Config::default();
        let repl = ReplicationState::new(Role::Master);
        dispatch(&storage, &config, &repl, &[bulk("SET"), bulk("k"), bulk("v")]).unwrap();
        let (reply, _) = dispatch(&storage, &config, &repl, &[bulk("GET"), bulk("k")]).unwrap();
        assert_eq!(reply, RespFrame::from_string("v"));
    }

    #[test]
    fn test_dispatch_get_against_hash_key_returns_wrongtype_reply_and_keeps_connection() {
        let storage = StorageEngine::new();
        let config = Config::default();
        let repl = ReplicationState::new(Role::Master);
        dispatch(&storage, &config, &repl, &[bulk("HSET"), bulk("h"), bulk("f"), bulk("v")]).unwrap();
        let (reply, _) = dispatch(&storage, &config, &repl, &[bulk("GET"), bulk("h")]).unwrap();
        assert!(reply.is_error());
    }

    #[test]
    fn test_dispatch_unknown_command() {
        let storage = StorageEngine::new();
        let config = Config::default();
        let repl = ReplicationState::new(Role::Master);
        let (reply, _) = dispatch(&storage, &config, &repl, &[bulk("NOSUCHCOMMAND")]).unwrap();
        assert!(reply.is_error());
    }

    #[test]
    fn test_is_writable() {
        assert!(is_writable("SET"));
        assert!(is_writable("HSET"));
        assert!(!is_writable("XADD"));
        assert!(!is_writable("GET"));
        assert!(!is_writable("PING"));
    }
}
