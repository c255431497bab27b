//! Master-side replication command handlers: REPLCONF, PSYNC, WAIT, and the
//! `INFO replication` section. These run inside the normal command
//! dispatcher; connection-level consequences (upgrading the socket to a
//! replica link) are applied by the caller based on the returned `Effect`.

use crate::error::{CommandError, Result};
use crate::protocol::RespFrame;
use crate::storage::rdb::EMPTY_RDB;

use super::ReplicationState;
use std::sync::Arc;
use std::time::Duration;

fn arg_string(frame: &RespFrame) -> Result<String> {
    match frame {
        RespFrame::BulkString(Some(bytes)) => String::from_utf8(bytes.as_ref().clone())
            .map_err(|_| CommandError::Generic("invalid UTF-8 argument".into()).into()),
        _ => Err(CommandError::Generic("invalid argument format".into()).into()),
    }
}

/// Side effect the connection handler must apply after a reply is written.
pub enum Effect {
    None,
    /// REPLCONF listening-port was seen: the socket should be upgraded to a
    /// replica link (outbound queue pump takes over).
    BecomeReplicaLink,
}

/// REPLCONF listening-port <p> | REPLCONF capa <cap> | REPLCONF GETACK *
/// REPLCONF ACK <offset> (sent by a replica, no reply expected).
pub fn handle_replconf(parts: &[RespFrame]) -> Result<(RespFrame, Effect)> {
    if parts.len() < 2 {
        return Ok((RespFrame::error("ERR wrong number of arguments for 'replconf' command"), Effect::None));
    }

    let sub = arg_string(&parts[1])?.to_lowercase();
    match sub.as_str() {
        "listening-port" => Ok((RespFrame::ok(), Effect::BecomeReplicaLink)),
        "capa" => Ok((RespFrame::ok(), Effect::None)),
        "getack" => Ok((RespFrame::ok(), Effect::None)),
        "ack" => Ok((RespFrame::ok(), Effect::None)),
        _ => Ok((RespFrame::ok(), Effect::None)),
    }
}

/// PSYNC ? -1 — only full resync is supported, which is the only thing a
/// freshly-connecting replica ever asks for.
pub fn handle_psync(repl: &Arc<ReplicationState>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() != 3 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'psync' command"));
    }

    Ok(RespFrame::simple_string(format!(
        "FULLRESYNC {} {}",
        repl.master_replid,
        repl.offset()
    )))
}

/// The RDB bulk that follows a FULLRESYNC reply — always the fixed empty
/// blob, since the core never writes its own RDB snapshots.
pub fn psync_rdb_bulk() -> Vec<u8> {
    let mut out = Vec::with_capacity(EMPTY_RDB.len() + 16);
    out.extend_from_slice(format!("${}\r\n", EMPTY_RDB.len()).as_bytes());
    out.extend_from_slice(EMPTY_RDB);
    out
}

/// WAIT numreplicas timeout_ms
pub fn handle_wait(repl: &Arc<ReplicationState>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() != 3 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'wait' command"));
    }

    let num_replicas: usize = arg_string(&parts[1])?
        .parse()
        .map_err(|_| CommandError::NotInteger)?;
    let timeout_ms: u64 = arg_string(&parts[2])?
        .parse()
        .map_err(|_| CommandError::NotInteger)?;

    let acked = repl.wait(num_replicas, Duration::from_millis(timeout_ms));
    Ok(RespFrame::Integer(acked as i64))
}

/// INFO replication (only the `replication` section is implemented; any
/// other or missing section argument gets the same reply).
pub fn handle_info(repl: &Arc<ReplicationState>) -> Result<RespFrame> {
    let role_line = if repl.is_replica() { "slave" } else { "master" };

    let body = format!(
        "# Replication\r\nrole:{}\r\nconnected_slaves:{}\r\nmaster_replid:{}\r\nmaster_repl_offset:{}\r\n",
        role_line,
        repl.replica_count(),
        repl.master_replid,
        repl.offset(),
    );

    Ok(RespFrame::from_string(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::Role;

    fn bulk(s: &str) -> RespFrame {
        RespFrame::from_string(s)
    }

    #[test]
    fn test_replconf_listening_port_upgrades_link() {
        let parts = vec![bulk("REPLCONF"), bulk("listening-port"), bulk("6380")];
        let (reply, effect) = handle_replconf(&parts).unwrap();
        assert_eq!(reply, RespFrame::ok());
        assert!(matches!(effect, Effect::BecomeReplicaLink));
    }

    #[test]
    fn test_psync_reports_replid_and_offset() {
        let repl = ReplicationState::new(Role::Master);
        let parts = vec![bulk("PSYNC"), bulk("?"), bulk("-1")];
        let result = handle_psync(&repl, &parts).unwrap();
        match result {
            RespFrame::SimpleString(s) => {
                let text = String::from_utf8(s.as_ref().clone()).unwrap();
                assert!(text.starts_with("FULLRESYNC "));
                assert!(text.contains(&repl.master_replid));
            }
            _ => panic!("expected simple string"),
        }
    }

    #[test]
    fn test_wait_with_no_replicas_and_no_writes() {
        let repl = ReplicationState::new(Role::Master);
        let parts = vec![bulk("WAIT"), bulk("0"), bulk("100")];
        let result = handle_wait(&repl, &parts).unwrap();
        assert_eq!(result, RespFrame::Integer(0));
    }

    #[test]
    fn test_info_replication_contains_role() {
        let repl = ReplicationState::new(Role::Master);
        let result = handle_info(&repl).unwrap();
        match result {
            RespFrame::BulkString(Some(bytes)) => {
                let text = String::from_utf8(bytes.as_ref().clone()).unwrap();
                assert!(text.contains("role:master"));
            }
            _ => panic!("expected bulk string"),
        }
    }
}
