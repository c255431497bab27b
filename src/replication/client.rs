//! Replica-side handshake and consumer loop.
//!
//! Blocking I/O, one dedicated thread, reconnect-with-backoff on error —
//! the same shape the master-link client used, minus the auth step (the
//! core has no AUTH) and minus the backlog/partial-resync paths (the core
//! only ever does full resync).

use std::io::Read;
use std::net::TcpStream;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::error::{ForgeError, Result};
use crate::protocol::{parse_resp_frame, serialize_resp_frame, RespFrame};
use crate::storage::rdb::RdbLoader;
use crate::storage::StorageEngine;

use super::{ReplicationState, Role};

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Spawn the background thread that drives replication from a master, if
/// this node was started with `--replicaof`.
pub fn start_replica_thread(config: Arc<Config>, storage: Arc<StorageEngine>, repl: Arc<ReplicationState>) {
    thread::spawn(move || loop {
        match connect_and_replicate(config.as_ref(), &storage, &repl) {
            Ok(()) => {}
            Err(e) => eprintln!("WARN replication: {}", e),
        }
        thread::sleep(RECONNECT_DELAY);
    });
}

/// Accumulates bytes off the socket and hands out complete RESP frames plus
/// their exact wire length, so the caller can track the byte offset.
struct FrameReader {
    stream: TcpStream,
    buf: Vec<u8>,
}

impl FrameReader {
    fn new(stream: TcpStream) -> Self {
        FrameReader { stream, buf: Vec::new() }
    }

    fn fill(&mut self) -> Result<()> {
        let mut tmp = [0u8; 8192];
        let n = self.stream.read(&mut tmp)?;
        if n == 0 {
            return Err(ForgeError::Connection("master closed the connection".into()));
        }
        self.buf.extend_from_slice(&tmp[..n]);
        Ok(())
    }

    fn read_line(&mut self) -> Result<Vec<u8>> {
        loop {
            if let Some(pos) = self.buf.windows(2).position(|w| w == b"\r\n") {
                let line = self.buf[..pos].to_vec();
                self.buf.drain(..pos + 2);
                return Ok(line);
            }
            self.fill()?;
        }
    }

    fn read_exact_n(&mut self, n: usize) -> Result<Vec<u8>> {
        while self.buf.len() < n {
            self.fill()?;
        }
        let data = self.buf[..n].to_vec();
        self.buf.drain(..n);
        Ok(data)
    }

    /// Parse the next complete RESP frame, reading more off the socket as
    /// needed. Returns the frame and the exact number of wire bytes it
    /// occupied.
    fn next_frame(&mut self) -> Result<(RespFrame, usize)> {
        loop {
            if let Some(result) = parse_resp_frame(&self.buf)? {
                let (frame, consumed) = result;
                self.buf.drain(..consumed);
                return Ok((frame, consumed));
            }
            self.fill()?;
        }
    }

    fn send_command(&mut self, args: &[&str]) -> Result<()> {
        let frame = RespFrame::array(args.iter().map(|a| RespFrame::from_string(*a)).collect());
        serialize_resp_frame(&frame, &mut self.stream)?;
        Ok(())
    }
}

fn expect_ok_or_pong(reader: &mut FrameReader, expected: &str) -> Result<()> {
    let (frame, _) = reader.next_frame()?;
    match frame {
        RespFrame::SimpleString(bytes) if bytes.as_ref() == expected.as_bytes() => Ok(()),
        other => Err(ForgeError::Protocol(format!(
            "unexpected reply during replication handshake: {:?}",
            other
        ))),
    }
}

fn connect_and_replicate(config: &Config, storage: &Arc<StorageEngine>, repl: &Arc<ReplicationState>) -> Result<()> {
    let (host, port) = match &*repl.role.lock().unwrap() {
        Role::Replica { master_host, master_port } => (master_host.clone(), *master_port),
        Role::Master => return Ok(()),
    };

    println!("Connecting to master {}:{}", host, port);
    let stream = TcpStream::connect((host.as_str(), port))
        .map_err(|e| ForgeError::Connection(format!("failed to connect to master {}:{}: {}", host, port, e)))?;
    stream.set_nodelay(true)?;

    let mut reader = FrameReader::new(stream);

    reader.send_command(&["PING"])?;
    expect_ok_or_pong(&mut reader, "PONG")?;

    reader.send_command(&["REPLCONF", "listening-port", &config.port.to_string()])?;
    expect_ok_or_pong(&mut reader, "OK")?;

    reader.send_command(&["REPLCONF", "capa", "psync2"])?;
    expect_ok_or_pong(&mut reader, "OK")?;

    reader.send_command(&["PSYNC", "?", "-1"])?;
    let fullresync_line = reader.read_line()?;
    let fullresync = String::from_utf8_lossy(&fullresync_line);
    if !fullresync.starts_with("+FULLRESYNC") {
        return Err(ForgeError::Protocol(format!("unexpected PSYNC reply: {}", fullresync)));
    }
    println!("Received {}", fullresync.trim_start_matches('+'));

    let bulk_header = reader.read_line()?;
    let header_str = String::from_utf8_lossy(&bulk_header);
    let rdb_len: usize = header_str
        .strip_prefix('$')
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ForgeError::Protocol(format!("invalid RDB bulk header: {}", header_str)))?;
    let rdb_bytes = reader.read_exact_n(rdb_len)?;

    match RdbLoader::load_bytes(&rdb_bytes, storage) {
        Ok(count) => println!("Loaded {} keys from master RDB", count),
        Err(e) => eprintln!("WARN replication: failed to load master RDB: {}", e),
    }

    println!("Replication handshake complete, entering consumer loop");

    loop {
        let (frame, consumed) = reader.next_frame()?;
        let parts = match &frame {
            RespFrame::Array(Some(parts)) => parts.clone(),
            _ => {
                repl.master_repl_offset.fetch_add(consumed as u64, Ordering::SeqCst);
                continue;
            }
        };

        let is_getack = is_replconf_getack(&parts);
        let ack_offset_before = repl.master_repl_offset.load(Ordering::SeqCst);

        apply_from_master(storage, config, repl, &parts);
        repl.master_repl_offset.fetch_add(consumed as u64, Ordering::SeqCst);

        if is_getack {
            let ack_frame = RespFrame::array(vec![
                RespFrame::from_string("REPLCONF"),
                RespFrame::from_string("ACK"),
                RespFrame::from_string(ack_offset_before.to_string()),
            ]);
            serialize_resp_frame(&ack_frame, &mut reader.stream)?;
        }
    }
}

fn is_replconf_getack(parts: &[RespFrame]) -> bool {
    if parts.len() != 3 {
        return false;
    }
    let matches_word = |frame: &RespFrame, word: &str| match frame {
        RespFrame::BulkString(Some(bytes)) => bytes.as_ref().eq_ignore_ascii_case(word.as_bytes()),
        _ => false,
    };
    matches_word(&parts[0], "REPLCONF") && matches_word(&parts[1], "GETACK")
}

/// Apply a command consumed from the master. The replica never replies to
/// ordinary propagated writes (only GETACK gets an ACK, handled by the
/// caller), and it has no downstream replicas of its own to re-propagate to.
fn apply_from_master(storage: &Arc<StorageEngine>, config: &Config, repl: &Arc<ReplicationState>, parts: &[RespFrame]) {
    if let Err(e) = crate::storage::commands::dispatch(storage, config, repl, parts) {
        eprintln!("WARN replication: error applying command from master: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_replconf_getack() {
        let parts = vec![
            RespFrame::from_string("REPLCONF"),
            RespFrame::from_string("GETACK"),
            RespFrame::from_string("*"),
        ];
        assert!(is_replconf_getack(&parts));

        let not_getack = vec![RespFrame::from_string("REPLCONF"), RespFrame::from_string("ACK")];
        assert!(!is_replconf_getack(&not_getack));
    }
}
