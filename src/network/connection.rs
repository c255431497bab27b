//! Per-connection read/decode/dispatch/write loop.
//!
//! One thread per connection, blocking I/O throughout — the same shape the
//! replica-side consumer loop uses. A connection starts as an ordinary
//! client socket; if it PSYNCs, it's handed an RDB bulk and switched over
//! to a replica link, after which replies stop and an outbound pump thread
//! streams propagated writes to it instead.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread;

use crate::config::Config;
use crate::error::Result;
use crate::protocol::{parse_resp_frame, serialize_resp_frame, RespFrame};
use crate::replication::commands::{psync_rdb_bulk, Effect};
use crate::replication::{ReplicaHandle, ReplicationState};
use crate::storage::commands::{dispatch, is_writable};
use crate::storage::StorageEngine;

pub fn handle_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    storage: Arc<StorageEngine>,
    config: Arc<Config>,
    repl: Arc<ReplicationState>,
) {
    if let Err(e) = serve(&mut stream, addr, &storage, &config, &repl) {
        eprintln!("WARN connection {}: {}", addr, e);
    }
    repl.remove_replica(addr);
}

fn serve(
    stream: &mut TcpStream,
    addr: SocketAddr,
    storage: &Arc<StorageEngine>,
    config: &Arc<Config>,
    repl: &Arc<ReplicationState>,
) -> Result<()> {
    let mut buf: Vec<u8> = Vec::with_capacity(4096);
    let mut tmp = [0u8; 8192];
    let mut declared_replica = false;
    let mut replica_handle: Option<Arc<ReplicaHandle>> = None;

    loop {
        let (frame, consumed) = loop {
            if let Some(result) = parse_resp_frame(&buf)? {
                break result;
            }
            let n = stream.read(&mut tmp)?;
            if n == 0 {
                return Ok(());
            }
            buf.extend_from_slice(&tmp[..n]);
        };

        let raw = buf[..consumed].to_vec();
        buf.drain(..consumed);

        let parts = match frame {
            RespFrame::Array(Some(parts)) => parts,
            _ => continue,
        };

        // Once this socket has become a replica link, the only thing it
        // still sends us is REPLCONF ACK; everything else going out goes
        // through the pump thread instead of a per-command reply.
        if let Some(handle) = &replica_handle {
            if let Some(offset) = extract_replconf_ack(&parts) {
                handle.ack(offset);
            }
            continue;
        }

        let name = command_name(&parts);
        let (reply, effect) = dispatch(storage, config, repl, &parts)?;
        serialize_resp_frame(&reply, stream)?;

        if let Some(name) = &name {
            if !repl.is_replica() && is_writable(name) {
                repl.propagate(&raw);
            }
        }

        if matches!(effect, Effect::BecomeReplicaLink) {
            declared_replica = true;
        }

        if declared_replica && name.as_deref() == Some("PSYNC") {
            let bulk = psync_rdb_bulk();
            stream.write_all(&bulk)?;
            let writer = stream.try_clone()?;
            let (handle, rx) = repl.register_replica(addr);
            spawn_pump(writer, rx);
            replica_handle = Some(handle);
        }
    }
}

fn command_name(parts: &[RespFrame]) -> Option<String> {
    match parts.first() {
        Some(RespFrame::BulkString(Some(bytes))) => {
            String::from_utf8(bytes.as_ref().clone()).ok().map(|s| s.to_uppercase())
        }
        _ => None,
    }
}

fn extract_replconf_ack(parts: &[RespFrame]) -> Option<u64> {
    if parts.len() != 3 {
        return None;
    }
    let word = |frame: &RespFrame| match frame {
        RespFrame::BulkString(Some(bytes)) => Some(String::from_utf8_lossy(bytes).to_string()),
        _ => None,
    };
    if !word(&parts[0])?.eq_ignore_ascii_case("REPLCONF") {
        return None;
    }
    if !word(&parts[1])?.eq_ignore_ascii_case("ACK") {
        return None;
    }
    word(&parts[2])?.parse().ok()
}

fn spawn_pump(mut writer: TcpStream, rx: Receiver<Vec<u8>>) {
    thread::spawn(move || {
        for bytes in rx.iter() {
            if writer.write_all(&bytes).is_err() {
                break;
            }
        }
    });
}
