//! Replication: master-side replica bookkeeping and propagation, plus the
//! replica-side handshake/consumer loop.
//!
//! Single master, any number of replicas, no backlog: a replica that falls
//! off the outbound queue just gets disconnected rather than replayed from
//! a ring buffer. That matches the scope here — full resync is always via
//! the (empty) RDB blob, never a partial resync.

mod client;
pub mod commands;
mod manager;

pub use client::start_replica_thread;
pub use manager::ReplicationState;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

/// Role this node is playing.
#[derive(Debug, Clone, PartialEq)]
pub enum Role {
    Master,
    Replica { master_host: String, master_port: u16 },
}

/// Bound to one connected replica's socket. The outbound pump owns `rx` and
/// drains it to the socket; `propagate` (on the master side) just pushes
/// bytes onto `tx`.
pub struct ReplicaHandle {
    pub addr: SocketAddr,
    pub acked_bytes: AtomicU64,
    tx: SyncSender<Vec<u8>>,
}

impl ReplicaHandle {
    /// Outbound queue depth: bounded so one stuck replica can't grow memory
    /// without limit. A full queue disconnects the replica.
    const QUEUE_DEPTH: usize = 1024;

    pub fn new(addr: SocketAddr) -> (std::sync::Arc<Self>, Receiver<Vec<u8>>) {
        let (tx, rx) = sync_channel(Self::QUEUE_DEPTH);
        (
            std::sync::Arc::new(ReplicaHandle {
                addr,
                acked_bytes: AtomicU64::new(0),
                tx,
            }),
            rx,
        )
    }

    pub fn send(&self, bytes: Vec<u8>) -> bool {
        self.tx.try_send(bytes).is_ok()
    }

    pub fn ack(&self, offset: u64) {
        self.acked_bytes.store(offset, Ordering::SeqCst);
    }

    pub fn acked(&self) -> u64 {
        self.acked_bytes.load(Ordering::SeqCst)
    }
}

/// Generate a 40-char hex-alphanumeric replication id, matching Redis's
/// `runid` format.
pub fn generate_repl_id() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..40)
        .map(|_| {
            let n = rng.gen_range(0..16);
            match n {
                0..=9 => b'0' + n,
                _ => b'a' + (n - 10),
            }
        })
        .collect();
    String::from_utf8(bytes).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_repl_id() {
        let id = generate_repl_id();
        assert_eq!(id.len(), 40);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_replica_handle_ack() {
        let addr: SocketAddr = "127.0.0.1:6380".parse().unwrap();
        let (handle, _rx) = ReplicaHandle::new(addr);
        assert_eq!(handle.acked(), 0);
        handle.ack(42);
        assert_eq!(handle.acked(), 42);
    }

    #[test]
    fn test_replica_handle_send_and_drain() {
        let addr: SocketAddr = "127.0.0.1:6380".parse().unwrap();
        let (handle, rx) = ReplicaHandle::new(addr);
        assert!(handle.send(b"hello".to_vec()));
        assert_eq!(rx.recv().unwrap(), b"hello".to_vec());
    }
}
