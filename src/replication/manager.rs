//! Shared replication state: role, offset counter, and the connected-replica
//! list. One instance lives behind an `Arc` for the whole process.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::protocol::{serialize_to_vec, RespFrame};

use super::{generate_repl_id, ReplicaHandle, Role};

pub struct ReplicationState {
    pub role: Mutex<Role>,
    pub master_replid: String,
    pub master_repl_offset: AtomicU64,
    pub replicas: Mutex<Vec<Arc<ReplicaHandle>>>,
}

impl ReplicationState {
    pub fn new(role: Role) -> Arc<Self> {
        Arc::new(ReplicationState {
            role: Mutex::new(role),
            master_replid: generate_repl_id(),
            master_repl_offset: AtomicU64::new(0),
            replicas: Mutex::new(Vec::new()),
        })
    }

    pub fn is_replica(&self) -> bool {
        matches!(*self.role.lock().unwrap(), Role::Replica { .. })
    }

    pub fn offset(&self) -> u64 {
        self.master_repl_offset.load(Ordering::SeqCst)
    }

    /// Register a newly-upgraded replica connection; returns the receiving
    /// half of its outbound queue for the connection's pump loop to drain.
    pub fn register_replica(&self, addr: SocketAddr) -> (Arc<ReplicaHandle>, Receiver<Vec<u8>>) {
        let (handle, rx) = ReplicaHandle::new(addr);
        self.replicas.lock().unwrap().push(Arc::clone(&handle));
        (handle, rx)
    }

    pub fn remove_replica(&self, addr: SocketAddr) {
        self.replicas.lock().unwrap().retain(|r| r.addr != addr);
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.lock().unwrap().len()
    }

    /// Broadcast raw frame bytes to every connected replica and advance the
    /// master offset by their length. A replica whose queue is full (i.e.
    /// badly lagging) is simply skipped; its next read will fail and the
    /// connection handler will clean it up.
    pub fn propagate(&self, frame_bytes: &[u8]) {
        self.master_repl_offset.fetch_add(frame_bytes.len() as u64, Ordering::SeqCst);
        for replica in self.replicas.lock().unwrap().iter() {
            replica.send(frame_bytes.to_vec());
        }
    }

    /// REPLCONF GETACK * wire bytes, built through the normal encoder per
    /// §11's note rather than a hand-literal byte string.
    pub fn getack_frame() -> Vec<u8> {
        let frame = RespFrame::array(vec![
            RespFrame::from_string("REPLCONF"),
            RespFrame::from_string("GETACK"),
            RespFrame::from_string("*"),
        ]);
        serialize_to_vec(&frame).expect("GETACK frame always serializes")
    }

    /// WAIT numreplicas timeout_ms. Snapshots the offset *before* sending
    /// GETACK so the GETACK frame's own bytes never pollute the
    /// acknowledgement threshold.
    pub fn wait(&self, num_replicas: usize, timeout: Duration) -> usize {
        let target_offset = self.offset();
        if target_offset == 0 {
            return self.replica_count();
        }

        let getack = Self::getack_frame();
        self.propagate(&getack);

        let deadline = Instant::now() + timeout;
        loop {
            let acked = self
                .replicas
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.acked() >= target_offset)
                .count();

            if acked >= num_replicas || Instant::now() >= deadline {
                return acked;
            }

            std::thread::sleep(Duration::from_millis(20));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_returns_immediately_with_no_writes() {
        let state = ReplicationState::new(Role::Master);
        let result = state.wait(1, Duration::from_millis(100));
        assert_eq!(result, 0);
    }

    #[test]
    fn test_propagate_advances_offset() {
        let state = ReplicationState::new(Role::Master);
        state.propagate(b"*1\r\n$4\r\nPING\r\n");
        assert_eq!(state.offset(), 14);
    }

    #[test]
    fn test_register_and_remove_replica() {
        let state = ReplicationState::new(Role::Master);
        let addr: SocketAddr = "127.0.0.1:7000".parse().unwrap();
        let (_handle, _rx) = state.register_replica(addr);
        assert_eq!(state.replica_count(), 1);
        state.remove_replica(addr);
        assert_eq!(state.replica_count(), 0);
    }

    #[test]
    fn test_wait_counts_acked_replica() {
        let state = ReplicationState::new(Role::Master);
        let addr: SocketAddr = "127.0.0.1:7001".parse().unwrap();
        let (handle, _rx) = state.register_replica(addr);
        state.propagate(b"*1\r\n$3\r\nfoo\r\n");
        handle.ack(u64::MAX);
        let result = state.wait(1, Duration::from_millis(200));
        assert_eq!(result, 1);
    }
}
