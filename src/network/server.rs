//! Top-level server: binds the listener, starts the replica thread (if
//! configured as a replica), and spawns one thread per accepted connection.

use std::sync::Arc;
use std::thread;

use crate::config::Config;
use crate::error::Result;
use crate::replication::{start_replica_thread, ReplicationState, Role};
use crate::storage::rdb::RdbLoader;
use crate::storage::StorageEngine;

use super::connection::handle_connection;
use super::listener::Listener;

pub struct Server {
    config: Arc<Config>,
    storage: Arc<StorageEngine>,
    repl: Arc<ReplicationState>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let storage = StorageEngine::new();

        match RdbLoader::load_file(&config.rdb_path(), &storage) {
            Ok(count) if count > 0 => println!("Loaded {} keys from {}", count, config.rdb_path().display()),
            Ok(_) => {}
            Err(e) => eprintln!("WARN: could not load RDB file {}: {}", config.rdb_path().display(), e),
        }

        let role = match &config.replicaof {
            Some((host, port)) => Role::Replica { master_host: host.clone(), master_port: *port },
            None => Role::Master,
        };
        let repl = ReplicationState::new(role);

        Server { config, storage, repl }
    }

    pub fn run(&self) -> Result<()> {
        if self.repl.is_replica() {
            start_replica_thread(Arc::clone(&self.config), Arc::clone(&self.storage), Arc::clone(&self.repl));
        }

        let listener = Listener::bind(&self.config.bind, self.config.port)?;
        println!("Listening on {}:{}", self.config.bind, self.config.port);

        loop {
            let (stream, addr) = listener.accept()?;
            let storage = Arc::clone(&self.storage);
            let config = Arc::clone(&self.config);
            let repl = Arc::clone(&self.repl);
            thread::spawn(move || handle_connection(stream, addr, storage, config, repl));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_construction_defaults_to_master() {
        let server = Server::new(Config::default());
        assert!(!server.repl.is_replica());
    }
}
