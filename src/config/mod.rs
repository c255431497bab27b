//! Configuration module
//!
//! A minimal configuration surface: listen address, data directory, RDB
//! filename, and an optional replication master. No `.conf` file format —
//! everything comes from CLI flags layered over defaults.

mod cli;

pub use cli::{parse_cli_args, CliArgs};

use thiserror::Error;

/// Default TCP port
pub const DEFAULT_PORT: u16 = 6379;

/// Default bind address
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Default data directory
pub const DEFAULT_DIR: &str = "/tmp/redis-files";

/// Default RDB filename
pub const DEFAULT_DBFILENAME: &str = "dump.rdb";

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port to listen on
    pub port: u16,

    /// Interface to bind to
    pub bind: String,

    /// Directory holding the RDB file
    pub dir: String,

    /// RDB filename within `dir`
    pub dbfilename: String,

    /// Master to replicate from, if any
    pub replicaof: Option<(String, u16)>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            dir: DEFAULT_DIR.to_string(),
            dbfilename: DEFAULT_DBFILENAME.to_string(),
            replicaof: None,
        }
    }
}

impl Config {
    /// Build a config from defaults overridden by parsed CLI args
    pub fn from_cli_args(args: CliArgs) -> Self {
        let mut config = Config::default();
        config.apply_cli_args(args);
        config
    }

    /// Overlay CLI args onto this config, overriding only what was set
    pub fn apply_cli_args(&mut self, args: CliArgs) {
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(bind) = args.bind {
            self.bind = bind;
        }
        if let Some(dir) = args.dir {
            self.dir = dir;
        }
        if let Some(dbfilename) = args.dbfilename {
            self.dbfilename = dbfilename;
        }
        if let Some(replicaof) = args.replicaof {
            self.replicaof = Some(replicaof);
        }
    }

    /// Full path to the RDB file
    pub fn rdb_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.dir).join(&self.dbfilename)
    }

    /// Look up a CONFIG GET-style parameter by name
    pub fn get(&self, param: &str) -> Option<String> {
        match param {
            "dir" => Some(self.dir.clone()),
            "dbfilename" => Some(self.dbfilename.clone()),
            "port" => Some(self.port.to_string()),
            "bind" => Some(self.bind.clone()),
            _ => None,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.dir, DEFAULT_DIR);
        assert_eq!(config.dbfilename, DEFAULT_DBFILENAME);
        assert!(config.replicaof.is_none());
    }

    #[test]
    fn test_apply_cli_args_overrides() {
        let mut config = Config::default();
        let args = CliArgs {
            port: Some(7000),
            bind: None,
            replicaof: Some(("127.0.0.1".to_string(), 6380)),
            dir: Some("/var/lib/redforge".to_string()),
            dbfilename: None,
        };
        config.apply_cli_args(args);

        assert_eq!(config.port, 7000);
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.dir, "/var/lib/redforge");
        assert_eq!(config.dbfilename, DEFAULT_DBFILENAME);
        assert_eq!(config.replicaof, Some(("127.0.0.1".to_string(), 6380)));
    }

    #[test]
    fn test_rdb_path() {
        let config = Config::default();
        assert_eq!(
            config.rdb_path(),
            std::path::Path::new("/tmp/redis-files/dump.rdb")
        );
    }

    #[test]
    fn test_get_known_params() {
        let config = Config::default();
        assert_eq!(config.get("dir"), Some(DEFAULT_DIR.to_string()));
        assert_eq!(config.get("dbfilename"), Some(DEFAULT_DBFILENAME.to_string()));
        assert_eq!(config.get("unknown"), None);
    }
}
