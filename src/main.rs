//! Entry point for the redforge server binary.

use std::process;

use redforge::config::{self, Config};
use redforge::network::Server;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> redforge::error::Result<()> {
    println!("Starting redforge");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));

    let cli_args = config::parse_cli_args();
    let mut cfg = Config::default();
    cfg.apply_cli_args(cli_args);

    if let Some((host, port)) = &cfg.replicaof {
        println!("Replicating from {}:{}", host, port);
    }

    let server = Server::new(cfg);
    server.run()
}
