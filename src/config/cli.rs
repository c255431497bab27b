//! Command-line argument parser
//!
//! Parses the small flag set the core accepts; no `.conf` file format, no
//! `clap` dependency — a manual loop over `std::env::args()`.

/// Command-line arguments
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Port to listen on
    pub port: Option<u16>,

    /// Address to bind to
    pub bind: Option<String>,

    /// Master to replicate from - (host, port)
    pub replicaof: Option<(String, u16)>,

    /// Directory for data files
    pub dir: Option<String>,

    /// Database filename
    pub dbfilename: Option<String>,
}

/// Parse command-line arguments
pub fn parse_cli_args() -> CliArgs {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut cli_args = CliArgs::default();
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-v" => {
                println!("redforge {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    match args[i + 1].parse::<u16>() {
                        Ok(port) => cli_args.port = Some(port),
                        Err(_) => {
                            eprintln!("Error: Invalid port number: {}", args[i + 1]);
                            std::process::exit(1);
                        }
                    }
                    i += 2;
                } else {
                    eprintln!("Error: Missing argument for --port");
                    std::process::exit(1);
                }
            }
            "--bind" => {
                if i + 1 < args.len() {
                    cli_args.bind = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    eprintln!("Error: Missing argument for --bind");
                    std::process::exit(1);
                }
            }
            "--replicaof" | "--slaveof" => {
                if i + 2 < args.len() {
                    match args[i + 2].parse::<u16>() {
                        Ok(port) => cli_args.replicaof = Some((args[i + 1].clone(), port)),
                        Err(_) => {
                            eprintln!("Error: Invalid port number for --replicaof: {}", args[i + 2]);
                            std::process::exit(1);
                        }
                    }
                    i += 3;
                } else {
                    eprintln!("Error: Missing arguments for --replicaof");
                    std::process::exit(1);
                }
            }
            "--dir" => {
                if i + 1 < args.len() {
                    cli_args.dir = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    eprintln!("Error: Missing argument for --dir");
                    std::process::exit(1);
                }
            }
            "--dbfilename" => {
                if i + 1 < args.len() {
                    cli_args.dbfilename = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    eprintln!("Error: Missing argument for --dbfilename");
                    std::process::exit(1);
                }
            }
            arg => {
                eprintln!("Error: Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
    }

    cli_args
}

fn print_help() {
    println!("Usage: redforge [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --help, -h                    Show this help message");
    println!("  --version, -v                 Show version information");
    println!("  --port, -p    <port>          TCP port to listen on (default: 6379)");
    println!("  --bind        <address>       Interface to bind to (default: 127.0.0.1)");
    println!("  --replicaof   <host> <port>   Make this server a replica of another instance");
    println!("  --dir         <dir>           Working directory for database files");
    println!("  --dbfilename  <filename>      Database filename");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_args_default() {
        let args = CliArgs::default();
        assert_eq!(args.port, None);
        assert_eq!(args.replicaof, None);
    }

    #[test]
    fn test_cli_args_construction() {
        let mut args = CliArgs::default();
        args.port = Some(9999);
        args.replicaof = Some(("master.example.com".to_string(), 6379));

        assert_eq!(args.port, Some(9999));
        assert_eq!(
            args.replicaof,
            Some(("master.example.com".to_string(), 6379))
        );
    }
}
