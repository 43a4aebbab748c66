//! EmberKV - An Event-Loop In-Memory Key-Value Server
//!
//! This is the main entry point: it parses command-line flags, sets up
//! logging, replays the append-only file, and hands the thread to the
//! event loop.

use emberkv::server::ServerConfig;
use emberkv::Server;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Server configuration as parsed from the command line.
struct Config {
    host: String,
    port: u16,
    aof: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: emberkv::DEFAULT_HOST.to_string(),
            port: emberkv::DEFAULT_PORT,
            aof: Some(PathBuf::from(emberkv::DEFAULT_AOF_PATH)),
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments.
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    if i + 1 < args.len() {
                        config.host = args[i + 1].clone();
                        i += 2;
                    } else {
                        eprintln!("Error: --host requires a value");
                        std::process::exit(1);
                    }
                }
                "--port" | "-p" => {
                    if i + 1 < args.len() {
                        config.port = args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid port number");
                            std::process::exit(1);
                        });
                        i += 2;
                    } else {
                        eprintln!("Error: --port requires a value");
                        std::process::exit(1);
                    }
                }
                "--aof" => {
                    if i + 1 < args.len() {
                        config.aof = Some(PathBuf::from(&args[i + 1]));
                        i += 2;
                    } else {
                        eprintln!("Error: --aof requires a path");
                        std::process::exit(1);
                    }
                }
                "--no-aof" => {
                    config.aof = None;
                    i += 1;
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("EmberKV version {}", emberkv::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }
}

fn print_help() {
    println!(
        r#"
EmberKV - An Event-Loop In-Memory Key-Value Server

USAGE:
    emberkv [OPTIONS]

OPTIONS:
    -h, --host <HOST>    Address to bind (default: 0.0.0.0)
    -p, --port <PORT>    Port to listen on (default: 1234)
        --aof <PATH>     Append-only file path (default: redis.aof)
        --no-aof         Disable persistence
    -v, --version        Print version information
        --help           Print this help message

NOTES:
    Commands are case-sensitive and lower-case: get, set, del, pexpire,
    pttl, keys, zadd, zrem, zscore, zquery, bgrewriteaof.
"#
    );
}

fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!(
        version = emberkv::VERSION,
        host = %config.host,
        port = config.port,
        "starting EmberKV"
    );

    let server_config = ServerConfig {
        host: config.host,
        port: config.port,
        aof: config.aof,
    };

    let mut server = Server::new(&server_config)?;
    server.run()?;
    Ok(())
}
