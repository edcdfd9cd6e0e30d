//! FerroKV CLI Client
//!
//! One-shot commands against a running FerroKV server, speaking either
//! the text or the binary protocol over a single sequential
//! write-then-read stream.

use std::time::Duration;

use clap::{Parser, Subcommand};

use ferrokv::{Client, ClientOptions};

/// FerroKV CLI
#[derive(Parser, Debug)]
#[command(name = "ferrokv-cli")]
#[command(about = "CLI for the FerroKV key-value store")]
#[command(version)]
struct Args {
    /// Server host
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value = "6379")]
    port: u16,

    /// Speak the binary protocol instead of the text protocol
    #[arg(short, long)]
    binary: bool,

    /// Socket timeout in milliseconds
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get { key: String },

    /// Set a key-value pair
    Set {
        key: String,
        value: String,

        /// Expire the entry after this many milliseconds
        #[arg(long)]
        ttl_ms: Option<u64>,
    },

    /// Delete a key
    Del { key: String },

    /// Check whether a key exists
    Exists { key: String },

    /// Count live entries
    Size,

    /// Remove every entry
    Clear,

    /// Ping the server
    Ping,
}

fn main() {
    let args = Args::parse();

    let mut client = Client::new(ClientOptions {
        host: args.host.clone(),
        port: args.port,
        binary: args.binary,
        timeout: Some(Duration::from_millis(args.timeout_ms)),
    });

    if let Err(e) = client.connect() {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let exit_code = run_command(&mut client, &args.command);
    std::process::exit(exit_code);
}

fn run_command(client: &mut Client, command: &Commands) -> i32 {
    match command {
        Commands::Get { key } => match client.get(key.as_bytes()) {
            Ok(Some(value)) => {
                println!("{}", String::from_utf8_lossy(&value));
                0
            }
            Ok(None) => {
                eprintln!("(not found)");
                2
            }
            Err(e) => fail(e),
        },

        Commands::Set { key, value, ttl_ms } => {
            let result = match ttl_ms {
                Some(ms) => client.put_with_ttl(
                    key.as_bytes(),
                    value.as_bytes(),
                    Duration::from_millis(*ms),
                ),
                None => client.put(key.as_bytes(), value.as_bytes()),
            };
            match result {
                Ok(()) => {
                    println!("OK");
                    0
                }
                Err(e) => fail(e),
            }
        }

        Commands::Del { key } => match client.remove(key.as_bytes()) {
            Ok(true) => {
                println!("OK");
                0
            }
            Ok(false) => {
                eprintln!("(not found)");
                2
            }
            Err(e) => fail(e),
        },

        Commands::Exists { key } => match client.contains(key.as_bytes()) {
            Ok(found) => {
                println!("{}", if found { "1" } else { "0" });
                0
            }
            Err(e) => fail(e),
        },

        Commands::Size => match client.len() {
            Ok(count) => {
                println!("{}", count);
                0
            }
            Err(e) => fail(e),
        },

        Commands::Clear => match client.clear() {
            Ok(()) => {
                println!("OK");
                0
            }
            Err(e) => fail(e),
        },

        Commands::Ping => {
            if client.ping() {
                println!("PONG");
                0
            } else {
                eprintln!("no PONG from server");
                1
            }
        }
    }
}

fn fail(e: ferrokv::FerroError) -> i32 {
    eprintln!("{}", e);
    1
}
