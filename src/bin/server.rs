//! FerroKV Server Binary
//!
//! Serves one store (memory or disk backend) over TCP. Both the text and
//! the binary protocol are spoken on the same port.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use ferrokv::{
    DiskStore, DiskStoreOptions, MemoryStore, MemoryStoreOptions, Server, ServerOptions, Store,
};

/// FerroKV Server
#[derive(Parser, Debug)]
#[command(name = "ferrokv-server")]
#[command(about = "Persistent key-value store served over TCP")]
#[command(version)]
struct Args {
    /// Host to bind
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on (0 binds an ephemeral port)
    #[arg(short, long, default_value = "6379")]
    port: u16,

    /// Data directory
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// Maximum concurrent client connections
    #[arg(long, default_value = "1000")]
    max_connections: usize,

    /// Per-client socket timeout in seconds (0 disables)
    #[arg(long, default_value = "300")]
    client_timeout: u64,

    /// WAL entries between automatic snapshots (memory backend)
    #[arg(long, default_value = "10000")]
    snapshot_threshold: usize,

    /// Tombstones before automatic compaction (disk backend)
    #[arg(long, default_value = "1000")]
    compaction_threshold: usize,

    /// Use the log-structured disk backend instead of the memory backend
    #[arg(long)]
    disk_store: bool,

    /// Treat every connection as binary (skip auto-detection)
    #[arg(long)]
    binary_only: bool,
}

fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    tracing::info!("FerroKV server v{}", ferrokv::VERSION);
    tracing::info!(
        "backend: {}, data dir: {}",
        if args.disk_store { "disk" } else { "memory" },
        args.data_dir.display()
    );

    let store: Arc<dyn Store> = match build_store(&args) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    let server = Server::new(
        store,
        ServerOptions {
            host: args.host,
            port: args.port,
            max_connections: args.max_connections,
            client_timeout: if args.client_timeout > 0 {
                Some(Duration::from_secs(args.client_timeout))
            } else {
                None
            },
            force_binary: args.binary_only,
        },
    );

    if let Err(e) = server.start() {
        tracing::error!("failed to start server: {}", e);
        std::process::exit(1);
    }

    tracing::info!("serving on port {}", server.port());

    // Park until stop() flips the flag (an embedding process or signal
    // waiter owns shutdown; killing the process is the blunt fallback).
    while server.running() {
        std::thread::sleep(Duration::from_millis(100));
    }

    tracing::info!("server exited");
}

fn build_store(args: &Args) -> ferrokv::Result<Arc<dyn Store>> {
    if args.disk_store {
        let store = DiskStore::open(DiskStoreOptions {
            data_dir: args.data_dir.clone(),
            compaction_threshold: args.compaction_threshold,
            ..DiskStoreOptions::default()
        })?;
        Ok(Arc::new(store))
    } else {
        std::fs::create_dir_all(&args.data_dir)?;
        let store = MemoryStore::open(MemoryStoreOptions {
            wal_path: Some(args.data_dir.join("data.wal")),
            snapshot_path: Some(args.data_dir.join("data.snap")),
            snapshot_threshold: args.snapshot_threshold,
            ..MemoryStoreOptions::default()
        })?;
        Ok(Arc::new(store))
    }
}
