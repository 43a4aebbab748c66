//! Server Module
//!
//! The network face of EmberKV: a single-threaded event loop multiplexing
//! every client connection over one `mio::Poll`, with per-connection
//! buffers and idle-timeout eviction.
//!
//! ## Event loop anatomy
//!
//! ```text
//!          ┌──────────────────────────────────────────────┐
//!          │                  Server                      │
//!          │                                              │
//!          │  poll ◄── timeout = min(idle, ttl) - now     │
//!          │    │                                         │
//!          │    ├── listener ready ──► accept loop        │
//!          │    │                                         │
//!          │    ├── conn ready ──► touch idle list        │
//!          │    │                  handle_read / write    │
//!          │    │                  destroy on want_close  │
//!          │    │                                         │
//!          │    └── process_timers ──► evict idle conns   │
//!          │                           expire ≤ 2000 keys │
//!          └──────────────────────────────────────────────┘
//! ```
//!
//! All shared state (the store, the AOF engine, the worker pool) lives
//! in one owned [`ServerContext`] threaded through the loop, so nothing
//! needs a lock and nothing is global.

pub mod conn;
pub mod event_loop;
pub mod idle;

pub use conn::Conn;
pub use event_loop::Server;
pub use idle::IdleList;

use crate::persistence::Aof;
use crate::pool::ThreadPool;
use crate::storage::Store;
use std::path::PathBuf;

/// Server configuration. The defaults reproduce the stock deployment:
/// wildcard bind on port 1234 with the log in the working directory.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,
    /// Port to listen on; 0 picks an ephemeral port.
    pub port: u16,
    /// Append-only file path; `None` disables persistence.
    pub aof: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: crate::DEFAULT_HOST.to_string(),
            port: crate::DEFAULT_PORT,
            aof: Some(PathBuf::from(crate::DEFAULT_AOF_PATH)),
        }
    }
}

/// Everything the command layer touches, owned in one place and only ever
/// accessed from the event-loop thread.
#[derive(Debug)]
pub struct ServerContext {
    pub store: Store,
    pub aof: Aof,
    pub pool: ThreadPool,
}
