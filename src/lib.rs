//! # EmberKV - An Event-Loop In-Memory Key-Value Server
//!
//! EmberKV is an in-memory key-value server speaking a length-prefixed
//! binary protocol over TCP. It stores strings and sorted sets, expires
//! keys on millisecond TTLs, and persists every mutation to an
//! append-only file that is replayed on startup and compacted in place.
//!
//! ## Features
//!
//! - **Single-threaded event loop**: every connection is multiplexed over
//!   one `mio::Poll` on one thread; no locks anywhere in the data path
//! - **Sorted sets**: ordered range queries by `(score, name)` plus O(1)
//!   membership
//! - **Millisecond TTLs**: a min-heap with exact back-pointers makes TTL
//!   updates O(log n), and expiry is bounded per tick
//! - **Append-only persistence**: write batching through a ring buffer,
//!   fsync at most once per second, crash-tolerant replay, and in-place
//!   log rewrite (`bgrewriteaof`)
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                              EmberKV                               │
//! │                                                                    │
//! │  socket ──► Conn.incoming ──► parser ──► dispatcher ──► Store      │
//! │   ▲          (RingBuf)                      │    │                 │
//! │   │                                         │    └──► Aof buffer   │
//! │   │                                         ▼              │       │
//! │   └───────── Conn.outgoing ◄───────── reply writer         ▼       │
//! │               (RingBuf)                              redis.aof     │
//! │                                                                    │
//! │  event loop (mio::Poll, 1 thread)          worker pool (4 threads) │
//! │    • idle list: evict conns idle ≥ 5 s       • large-set drops     │
//! │    • TTL heap:  expire ≤ 2000 keys/tick                            │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Protocol
//!
//! Requests are flat lists of byte strings, responses are tagged values
//! (nil, error, string, int, double, array); all integers little-endian,
//! frames capped at 32 MiB. See [`protocol`] for the exact layout.
//!
//! ## Commands
//!
//! `get`, `set`, `del`, `pexpire`, `pttl`, `keys`, `zadd`, `zrem`,
//! `zscore`, `zquery`, `bgrewriteaof`. The command table is
//! **case-sensitive and lower-case**: `GET` is an unknown command.
//!
//! ## Module Overview
//!
//! - [`buffer`]: the growable ring buffer behind all I/O staging
//! - [`protocol`]: request framing and tagged response values
//! - [`storage`]: the value store, sorted sets, and the TTL heap
//! - [`commands`]: the dispatcher and command handlers
//! - [`persistence`]: the append-only file engine
//! - [`server`]: the event loop and connection lifecycle
//! - [`pool`]: the worker pool for large-value destructors

pub mod buffer;
pub mod clock;
pub mod commands;
pub mod persistence;
pub mod pool;
pub mod protocol;
pub mod server;
pub mod storage;

#[cfg(test)]
mod proptests;

// Re-export the commonly used types
pub use persistence::Aof;
pub use pool::ThreadPool;
pub use protocol::Reply;
pub use server::{Server, ServerConfig};
pub use storage::Store;

/// The default port EmberKV listens on.
pub const DEFAULT_PORT: u16 = 1234;

/// The default bind address (wildcard).
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// The default append-only file path, relative to the working directory.
pub const DEFAULT_AOF_PATH: &str = "redis.aof";

/// Version of EmberKV.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
