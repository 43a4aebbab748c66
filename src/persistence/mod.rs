//! Persistence Module
//!
//! Durability for EmberKV is an append-only file of mutating commands,
//! serialized with the same framing as request bodies so the startup
//! replay runs straight through the normal request parser and dispatcher.
//!
//! ## Life of a mutation
//!
//! ```text
//! command executes ──► frame appended to pending RingBuf
//!                            │
//!                            ▼
//!                  write() of the contiguous span
//!                            │
//!                            ▼
//!                fsync at most once per second
//! ```
//!
//! Write failures are logged and the unwritten bytes stay buffered; the
//! in-memory state has already advanced, so durability is traded for
//! availability rather than failing the command.
//!
//! `bgrewriteaof` compacts the log: the store is scanned into a fresh
//! `<path>.temp` file holding the minimal command stream that recreates
//! the current state, which then atomically replaces the log by rename.

pub mod aof;

pub use aof::{replay, Aof};
