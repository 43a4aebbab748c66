//! Command Dispatch Module
//!
//! The dispatcher sits between the codec and the store: it receives one
//! parsed command vector, executes it against the store, streams the
//! reply into the connection's outgoing buffer, and, for mutating
//! commands that completed without a command-level error, frames the
//! command into the append-only file.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       execute()                         │
//! │                                                         │
//! │   (arity, name) ──► do_get / do_set / do_del / ...      │
//! │                            │                            │
//! │              ┌─────────────┼──────────────┐             │
//! │              ▼             ▼              ▼             │
//! │            Store       reply writer     Aof buffer      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The command table is case-sensitive and lower-case; `GET` is an
//! unknown command, as is `get` with the wrong number of arguments.

pub mod handler;

pub use handler::{dispose_entry, execute, replay_log};
