//! Ring Buffer Module
//!
//! A growable circular byte buffer used in three places:
//!
//! - per-connection input staging (bytes read off the socket, waiting to be
//!   framed and parsed)
//! - per-connection output staging (responses waiting to be written)
//! - the append-only-file pending-write buffer
//!
//! The buffer exposes a contiguous view over its circular storage
//! ([`RingBuf::contiguous_span`]) so that socket and file writes can hand the
//! kernel one large slice without first linearizing the data.

pub mod ring;

pub use ring::RingBuf;
