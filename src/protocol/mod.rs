//! Wire Protocol Module
//!
//! EmberKV speaks a length-prefixed binary protocol. All integers on the
//! wire are little-endian.
//!
//! ## Request
//!
//! ```text
//! +-----------+------+-----+------+-----+------+-----+-----+------+
//! | total_len | nstr | len | str1 | len | str2 | ... | len | strn |
//! +-----------+------+-----+------+-----+------+-----+-----+------+
//!     u32       u32    u32           u32                u32
//! ```
//!
//! `total_len` covers everything after itself. A request is a flat list of
//! byte strings; the first is the command name, the rest its arguments.
//!
//! ## Response
//!
//! ```text
//! +-----------+-----+---------+
//! | total_len | tag | payload |
//! +-----------+-----+---------+
//!     u32       u8
//! ```
//!
//! The payload is a tagged value: nil, error (code + message), string,
//! int64, double, or an array of further tagged values.
//!
//! Frames in either direction are capped at 32 MiB. Requests may carry at
//! most 200,000 strings.
//!
//! ## Modules
//!
//! - `types`: tags, error codes, limits, and the [`Reply`] value tree
//! - `parser`: request-body parsing and response decoding
//! - `writer`: streaming response emission into a ring buffer

pub mod parser;
pub mod types;
pub mod writer;

pub use parser::{decode_reply, parse_request, ParseError};
pub use types::{errcode, tag, Reply, MAX_ARGS, MAX_MSG};
