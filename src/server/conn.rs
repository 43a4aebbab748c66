//! Connection State Machine
//!
//! Each accepted socket gets one [`Conn`]: the non-blocking stream, an
//! incoming and an outgoing ring buffer, and three intent flags the event
//! loop translates into poll interest.
//!
//! ```text
//!            readable                        drained
//!   Reading ──────────► parse + dispatch ──────────► Reading
//!      ▲                      │
//!      │                      ▼ produced output
//!      └──── outgoing empty ── Writing ◄── writable
//!
//!   any I/O error / EOF / bad frame ──► want_close ──► destroyed
//! ```
//!
//! Reads drain the socket in 64 KiB chunks, then [`try_one_request`]
//! loops until the buffer no longer holds a complete frame. That loop is
//! what makes pipelining work: every request accumulated in one read is
//! answered before the connection yields back to the poller. When a read
//! produces output, one write is attempted immediately; in a
//! request/response exchange the socket is almost always writable, and
//! this skips a full poll round-trip per command.

use crate::buffer::RingBuf;
use crate::commands;
use crate::protocol::{self, writer, MAX_MSG};
use crate::server::ServerContext;
use mio::net::TcpStream;
use std::io::{self, Read, Write};
use tracing::{debug, warn};

/// Per-read chunk size.
const READ_CHUNK: usize = 64 * 1024;

/// One client connection.
#[derive(Debug)]
pub struct Conn {
    pub socket: TcpStream,
    /// Readiness intents, translated into poll interest by the loop.
    pub want_read: bool,
    pub want_write: bool,
    pub want_close: bool,
    /// Bytes read off the socket, awaiting framing.
    pub incoming: RingBuf,
    /// Responses awaiting the socket.
    pub outgoing: RingBuf,
    /// Monotonic ms of the last readiness event; drives idle eviction.
    pub last_active_ms: u64,
    /// Interest currently registered with the poller: (read, write).
    pub(crate) registered: (bool, bool),
}

impl Conn {
    pub fn new(socket: TcpStream, now_ms: u64) -> Self {
        Self {
            socket,
            want_read: true,
            want_write: false,
            want_close: false,
            incoming: RingBuf::new(),
            outgoing: RingBuf::new(),
            last_active_ms: now_ms,
            registered: (true, false),
        }
    }
}

/// Services read readiness: drain the socket, answer every complete
/// request, and opportunistically start writing.
pub(crate) fn handle_read(conn: &mut Conn, ctx: &mut ServerContext) {
    loop {
        let mut buf = [0u8; READ_CHUNK];
        match conn.socket.read(&mut buf) {
            Ok(0) => {
                if conn.incoming.is_empty() {
                    debug!("client closed connection");
                } else {
                    warn!(buffered = conn.incoming.len(), "unexpected EOF mid-frame");
                }
                conn.want_close = true;
                return;
            }
            Ok(n) => {
                conn.incoming.append(&buf[..n]);
                if n < READ_CHUNK {
                    break; // short read: the socket buffer is drained
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(error = %e, "read failed");
                conn.want_close = true;
                return;
            }
        }
    }

    // answer every complete pipelined request before yielding
    while try_one_request(conn, ctx) {}

    // flush even when closing: replies to earlier pipelined requests may
    // already be buffered
    if !conn.outgoing.is_empty() {
        conn.want_read = false;
        conn.want_write = true;
        handle_write(conn);
    }
}

/// Frames, parses, and dispatches one request if the incoming buffer
/// holds a complete one. Returns `true` when a request was consumed.
fn try_one_request(conn: &mut Conn, ctx: &mut ServerContext) -> bool {
    if conn.incoming.len() < 4 {
        return false; // want read
    }
    let len = conn.incoming.peek_u32(0) as usize;
    if len > MAX_MSG {
        warn!(len, "oversized request frame");
        conn.want_close = true;
        return false;
    }
    if 4 + len > conn.incoming.len() {
        return false; // want read
    }

    let mut body = vec![0u8; len];
    conn.incoming.peek(4, &mut body);
    let cmd = match protocol::parse_request(&body) {
        Ok(cmd) => cmd,
        Err(e) => {
            warn!(error = %e, "malformed request");
            conn.want_close = true;
            return false;
        }
    };

    let header = writer::begin_response(&mut conn.outgoing);
    commands::execute(&mut ctx.store, &mut ctx.aof, &ctx.pool, &cmd, &mut conn.outgoing);
    writer::end_response(&mut conn.outgoing, header);

    conn.incoming.consume(4 + len);
    true
}

/// Services write readiness: push contiguous spans of the outgoing buffer
/// until it drains or the socket pushes back.
pub(crate) fn handle_write(conn: &mut Conn) {
    while !conn.outgoing.is_empty() {
        let written = {
            let span = conn.outgoing.contiguous_span(0);
            match conn.socket.write(span) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return, // stay writing
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "write failed");
                    conn.want_close = true;
                    return;
                }
            }
        };
        if written == 0 {
            return;
        }
        conn.outgoing.consume(written);
    }
    // all data written; go back to reading
    conn.want_read = true;
    conn.want_write = false;
}
