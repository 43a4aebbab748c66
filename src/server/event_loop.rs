//! The Event Loop
//!
//! One thread, one `mio::Poll`, every connection. Each tick:
//!
//! 1. Compute the poll timeout from the nearest timer (the least
//!    recently active connection's idle deadline or the earliest TTL)
//!    and block in `poll` until readiness or that deadline.
//! 2. Accept every pending connection when the listener is ready.
//! 3. For each ready connection: refresh its idle position, run the
//!    read/write state machine per its intents, then destroy it if
//!    anything flagged `want_close`.
//! 4. Run the timers: evict connections idle past the timeout and expire
//!    due keys, at most 2000 per tick so a mass expiry cannot stall the
//!    loop.
//!
//! mio registers sockets edge-triggered, so the read and write handlers
//! drain until `WouldBlock`; interest is re-registered only when a
//! connection's intents actually change.

use crate::clock;
use crate::commands;
use crate::persistence::Aof;
use crate::pool::ThreadPool;
use crate::server::conn::{self, Conn};
use crate::server::idle::IdleList;
use crate::server::{ServerConfig, ServerContext};
use crate::storage::Store;
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Token reserved for the listening socket.
const LISTENER: Token = Token(usize::MAX);

/// Connections idle this long are destroyed.
const IDLE_TIMEOUT_MS: u64 = 5000;

/// Upper bound on key expirations per tick.
const MAX_EXPIRED_PER_TICK: usize = 2000;

const EVENT_CAPACITY: usize = 1024;

/// The server: listener, connection table, timers, and context.
#[derive(Debug)]
pub struct Server {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    /// Connection arena; the slot index is the poll token.
    conns: Vec<Option<Conn>>,
    free: Vec<usize>,
    idle: IdleList,
    ctx: ServerContext,
}

impl Server {
    /// Opens the log, replays it, binds the listener, and readies the
    /// poll set. Bind, listen, or poll-creation failures are fatal and
    /// propagate to the caller.
    pub fn new(config: &ServerConfig) -> io::Result<Self> {
        let mut aof = match &config.aof {
            Some(path) => Aof::open(path),
            None => Aof::disabled(),
        };
        let mut store = Store::new();
        let pool = ThreadPool::new();
        commands::replay_log(&mut store, &mut aof, &pool);
        if !store.is_empty() {
            info!(keys = store.len(), "state restored from append-only file");
        }

        let addr: SocketAddr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let mut listener = TcpListener::bind(addr)?;
        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        info!(addr = %listener.local_addr()?, "listening");

        Ok(Self {
            poll,
            events: Events::with_capacity(EVENT_CAPACITY),
            listener,
            conns: Vec::new(),
            free: Vec::new(),
            idle: IdleList::new(),
            ctx: ServerContext { store, aof, pool },
        })
    }

    /// The bound address; useful when the configured port was 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the event loop forever. Only fatal poll errors return.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            self.tick()?;
        }
    }

    /// One poll iteration.
    fn tick(&mut self) -> io::Result<()> {
        let timeout = self.next_timer();
        if let Err(e) = self.poll.poll(&mut self.events, timeout) {
            if e.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(e);
        }

        let ready: Vec<(Token, bool, bool, bool)> = self
            .events
            .iter()
            .map(|e| (e.token(), e.is_readable(), e.is_writable(), e.is_error()))
            .collect();

        for (token, readable, writable, errored) in ready {
            if token == LISTENER {
                self.accept_ready();
            } else {
                self.service_conn(token.0, readable, writable, errored);
            }
        }

        self.process_timers();
        Ok(())
    }

    /// Accepts until the listener reports `WouldBlock`.
    fn accept_ready(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut socket, addr)) => {
                    let idx = self.free.pop().unwrap_or_else(|| {
                        self.conns.push(None);
                        self.conns.len() - 1
                    });
                    if let Err(e) =
                        self.poll
                            .registry()
                            .register(&mut socket, Token(idx), Interest::READABLE)
                    {
                        error!(error = %e, "failed to register connection");
                        self.free.push(idx);
                        continue;
                    }
                    info!(client = %addr, token = idx, "client connected");
                    self.conns[idx] = Some(Conn::new(socket, clock::now_ms()));
                    self.idle.touch(idx);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!(error = %e, "accept failed");
                    break;
                }
            }
        }
    }

    /// Runs one connection's state machine for the readiness it got.
    fn service_conn(&mut self, idx: usize, readable: bool, writable: bool, errored: bool) {
        let now = clock::now_ms();
        match self.conns.get_mut(idx).and_then(Option::as_mut) {
            Some(conn) => conn.last_active_ms = now,
            None => return, // destroyed earlier in this batch
        }
        self.idle.touch(idx);

        if let Some(conn) = self.conns[idx].as_mut() {
            if errored {
                conn.want_close = true;
            }
            if readable && conn.want_read && !conn.want_close {
                conn::handle_read(conn, &mut self.ctx);
            }
            if writable && conn.want_write && !conn.want_close {
                conn::handle_write(conn);
            }
        }

        let close = self.conns[idx].as_ref().map_or(false, |c| c.want_close);
        if close {
            self.destroy_conn(idx);
        } else {
            self.update_interest(idx);
        }
    }

    /// Re-registers a connection's poll interest if its intents changed.
    fn update_interest(&mut self, idx: usize) {
        let mut failed = false;
        if let Some(conn) = self.conns[idx].as_mut() {
            let wanted = (conn.want_read, conn.want_write);
            if wanted == conn.registered {
                return;
            }
            let interest = match wanted {
                (true, true) => Interest::READABLE | Interest::WRITABLE,
                (true, false) => Interest::READABLE,
                (false, true) => Interest::WRITABLE,
                // no I/O intent; keep error readiness flowing
                (false, false) => Interest::READABLE,
            };
            match self
                .poll
                .registry()
                .reregister(&mut conn.socket, Token(idx), interest)
            {
                Ok(()) => conn.registered = wanted,
                Err(e) => {
                    warn!(error = %e, token = idx, "reregister failed");
                    failed = true;
                }
            }
        }
        if failed {
            self.destroy_conn(idx);
        }
    }

    /// Closes the socket and unlinks the connection everywhere.
    fn destroy_conn(&mut self, idx: usize) {
        if let Some(mut conn) = self.conns[idx].take() {
            let _ = self.poll.registry().deregister(&mut conn.socket);
            self.idle.detach(idx);
            self.free.push(idx);
            debug!(token = idx, "connection closed");
        }
    }

    /// Time until the nearest timer, or `None` to poll indefinitely.
    fn next_timer(&self) -> Option<Duration> {
        let mut next: Option<u64> = None;
        if let Some(token) = self.idle.front() {
            if let Some(conn) = self.conns.get(token).and_then(Option::as_ref) {
                next = Some(conn.last_active_ms + IDLE_TIMEOUT_MS);
            }
        }
        if let Some(deadline) = self.ctx.store.next_expiry() {
            next = Some(next.map_or(deadline, |n| n.min(deadline)));
        }
        next.map(|deadline| Duration::from_millis(deadline.saturating_sub(clock::now_ms())))
    }

    /// Evicts idle connections and expires due keys.
    fn process_timers(&mut self) {
        let now = clock::now_ms();

        while let Some(token) = self.idle.front() {
            let Some(conn) = self.conns.get(token).and_then(Option::as_ref) else {
                self.idle.detach(token); // stale link; must not spin
                continue;
            };
            if conn.last_active_ms + IDLE_TIMEOUT_MS > now {
                break; // the rest are younger
            }
            info!(token, "closing idle connection");
            self.destroy_conn(token);
        }

        let expired = self.ctx.store.expire_due(now, MAX_EXPIRED_PER_TICK);
        if !expired.is_empty() {
            debug!(count = expired.len(), "keys expired");
        }
        for (_key, entry) in expired {
            commands::dispose_entry(&self.ctx.pool, entry);
        }
    }
}
