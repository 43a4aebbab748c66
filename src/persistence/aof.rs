//! Append-Only File Engine
//!
//! [`Aof`] owns the active log file and a pending-write ring buffer.
//! Mutating commands are framed into the buffer immediately after they
//! execute; the buffer is then drained to the file with a single write of
//! its contiguous span, and fsync runs at most once per second. A slow or
//! failing disk therefore backs data up in memory instead of stalling
//! clients.
//!
//! [`replay`] streams a log back as command vectors. A log that ends
//! mid-record (unclean shutdown) is replayed up to the last complete
//! record; a record claiming more than the protocol's argument limit
//! aborts the replay with a warning, leaving the store at the partial
//! state.

use crate::buffer::RingBuf;
use crate::protocol::MAX_ARGS;
use crate::storage::{Entry, Store, Value};
use bytes::Bytes;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Minimum interval between fsync calls.
const SYNC_INTERVAL_MS: u64 = 1000;

/// The append-only file engine.
#[derive(Debug)]
pub struct Aof {
    path: PathBuf,
    file: Option<File>,
    buf: RingBuf,
    last_sync_ms: u64,
    enabled: bool,
    rewriting: bool,
}

impl Aof {
    /// Opens (creating if needed) the log at `path` in append mode. On
    /// failure the engine comes up disabled and the server runs without
    /// persistence, matching the availability-over-durability stance.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => {
                info!(path = %path.display(), "append-only file enabled");
                Self {
                    path,
                    file: Some(file),
                    buf: RingBuf::new(),
                    last_sync_ms: 0,
                    enabled: true,
                    rewriting: false,
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to open append-only file, persistence disabled");
                Self {
                    path,
                    file: None,
                    buf: RingBuf::new(),
                    last_sync_ms: 0,
                    enabled: false,
                    rewriting: false,
                }
            }
        }
    }

    /// An engine that never persists anything.
    pub fn disabled() -> Self {
        Self {
            path: PathBuf::new(),
            file: None,
            buf: RingBuf::new(),
            last_sync_ms: 0,
            enabled: false,
            rewriting: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && self.file.is_some()
    }

    /// Toggles persistence without touching the file. Replay uses this to
    /// suppress re-logging of the commands it feeds back through the
    /// dispatcher.
    pub fn set_enabled(&mut self, on: bool) {
        self.enabled = on;
    }

    pub fn is_rewriting(&self) -> bool {
        self.rewriting
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frames a command onto the pending buffer.
    pub fn append_command(&mut self, cmd: &[Bytes]) {
        frame_command(&mut self.buf, cmd);
    }

    /// Attempts one write of the pending buffer's contiguous span, then
    /// fsyncs if a second has passed since the last sync. Partial writes
    /// stay buffered; write errors are logged and the data is retained.
    pub fn flush_and_sync(&mut self, now_ms: u64) {
        if !self.enabled || self.buf.is_empty() {
            return;
        }
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let written = {
            let span = self.buf.contiguous_span(0);
            match file.write(span) {
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "append-only file write failed, retaining buffered data");
                    return;
                }
            }
        };
        self.buf.consume(written);

        if now_ms.saturating_sub(self.last_sync_ms) > SYNC_INTERVAL_MS {
            if let Err(e) = file.sync_data() {
                warn!(error = %e, "append-only file fsync failed");
            }
            self.last_sync_ms = now_ms;
        }
    }

    /// Drains the pending buffer completely and fsyncs. Used before the
    /// rewrite rename so the old log is complete up to the swap point.
    fn flush_all(&mut self) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        while !self.buf.is_empty() {
            let written = {
                let span = self.buf.contiguous_span(0);
                match file.write(span) {
                    Ok(n) => n,
                    Err(e) => {
                        warn!(error = %e, "append-only file write failed during rewrite flush");
                        return;
                    }
                }
            };
            if written == 0 {
                return;
            }
            self.buf.consume(written);
        }
        if let Err(e) = file.sync_data() {
            warn!(error = %e, "append-only file fsync failed");
        }
    }

    /// Rewrites the log in place: scans the store into `<path>.temp` as
    /// the minimal command stream reproducing current state, fsyncs it,
    /// flushes the pending buffer, and renames the temp file over the log.
    ///
    /// The scan runs synchronously on the calling (event-loop) thread;
    /// every client stalls for its duration.
    pub fn rewrite(&mut self, store: &Store, now_ms: u64) -> io::Result<()> {
        if self.rewriting {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "rewrite already in progress",
            ));
        }
        self.rewriting = true;
        let result = self.rewrite_inner(store, now_ms);
        self.rewriting = false;
        result
    }

    fn rewrite_inner(&mut self, store: &Store, now_ms: u64) -> io::Result<()> {
        let temp_path = temp_path_for(&self.path);
        info!(path = %temp_path.display(), entries = store.len(), "rewriting append-only file");

        let mut temp = File::create(&temp_path)?;
        let mut scratch = RingBuf::new();
        for (key, entry) in store.iter() {
            rewrite_entry(&mut scratch, store, key, entry, now_ms);
            while !scratch.is_empty() {
                let written = {
                    let span = scratch.contiguous_span(0);
                    temp.write(span)?
                };
                scratch.consume(written);
            }
        }
        temp.sync_data()?;
        drop(temp); // close before rename

        self.flush_all();

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            warn!(error = %e, "rename failed during rewrite");
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        match OpenOptions::new().append(true).open(&self.path) {
            Ok(file) => self.file = Some(file),
            Err(e) => {
                warn!(error = %e, "failed to reopen append-only file after rewrite, persistence disabled");
                self.file = None;
                self.enabled = false;
                return Err(e);
            }
        }

        info!("append-only file rewrite complete");
        Ok(())
    }
}

/// `<path>.temp`, alongside the log.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".temp");
    PathBuf::from(os)
}

/// Frames one command with the request-body layout:
/// `u32 nstr | (u32 len | bytes)^nstr`.
pub(crate) fn frame_command(buf: &mut RingBuf, cmd: &[Bytes]) {
    if cmd.is_empty() {
        return;
    }
    buf.append_u32(cmd.len() as u32);
    for part in cmd {
        buf.append_u32(part.len() as u32);
        buf.append(part);
    }
}

/// Emits the minimal command stream recreating one entry.
fn rewrite_entry(buf: &mut RingBuf, store: &Store, key: &Bytes, entry: &Entry, now_ms: u64) {
    match &entry.value {
        Value::Str(s) => {
            frame_command(
                buf,
                &[Bytes::from_static(b"set"), key.clone(), s.clone()],
            );
        }
        Value::ZSet(set) => {
            for (name, score) in set.iter() {
                frame_command(
                    buf,
                    &[
                        Bytes::from_static(b"zadd"),
                        key.clone(),
                        Bytes::from(score.to_string()),
                        name.clone(),
                    ],
                );
            }
        }
    }
    if let Some(deadline) = store.deadline_of(entry) {
        let remaining = deadline.saturating_sub(now_ms);
        if remaining > 0 {
            frame_command(
                buf,
                &[
                    Bytes::from_static(b"pexpire"),
                    key.clone(),
                    Bytes::from(remaining.to_string()),
                ],
            );
        }
    }
}

/// Streams the log at `path` back as command vectors.
///
/// Returns the number of complete records applied. A missing file is an
/// empty log; a truncated tail ends the replay cleanly; an argument count
/// over the protocol limit aborts with a warning.
pub fn replay(path: &Path, mut apply: impl FnMut(Vec<Bytes>)) -> io::Result<u64> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no append-only file found, starting empty");
            return Ok(0);
        }
        Err(e) => return Err(e),
    };
    let mut reader = BufReader::new(file);
    let mut count = 0u64;

    loop {
        let nstr = match read_u32(&mut reader) {
            Ok(Some(n)) => n,
            Ok(None) => break, // clean end of log
            Err(e) => return Err(e),
        };
        if nstr as usize > MAX_ARGS {
            warn!(nstr, "append-only file is corrupted, stopping replay");
            break;
        }

        let mut cmd = Vec::with_capacity(nstr.min(16) as usize);
        let mut truncated = false;
        for _ in 0..nstr {
            let len = match read_u32(&mut reader) {
                Ok(Some(n)) => n,
                Ok(None) => {
                    truncated = true;
                    break;
                }
                Err(e) => return Err(e),
            };
            let mut s = vec![0u8; len as usize];
            if let Err(e) = reader.read_exact(&mut s) {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    truncated = true;
                    break;
                }
                return Err(e);
            }
            cmd.push(Bytes::from(s));
        }
        if truncated {
            warn!("append-only file ends mid-record, replaying up to the last complete command");
            break;
        }

        apply(cmd);
        count += 1;
    }

    info!(commands = count, path = %path.display(), "append-only file replayed");
    Ok(count)
}

/// Reads a little-endian u32, or `None` on end of input.
fn read_u32(reader: &mut impl Read) -> io::Result<Option<u32>> {
    let mut four = [0u8; 4];
    match reader.read_exact(&mut four) {
        Ok(()) => Ok(Some(u32::from_le_bytes(four))),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e),
    }
}
