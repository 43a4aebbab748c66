//! Command Handlers
//!
//! One function per command, all dispatched from [`execute`] by
//! `(arity, name)`. Handlers write their reply directly through the
//! response writer and report whether the command should be persisted.
//!
//! ## Supported commands
//!
//! | Command | Reply |
//! |---|---|
//! | `get k` | STR, NIL when absent |
//! | `set k v` | NIL |
//! | `del k` | INT 1/0 |
//! | `pexpire k ms` | INT 1/0 (negative ms clears the TTL) |
//! | `pttl k` | INT: -2 absent, -1 no TTL, else remaining ms |
//! | `keys` | ARR of all keys |
//! | `zadd k score name` | INT 1 added / 0 updated |
//! | `zrem k name` | INT 1/0 |
//! | `zscore k name` | DBL, NIL when absent |
//! | `zquery k score name offset limit` | flattened ARR of (name, score) |
//! | `bgrewriteaof` | INT 1 |
//!
//! Missing keys read as empty sorted sets and are created by sorted-set
//! writes; a key of the wrong variant is a `BAD_TYP` error either way.

use crate::buffer::RingBuf;
use crate::clock;
use crate::persistence::{self, Aof};
use crate::pool::ThreadPool;
use crate::protocol::{errcode, writer};
use crate::storage::{Entry, SortedSet, Store, Value};
use bytes::Bytes;
use tracing::warn;

/// Sorted sets larger than this have their destructor run on the worker
/// pool instead of the event-loop thread.
const LARGE_CONTAINER_SIZE: usize = 1000;

/// Executes one command, writing the reply into `out`.
///
/// Mutating commands that complete without a command-level error are
/// appended to the AOF buffer and flushed before this function returns,
/// i.e. before the caller finalizes the response header.
pub fn execute(
    store: &mut Store,
    aof: &mut Aof,
    pool: &ThreadPool,
    cmd: &[Bytes],
    out: &mut RingBuf,
) {
    let name: &[u8] = cmd.first().map(|c| c.as_ref()).unwrap_or(b"");
    let persist = match (cmd.len(), name) {
        (2, b"get") => {
            do_get(store, cmd, out);
            false
        }
        (3, b"set") => do_set(store, cmd, out),
        (2, b"del") => do_del(store, pool, cmd, out),
        (3, b"pexpire") => do_pexpire(store, cmd, out),
        (2, b"pttl") => {
            do_pttl(store, cmd, out);
            false
        }
        (1, b"keys") => {
            do_keys(store, out);
            false
        }
        (4, b"zadd") => do_zadd(store, cmd, out),
        (3, b"zrem") => do_zrem(store, cmd, out),
        (3, b"zscore") => {
            do_zscore(store, cmd, out);
            false
        }
        (6, b"zquery") => {
            do_zquery(store, cmd, out);
            false
        }
        (1, b"bgrewriteaof") => {
            do_bgrewriteaof(store, aof, out);
            false
        }
        _ => {
            writer::write_err(out, errcode::UNKNOWN, "unknown command.");
            false
        }
    };

    if persist && aof.is_enabled() {
        aof.append_command(cmd);
        aof.flush_and_sync(clock::now_ms());
    }
}

/// Replays the append-only file through the normal dispatch path with
/// AOF appends suppressed. Called once at startup, before the listener
/// accepts anything.
pub fn replay_log(store: &mut Store, aof: &mut Aof, pool: &ThreadPool) {
    if !aof.is_enabled() {
        return;
    }
    aof.set_enabled(false);
    let path = aof.path().to_path_buf();
    let mut scratch = RingBuf::new();
    let result = persistence::replay(&path, |cmd| {
        execute(store, aof, pool, &cmd, &mut scratch);
        scratch.clear();
    });
    if let Err(e) = result {
        warn!(error = %e, "append-only file replay failed, continuing with partial state");
    }
    aof.set_enabled(true);
}

/// Destroys a removed entry, offloading large sorted sets to the worker
/// pool. The entry is already detached from the store and the TTL heap.
pub fn dispose_entry(pool: &ThreadPool, entry: Entry) {
    let large = matches!(&entry.value, Value::ZSet(set) if set.len() > LARGE_CONTAINER_SIZE);
    if large {
        pool.execute(move || drop(entry));
    }
    // small entries drop right here
}

fn parse_int(arg: &[u8]) -> Option<i64> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}

/// Parses a score; NaN is rejected here so it never reaches the store.
fn parse_float(arg: &[u8]) -> Option<f64> {
    let v: f64 = std::str::from_utf8(arg).ok()?.parse().ok()?;
    if v.is_nan() {
        return None;
    }
    Some(v)
}

fn do_get(store: &Store, cmd: &[Bytes], out: &mut RingBuf) {
    match store.get(&cmd[1]) {
        None => writer::write_nil(out),
        Some(entry) => match &entry.value {
            Value::Str(s) => writer::write_str(out, s),
            Value::ZSet(_) => writer::write_err(out, errcode::BAD_TYP, "not a string value"),
        },
    }
}

fn do_set(store: &mut Store, cmd: &[Bytes], out: &mut RingBuf) -> bool {
    match store.get_mut(&cmd[1]) {
        Some(entry) => match &mut entry.value {
            // overwrite in place; an existing TTL stays attached
            Value::Str(s) => *s = cmd[2].clone(),
            Value::ZSet(_) => {
                writer::write_err(out, errcode::BAD_TYP, "a non-string value exists");
                return false;
            }
        },
        None => store.insert(cmd[1].clone(), Value::Str(cmd[2].clone())),
    }
    writer::write_nil(out);
    true
}

fn do_del(store: &mut Store, pool: &ThreadPool, cmd: &[Bytes], out: &mut RingBuf) -> bool {
    let removed = store.remove(&cmd[1]);
    let found = removed.is_some();
    if let Some(entry) = removed {
        dispose_entry(pool, entry);
    }
    writer::write_int(out, found as i64);
    true
}

fn do_pexpire(store: &mut Store, cmd: &[Bytes], out: &mut RingBuf) -> bool {
    let Some(ttl_ms) = parse_int(&cmd[2]) else {
        writer::write_err(out, errcode::BAD_ARG, "expect int64");
        return false;
    };
    let found = store.get(&cmd[1]).is_some();
    if found {
        store.set_ttl(&cmd[1], ttl_ms, clock::now_ms());
    }
    writer::write_int(out, found as i64);
    true
}

fn do_pttl(store: &Store, cmd: &[Bytes], out: &mut RingBuf) {
    writer::write_int(out, store.pttl(&cmd[1], clock::now_ms()));
}

fn do_keys(store: &Store, out: &mut RingBuf) {
    writer::write_arr(out, store.len() as u32);
    for key in store.keys() {
        writer::write_str(out, key);
    }
}

fn do_zadd(store: &mut Store, cmd: &[Bytes], out: &mut RingBuf) -> bool {
    let Some(score) = parse_float(&cmd[2]) else {
        writer::write_err(out, errcode::BAD_ARG, "expect float");
        return false;
    };
    if store.get(&cmd[1]).is_none() {
        store.insert(cmd[1].clone(), Value::ZSet(SortedSet::new()));
    }
    let added = match store.get_mut(&cmd[1]) {
        Some(Entry {
            value: Value::ZSet(set),
            ..
        }) => set.insert(cmd[3].clone(), score),
        _ => {
            writer::write_err(out, errcode::BAD_TYP, "expect zset");
            return false;
        }
    };
    writer::write_int(out, added as i64);
    true
}

fn do_zrem(store: &mut Store, cmd: &[Bytes], out: &mut RingBuf) -> bool {
    match store.get_mut(&cmd[1]) {
        // a missing key is an empty set, so there is nothing to remove
        None => writer::write_int(out, 0),
        Some(entry) => match &mut entry.value {
            Value::ZSet(set) => {
                let removed = set.remove(&cmd[2]);
                writer::write_int(out, removed as i64);
            }
            Value::Str(_) => {
                writer::write_err(out, errcode::BAD_TYP, "expect zset");
                return false;
            }
        },
    }
    true
}

fn do_zscore(store: &Store, cmd: &[Bytes], out: &mut RingBuf) {
    match store.get(&cmd[1]) {
        None => writer::write_nil(out),
        Some(entry) => match &entry.value {
            Value::ZSet(set) => match set.score(&cmd[2]) {
                Some(score) => writer::write_dbl(out, score),
                None => writer::write_nil(out),
            },
            Value::Str(_) => writer::write_err(out, errcode::BAD_TYP, "expect zset"),
        },
    }
}

fn do_zquery(store: &Store, cmd: &[Bytes], out: &mut RingBuf) {
    let Some(score) = parse_float(&cmd[2]) else {
        writer::write_err(out, errcode::BAD_ARG, "expect fp number");
        return;
    };
    let (Some(offset), Some(limit)) = (parse_int(&cmd[4]), parse_int(&cmd[5])) else {
        writer::write_err(out, errcode::BAD_ARG, "expect int");
        return;
    };

    let set = match store.get(&cmd[1]) {
        // a missing key behaves as an empty set
        None => {
            writer::write_arr(out, 0);
            return;
        }
        Some(entry) => match &entry.value {
            Value::ZSet(set) => set,
            Value::Str(_) => {
                writer::write_err(out, errcode::BAD_TYP, "expect zset");
                return;
            }
        },
    };

    if limit <= 0 {
        writer::write_arr(out, 0);
        return;
    }
    let pairs = set.query(score, &cmd[3], offset, limit);
    let ctx = writer::begin_arr(out);
    let mut n = 0u32;
    for (name, score) in &pairs {
        writer::write_str(out, name);
        writer::write_dbl(out, *score);
        n += 2;
    }
    writer::end_arr(out, ctx, n);
}

fn do_bgrewriteaof(store: &Store, aof: &mut Aof, out: &mut RingBuf) {
    if !aof.is_enabled() {
        writer::write_err(out, errcode::BAD_ARG, "AOF is not enabled");
        return;
    }
    if aof.is_rewriting() {
        writer::write_err(out, errcode::BAD_ARG, "AOF rewrite already in progress");
        return;
    }
    match aof.rewrite(store, clock::now_ms()) {
        Ok(()) => writer::write_int(out, 1),
        Err(e) => {
            warn!(error = %e, "append-only file rewrite failed");
            writer::write_err(out, errcode::UNKNOWN, "AOF rewrite failed");
        }
    }
}
