//! Throughput Benchmark for EmberKV
//!
//! This benchmark measures the hot paths in isolation: the ring buffer,
//! the value store, sorted-set queries, and request parsing.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use emberkv::buffer::RingBuf;
use emberkv::protocol::parse_request;
use emberkv::storage::{SortedSet, Store, Value};

/// Benchmark ring buffer staging: append a chunk, consume it in spans.
fn bench_ringbuf(c: &mut Criterion) {
    let mut group = c.benchmark_group("ringbuf");

    for size in [64usize, 4096, 64 * 1024] {
        let chunk = vec![0xabu8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("append_consume_{}", size), |b| {
            let mut buf = RingBuf::new();
            b.iter(|| {
                buf.append(&chunk);
                while !buf.is_empty() {
                    let n = buf.contiguous_span(0).len();
                    buf.consume(n);
                }
            });
        });
    }

    group.finish();
}

/// Benchmark store SET/GET operations.
fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut store = Store::new();
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i % 100_000));
            store.remove(&key);
            store.insert(key, Value::Str(Bytes::from("small_value")));
            i += 1;
        });
    });

    group.bench_function("get_existing", |b| {
        let mut store = Store::new();
        for i in 0..100_000u64 {
            store.insert(
                Bytes::from(format!("key:{}", i)),
                Value::Str(Bytes::from(format!("value:{}", i))),
            );
        }
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i % 100_000));
            black_box(store.get(&key));
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let store = Store::new();
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("missing:{}", i));
            black_box(store.get(&key));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark TTL heap churn: set and clear TTLs in place.
fn bench_ttl(c: &mut Criterion) {
    let mut group = c.benchmark_group("ttl");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_ttl_existing", |b| {
        let mut store = Store::new();
        for i in 0..10_000u64 {
            store.insert(
                Bytes::from(format!("expire:{}", i)),
                Value::Str(Bytes::from("value")),
            );
        }
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("expire:{}", i % 10_000);
            store.set_ttl(key.as_bytes(), 3_600_000, 0);
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark sorted-set insertion and range queries.
fn bench_zset(c: &mut Criterion) {
    let mut group = c.benchmark_group("zset");
    group.throughput(Throughput::Elements(1));

    group.bench_function("insert", |b| {
        let mut set = SortedSet::new();
        let mut i = 0u64;
        b.iter(|| {
            let name = Bytes::from(format!("member:{}", i % 100_000));
            set.insert(name, (i % 1000) as f64);
            i += 1;
        });
    });

    group.bench_function("query_10", |b| {
        let mut set = SortedSet::new();
        for i in 0..100_000u64 {
            set.insert(Bytes::from(format!("member:{}", i)), (i % 1000) as f64);
        }
        let mut i = 0u64;
        b.iter(|| {
            black_box(set.query((i % 1000) as f64, b"", 0, 10));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark request-body parsing.
fn bench_parse(c: &mut Criterion) {
    let mut body = Vec::new();
    let parts: &[&[u8]] = &[b"set", b"some:key", b"some-modest-value"];
    body.extend_from_slice(&(parts.len() as u32).to_le_bytes());
    for p in parts {
        body.extend_from_slice(&(p.len() as u32).to_le_bytes());
        body.extend_from_slice(p);
    }

    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Bytes(body.len() as u64));
    group.bench_function("set_command", |b| {
        b.iter(|| black_box(parse_request(&body).unwrap()));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_ringbuf,
    bench_store,
    bench_ttl,
    bench_zset,
    bench_parse,
);

criterion_main!(benches);
