//! Model-based property tests.
//!
//! The ring buffer is checked against a `VecDeque` reference, the sorted
//! set against a naive vector model, and both codec directions against
//! their inverses.

use std::collections::VecDeque;

use bytes::Bytes;
use proptest::prelude::*;

use crate::buffer::RingBuf;
use crate::protocol::{decode_reply, parse_request, Reply};
use crate::storage::SortedSet;

#[derive(Debug, Clone)]
enum BufOp {
    Append(Vec<u8>),
    /// Consume a pseudo-fraction of the buffered bytes.
    Consume(u8),
}

fn buf_op() -> impl Strategy<Value = BufOp> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..64).prop_map(BufOp::Append),
        any::<u8>().prop_map(BufOp::Consume),
    ]
}

fn buffered(buf: &RingBuf) -> Vec<u8> {
    let mut out = vec![0u8; buf.len()];
    buf.peek(0, &mut out);
    out
}

proptest! {
    /// Bytes come out exactly as they went in, across arbitrary
    /// append/consume interleavings, wraps, and growths.
    #[test]
    fn ringbuf_matches_model(ops in prop::collection::vec(buf_op(), 1..64)) {
        let mut buf = RingBuf::with_capacity(8);
        let mut model: VecDeque<u8> = VecDeque::new();

        for op in ops {
            match op {
                BufOp::Append(bytes) => {
                    buf.append(&bytes);
                    model.extend(bytes);
                }
                BufOp::Consume(frac) => {
                    let n = if model.is_empty() {
                        0
                    } else {
                        (frac as usize) % (model.len() + 1)
                    };
                    buf.consume(n);
                    model.drain(..n);
                }
            }
            prop_assert_eq!(buf.len(), model.len());
            prop_assert!(buf.len() <= buf.capacity());
            prop_assert!(buf.head() < buf.capacity());
            prop_assert_eq!(buf.tail(), (buf.head() + buf.len()) % buf.capacity());
            let want: Vec<u8> = model.iter().copied().collect();
            prop_assert_eq!(buffered(&buf), want);
        }
    }

    /// `parse_request` inverts request framing for any argument vector.
    #[test]
    fn request_roundtrip(args in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 0..8)) {
        let mut body = Vec::new();
        body.extend_from_slice(&(args.len() as u32).to_le_bytes());
        for a in &args {
            body.extend_from_slice(&(a.len() as u32).to_le_bytes());
            body.extend_from_slice(a);
        }
        let parsed = parse_request(&body).unwrap();
        let expect: Vec<Bytes> = args.into_iter().map(Bytes::from).collect();
        prop_assert_eq!(parsed, expect);
    }

    /// `decode_reply` inverts `Reply::encode` for any non-NaN value tree.
    #[test]
    fn reply_roundtrip(reply in reply_strategy()) {
        let mut buf = RingBuf::new();
        reply.encode(&mut buf);
        let bytes = buffered(&buf);
        let (decoded, consumed) = decode_reply(&bytes).unwrap();
        prop_assert_eq!(consumed, bytes.len());
        prop_assert_eq!(decoded, reply);
    }

    /// The sorted set agrees with a naive model on membership and on
    /// `query` ordering, seek, offset, and limit behavior.
    #[test]
    fn zset_matches_model(
        inserts in prop::collection::vec((0u8..16, -4i32..4), 0..48),
        removes in prop::collection::vec(0u8..16, 0..16),
        seek in (0u8..16, -4i32..4),
        offset in -20i64..20,
        limit in -2i64..20,
    ) {
        let mut set = SortedSet::new();
        let mut model: Vec<(Vec<u8>, f64)> = Vec::new();

        for (name, score) in inserts {
            let name = vec![b'a' + name];
            let score = score as f64 / 2.0;
            let added = set.insert(Bytes::copy_from_slice(&name), score);
            match model.iter_mut().find(|(n, _)| *n == name) {
                Some(slot) => {
                    prop_assert!(!added);
                    slot.1 = score;
                }
                None => {
                    prop_assert!(added);
                    model.push((name, score));
                }
            }
        }
        for name in removes {
            let name = vec![b'a' + name];
            let removed = set.remove(&name);
            let had = model.iter().position(|(n, _)| *n == name);
            prop_assert_eq!(removed, had.is_some());
            if let Some(i) = had {
                model.remove(i);
            }
        }

        prop_assert_eq!(set.len(), model.len());

        // the model's ordered view
        model.sort_by(|(an, ascore), (bn, bscore)| {
            ascore.total_cmp(bscore).then_with(|| an.cmp(bn))
        });

        let (seek_name, seek_score) = (vec![b'a' + seek.0], seek.1 as f64 / 2.0);
        let rank = model
            .iter()
            .take_while(|(n, s)| {
                s.total_cmp(&seek_score)
                    .then_with(|| n.cmp(&seek_name))
                    .is_lt()
            })
            .count() as i64;
        let start = rank + offset;
        let expect: Vec<(Bytes, f64)> = if limit <= 0 || start < 0 || start as usize >= model.len()
        {
            Vec::new()
        } else {
            model
                .iter()
                .skip(start as usize)
                .take(limit as usize)
                .map(|(n, s)| (Bytes::copy_from_slice(n), *s))
                .collect()
        };

        prop_assert_eq!(set.query(seek_score, &seek_name, offset, limit), expect);
    }
}

fn reply_strategy() -> impl Strategy<Value = Reply> {
    let leaf = prop_oneof![
        Just(Reply::Nil),
        (any::<u32>(), prop::collection::vec(any::<u8>(), 0..16))
            .prop_map(|(code, m)| Reply::Err {
                code,
                message: Bytes::from(m),
            }),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(|b| Reply::Str(Bytes::from(b))),
        any::<i64>().prop_map(Reply::Int),
        any::<f64>()
            .prop_filter("NaN breaks value equality", |f| !f.is_nan())
            .prop_map(Reply::Dbl),
    ];
    leaf.prop_recursive(3, 48, 6, |inner| {
        prop::collection::vec(inner, 0..6).prop_map(Reply::Arr)
    })
}
