//! The Value Store
//!
//! One owning map from byte-string keys to typed entries, plus the TTL
//! heap. Lookup hashes the key bytes and equality is byte equality,
//! which is exactly the `HashMap<Bytes, Entry>` contract.
//!
//! Each entry is either a string or a sorted set; the variant determines
//! which payload is live. An entry with a TTL also records the index of
//! its slot in the expiry heap, and the heap keeps that index exact
//! through every sift (see [`crate::storage::expiry`]). The store is the
//! only module that touches both sides of that relationship, so all TTL
//! mutations go through it.
//!
//! The store is not thread-safe and does not need to be: it lives inside
//! the event loop's context and is only ever touched by the loop thread.

use crate::storage::expiry::{ExpiryHeap, HeapItem};
use crate::storage::zset::SortedSet;
use bytes::Bytes;
use std::collections::HashMap;

/// A stored value.
#[derive(Debug)]
pub enum Value {
    /// A binary-safe string.
    Str(Bytes),
    /// A sorted set of `(name, score)` pairs.
    ZSet(SortedSet),
}

/// One stored key's value cell.
#[derive(Debug)]
pub struct Entry {
    pub value: Value,
    /// Index of this entry's slot in the TTL heap; `None` when the key
    /// has no TTL.
    pub heap_idx: Option<usize>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            heap_idx: None,
        }
    }
}

/// The key-value store.
#[derive(Debug, Default)]
pub struct Store {
    entries: HashMap<Bytes, Entry>,
    heap: ExpiryHeap,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &[u8]) -> Option<&Entry> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut Entry> {
        self.entries.get_mut(key)
    }

    /// Inserts a fresh entry with no TTL. The key must not be present;
    /// overwrite paths go through [`Store::get_mut`] so an existing TTL
    /// is preserved.
    pub fn insert(&mut self, key: Bytes, value: Value) {
        debug_assert!(!self.entries.contains_key(&key));
        self.entries.insert(key, Entry::new(value));
    }

    /// Removes an entry, detaching its TTL first. Returns the entry so
    /// the caller can decide how to destroy it.
    pub fn remove(&mut self, key: &[u8]) -> Option<Entry> {
        let heap_idx = self.entries.get(key)?.heap_idx;
        if let Some(idx) = heap_idx {
            let entries = &mut self.entries;
            self.heap.remove(idx, |k, slot| {
                if let Some(e) = entries.get_mut(k) {
                    e.heap_idx = Some(slot);
                }
            });
        }
        let mut entry = self.entries.remove(key)?;
        entry.heap_idx = None;
        Some(entry)
    }

    /// Sets or clears a key's TTL. A negative `ttl_ms` removes the TTL;
    /// a non-negative one schedules expiry at `now_ms + ttl_ms`. No-op
    /// when the key is absent.
    pub fn set_ttl(&mut self, key: &[u8], ttl_ms: i64, now_ms: u64) {
        let Some(entry) = self.entries.get(key) else {
            return;
        };
        let heap_idx = entry.heap_idx;
        if ttl_ms < 0 {
            if let Some(idx) = heap_idx {
                {
                    let entries = &mut self.entries;
                    self.heap.remove(idx, |k, slot| {
                        if let Some(e) = entries.get_mut(k) {
                            e.heap_idx = Some(slot);
                        }
                    });
                }
                if let Some(e) = self.entries.get_mut(key) {
                    e.heap_idx = None;
                }
            }
        } else {
            let Some(owned) = self.entries.get_key_value(key).map(|(k, _)| k.clone()) else {
                return;
            };
            let item = HeapItem {
                expires_at: now_ms.saturating_add(ttl_ms as u64),
                key: owned,
            };
            let entries = &mut self.entries;
            self.heap.upsert(heap_idx, item, |k, slot| {
                if let Some(e) = entries.get_mut(k) {
                    e.heap_idx = Some(slot);
                }
            });
        }
    }

    /// Remaining TTL in milliseconds: `-2` when the key is absent, `-1`
    /// when it has no TTL, otherwise the time left (zero once due).
    pub fn pttl(&self, key: &[u8], now_ms: u64) -> i64 {
        match self.entries.get(key) {
            None => -2,
            Some(entry) => match entry.heap_idx {
                None => -1,
                Some(idx) => {
                    let deadline = self.heap.deadline(idx);
                    deadline.saturating_sub(now_ms) as i64
                }
            },
        }
    }

    /// Absolute deadline of an entry's TTL, if it has one.
    pub fn deadline_of(&self, entry: &Entry) -> Option<u64> {
        entry.heap_idx.map(|idx| self.heap.deadline(idx))
    }

    /// Earliest TTL deadline across all keys.
    pub fn next_expiry(&self) -> Option<u64> {
        self.heap.peek().map(|item| item.expires_at)
    }

    /// Removes up to `budget` keys whose deadlines have passed, returning
    /// them for destruction. The budget bounds the stall when many keys
    /// expire in the same tick.
    pub fn expire_due(&mut self, now_ms: u64, budget: usize) -> Vec<(Bytes, Entry)> {
        let mut out = Vec::new();
        while out.len() < budget {
            let Some(top) = self.heap.peek() else {
                break;
            };
            if top.expires_at >= now_ms {
                break;
            }
            let key = top.key.clone();
            match self.remove(&key) {
                Some(entry) => out.push((key, entry)),
                None => break,
            }
        }
        out
    }

    /// All live keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &Bytes> + '_ {
        self.entries.keys()
    }

    /// All live entries, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &Entry)> + '_ {
        self.entries.iter()
    }

    #[cfg(test)]
    pub(crate) fn heap(&self) -> &ExpiryHeap {
        &self.heap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_backrefs(store: &Store) {
        for (i, item) in store.heap().slots().iter().enumerate() {
            let entry = store.get(&item.key).expect("heap key must be live");
            assert_eq!(entry.heap_idx, Some(i));
        }
    }

    #[test]
    fn test_insert_get_remove() {
        let mut store = Store::new();
        store.insert(Bytes::from("k"), Value::Str(Bytes::from("v")));
        match &store.get(b"k").unwrap().value {
            Value::Str(s) => assert_eq!(s, "v"),
            other => panic!("unexpected value: {:?}", other),
        }
        assert!(store.remove(b"k").is_some());
        assert!(store.remove(b"k").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_ttl_set_update_clear() {
        let mut store = Store::new();
        store.insert(Bytes::from("k"), Value::Str(Bytes::from("v")));

        store.set_ttl(b"k", 1000, 0);
        assert_eq!(store.pttl(b"k", 100), 900);
        check_backrefs(&store);

        // in-place update
        store.set_ttl(b"k", 5000, 100);
        assert_eq!(store.pttl(b"k", 100), 5000);
        check_backrefs(&store);

        // negative ttl clears
        store.set_ttl(b"k", -1, 200);
        assert_eq!(store.pttl(b"k", 200), -1);
        assert!(store.heap().is_empty());
    }

    #[test]
    fn test_pttl_missing_key() {
        let store = Store::new();
        assert_eq!(store.pttl(b"nope", 0), -2);
    }

    #[test]
    fn test_pttl_overdue_clamps_to_zero() {
        let mut store = Store::new();
        store.insert(Bytes::from("k"), Value::Str(Bytes::from("v")));
        store.set_ttl(b"k", 10, 0);
        assert_eq!(store.pttl(b"k", 500), 0);
    }

    #[test]
    fn test_remove_detaches_ttl() {
        let mut store = Store::new();
        for i in 0..10u32 {
            let key = Bytes::from(format!("k{}", i));
            store.insert(key.clone(), Value::Str(Bytes::from("v")));
            store.set_ttl(&key, 1000 + i as i64, 0);
        }
        store.remove(b"k4");
        assert_eq!(store.heap().len(), 9);
        check_backrefs(&store);
    }

    #[test]
    fn test_expire_due_respects_budget() {
        let mut store = Store::new();
        for i in 0..50u32 {
            let key = Bytes::from(format!("k{}", i));
            store.insert(key.clone(), Value::Str(Bytes::from("v")));
            store.set_ttl(&key, i as i64, 0);
        }
        let first = store.expire_due(1000, 30);
        assert_eq!(first.len(), 30);
        assert_eq!(store.len(), 20);
        check_backrefs(&store);

        let rest = store.expire_due(1000, 30);
        assert_eq!(rest.len(), 20);
        assert!(store.is_empty());
    }

    #[test]
    fn test_expire_due_only_past_deadlines() {
        let mut store = Store::new();
        store.insert(Bytes::from("soon"), Value::Str(Bytes::from("v")));
        store.insert(Bytes::from("later"), Value::Str(Bytes::from("v")));
        store.set_ttl(b"soon", 10, 0);
        store.set_ttl(b"later", 10_000, 0);

        let expired = store.expire_due(100, 2000);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, Bytes::from("soon"));
        assert!(store.get(b"later").is_some());
        assert_eq!(store.next_expiry(), Some(10_000));
    }

    #[test]
    fn test_zset_value() {
        let mut store = Store::new();
        store.insert(Bytes::from("z"), Value::ZSet(SortedSet::new()));
        match &mut store.get_mut(b"z").unwrap().value {
            Value::ZSet(set) => {
                assert!(set.insert(Bytes::from("a"), 1.0));
            }
            other => panic!("unexpected value: {:?}", other),
        }
    }
}
