//! Storage Module
//!
//! The value store for EmberKV: a single owning map from byte-string keys
//! to typed entries, a sorted-set value type, and the TTL machinery.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                         Store                            │
//! │                                                          │
//! │  HashMap<Bytes, Entry>        ExpiryHeap                 │
//! │  ┌───────────────────┐        ┌──────────────────────┐   │
//! │  │ key → Entry       │◄──────►│ (expires_at, key)    │   │
//! │  │   value: Str/ZSet │ heap_  │ min-heap, slot-moved │   │
//! │  │   heap_idx        │  idx   │ callback             │   │
//! │  └───────────────────┘        └──────────────────────┘   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Every entry with a TTL holds the index of its heap slot, and the heap
//! reports slot moves back so the index stays exact through every sift.
//! That pairing is what makes TTL updates O(log n) without a scan.
//!
//! The store is single-threaded by design: it is owned by the event loop
//! and never crosses a thread boundary. Only fully-removed entries are
//! handed to the worker pool, for destruction.

pub mod engine;
pub mod expiry;
pub mod zset;

pub use engine::{Entry, Store, Value};
pub use expiry::{ExpiryHeap, HeapItem};
pub use zset::SortedSet;
