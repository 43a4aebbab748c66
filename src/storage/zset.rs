//! Sorted Sets
//!
//! A sorted set maps member names to scores and keeps the members ordered
//! by `(score ascending, name ascending)` for range queries. Two indexes
//! back it:
//!
//! - `by_name`: name → score, for O(1) membership and score lookup
//! - `by_score`: an ordered set of `(score, name)` pairs, for seeks
//!
//! Scores are IEEE-754 doubles ordered with `total_cmp`. NaN never reaches
//! this module (the codec boundary rejects it), so the total order and
//! the IEEE order agree on every stored score.

use bytes::Bytes;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

/// A totally-ordered `f64` usable as a `BTreeSet` key.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Score(f64);

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// A set of `(name, score)` pairs with ordered range queries.
#[derive(Debug, Default)]
pub struct SortedSet {
    by_name: HashMap<Bytes, f64>,
    by_score: BTreeSet<(Score, Bytes)>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Inserts a member or updates its score.
    ///
    /// Returns `true` when the member was newly added, `false` when an
    /// existing member's score was updated.
    pub fn insert(&mut self, name: Bytes, score: f64) -> bool {
        match self.by_name.get(&name) {
            Some(&old) => {
                if old != score {
                    self.by_score.remove(&(Score(old), name.clone()));
                    self.by_score.insert((Score(score), name.clone()));
                    self.by_name.insert(name, score);
                }
                false
            }
            None => {
                self.by_score.insert((Score(score), name.clone()));
                self.by_name.insert(name, score);
                true
            }
        }
    }

    /// Score of a member, if present.
    pub fn score(&self, name: &[u8]) -> Option<f64> {
        self.by_name.get(name).copied()
    }

    /// Removes a member. Returns `true` if it was present.
    pub fn remove(&mut self, name: &[u8]) -> bool {
        match self.by_name.remove_entry(name) {
            Some((owned, score)) => {
                self.by_score.remove(&(Score(score), owned));
                true
            }
            None => false,
        }
    }

    /// Range query: seek to the first pair `>= (score, name)`, step
    /// `offset` ranks (may be negative), then emit up to `limit` pairs in
    /// `(score, name)` ascending order.
    ///
    /// A `limit <= 0` or an offset landing outside the set yields an empty
    /// result.
    pub fn query(&self, score: f64, name: &[u8], offset: i64, limit: i64) -> Vec<(Bytes, f64)> {
        if limit <= 0 {
            return Vec::new();
        }
        let bound = (Score(score), Bytes::copy_from_slice(name));
        let rank = self.by_score.range(..bound).count() as i64;
        let start = rank + offset;
        if start < 0 || start as usize >= self.by_score.len() {
            return Vec::new();
        }
        self.by_score
            .iter()
            .skip(start as usize)
            .take(limit as usize)
            .map(|(s, n)| (n.clone(), s.0))
            .collect()
    }

    /// Members in `(score, name)` ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, f64)> + '_ {
        self.by_score.iter().map(|(s, n)| (n, s.0))
    }
}
