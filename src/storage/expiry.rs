//! TTL Expiry Heap
//!
//! An array-backed min-heap of `(deadline, key)` pairs ordered by
//! deadline. The heap never owns entries; it holds the key of each entry
//! that has a TTL, and the entry holds the index of its heap slot.
//!
//! Keeping that pair of references consistent is the whole point of this
//! module: every operation that moves an item to a different slot invokes
//! a caller-supplied `moved` callback with the item's key and its new
//! slot, and the caller rewrites `Entry::heap_idx` accordingly. With the
//! back-pointer exact at all times, setting or clearing a TTL on an entry
//! that already has one is an O(log n) in-place heap update instead of a
//! scan.

use bytes::Bytes;

/// One TTL deadline.
#[derive(Debug, Clone)]
pub struct HeapItem {
    /// Monotonic milliseconds at which the key expires.
    pub expires_at: u64,
    /// Key of the owning entry.
    pub key: Bytes,
}

/// Min-heap over [`HeapItem`] by `expires_at`.
#[derive(Debug, Default)]
pub struct ExpiryHeap {
    items: Vec<HeapItem>,
}

impl ExpiryHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The earliest deadline, if any.
    pub fn peek(&self) -> Option<&HeapItem> {
        self.items.first()
    }

    /// Deadline of the item in slot `pos`.
    pub fn deadline(&self, pos: usize) -> u64 {
        self.items[pos].expires_at
    }

    #[cfg(test)]
    pub(crate) fn slots(&self) -> &[HeapItem] {
        &self.items
    }

    /// Updates the item in slot `pos`, or pushes a new item when `pos` is
    /// `None`, then restores heap order. `moved` is invoked for every item
    /// whose slot changes (including the final slot of the item itself).
    pub fn upsert(&mut self, pos: Option<usize>, item: HeapItem, mut moved: impl FnMut(&Bytes, usize)) {
        let pos = match pos {
            Some(p) => {
                self.items[p] = item;
                p
            }
            None => {
                self.items.push(item);
                self.items.len() - 1
            }
        };
        self.update(pos, &mut moved);
    }

    /// Removes and returns the item in slot `pos`, restoring heap order.
    ///
    /// The caller clears the removed entry's back-pointer; `moved` handles
    /// the item swapped into the vacated slot.
    pub fn remove(&mut self, pos: usize, mut moved: impl FnMut(&Bytes, usize)) -> HeapItem {
        let item = self.items.swap_remove(pos);
        if pos < self.items.len() {
            self.update(pos, &mut moved);
        }
        item
    }

    /// Sifts the item at `pos` toward its correct slot.
    fn update(&mut self, pos: usize, moved: &mut impl FnMut(&Bytes, usize)) {
        if pos > 0 && self.items[(pos - 1) / 2].expires_at > self.items[pos].expires_at {
            self.sift_up(pos, moved);
        } else {
            self.sift_down(pos, moved);
        }
    }

    fn sift_up(&mut self, mut pos: usize, moved: &mut impl FnMut(&Bytes, usize)) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.items[parent].expires_at <= self.items[pos].expires_at {
                break;
            }
            self.items.swap(pos, parent);
            moved(&self.items[pos].key, pos);
            pos = parent;
        }
        moved(&self.items[pos].key, pos);
    }

    fn sift_down(&mut self, mut pos: usize, moved: &mut impl FnMut(&Bytes, usize)) {
        loop {
            let left = pos * 2 + 1;
            let right = left + 1;
            let mut least = pos;
            if left < self.items.len() && self.items[left].expires_at < self.items[least].expires_at
            {
                least = left;
            }
            if right < self.items.len()
                && self.items[right].expires_at < self.items[least].expires_at
            {
                least = right;
            }
            if least == pos {
                break;
            }
            self.items.swap(pos, least);
            moved(&self.items[pos].key, pos);
            pos = least;
        }
        moved(&self.items[pos].key, pos);
    }
}
