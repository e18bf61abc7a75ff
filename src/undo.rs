//! Undo buffer
//!
//! Recently removed items, held for a fixed retention window so a removal can
//! be undone. Entries older than the window are dropped lazily whenever the
//! buffer is touched; nothing sweeps it in the background.

use std::collections::VecDeque;

use jiff::{SignedDuration, Timestamp};

use crate::items::{CartItem, ItemId};

/// Default retention window for removed items.
pub const DEFAULT_RETENTION: SignedDuration = SignedDuration::from_mins(5);

/// Default number of entries kept.
pub const DEFAULT_CAPACITY: usize = 20;

/// A removed item and when it was removed.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentlyRemoved {
    /// Snapshot of the item at removal time
    pub item: CartItem,

    /// Removal instant
    pub removed_at: Timestamp,
}

/// Bounded ring buffer of removed items ordered by removal time.
#[derive(Debug, Clone)]
pub struct UndoBuffer {
    entries: VecDeque<RecentlyRemoved>,
    capacity: usize,
    retention: SignedDuration,
}

impl UndoBuffer {
    /// Creates an empty buffer. A capacity of zero is treated as one.
    pub fn new(capacity: usize, retention: SignedDuration) -> Self {
        let capacity = capacity.max(1);

        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            retention,
        }
    }

    /// Records a removal, evicting the oldest entry when full.
    pub fn push(&mut self, item: CartItem, now: Timestamp) {
        self.evict_expired(now);

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }

        self.entries.push_back(RecentlyRemoved {
            item,
            removed_at: now,
        });
    }

    /// Removes and returns the item with `id` if it is still inside the window.
    pub fn take(&mut self, id: &ItemId, now: Timestamp) -> Option<CartItem> {
        self.evict_expired(now);

        let position = self.entries.iter().position(|entry| &entry.item.id == id)?;

        self.entries.remove(position).map(|entry| entry.item)
    }

    /// Live entries, oldest first.
    pub fn entries(&mut self, now: Timestamp) -> impl Iterator<Item = &RecentlyRemoved> {
        self.evict_expired(now);
        self.entries.iter()
    }

    /// Number of stored entries, including any not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_expired(&mut self, now: Timestamp) {
        let retention = self.retention;

        self.entries
            .retain(|entry| now.duration_since(entry.removed_at) < retention);
    }
}

impl Default for UndoBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_RETENTION)
    }
}
