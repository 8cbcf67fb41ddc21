//! Merge and dedup engine
//!
//! [`ItemSet`] is the canonical ordered item collection. It can only change
//! through its two merge entry points, both of which keep the identity
//! invariant (no two items with the same `(channel_id, message_id)`) and are
//! idempotent.

use feed_client::{FeedItem, ItemKey};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet, VecDeque};

/// Result of merging a live item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveMerge {
    /// The item was not present and is now first in the set
    Inserted,
    /// An item with the same key was replaced at its current position
    Replaced,
}

impl LiveMerge {
    /// Check if the item was newly introduced
    pub fn is_new(&self) -> bool {
        matches!(self, LiveMerge::Inserted)
    }
}

/// Ordered, deduplicated feed items
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemSet {
    items: VecDeque<FeedItem>,
    keys: HashSet<ItemKey>,
}

impl ItemSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a page of history
    ///
    /// With `is_refresh` the set is replaced by `new_items`, deduplicated
    /// (last occurrence wins) and sorted newest first. Otherwise items whose
    /// key is absent are appended in server order; items already present are
    /// left untouched.
    ///
    /// Returns the number of items in the set that came from this batch.
    pub fn merge_history_batch(&mut self, new_items: Vec<FeedItem>, is_refresh: bool) -> usize {
        if is_refresh {
            self.replace_all(new_items)
        } else {
            self.append_absent(new_items)
        }
    }

    /// Merge one live item
    ///
    /// A known key is replaced in place; an unknown one is prepended,
    /// whatever its timestamp.
    pub fn merge_live_item(&mut self, item: FeedItem) -> LiveMerge {
        let key = item.key();

        if self.keys.contains(&key) {
            if let Some(existing) = self.items.iter_mut().find(|existing| existing.key() == key) {
                *existing = item;
            }
            LiveMerge::Replaced
        } else {
            self.keys.insert(key);
            self.items.push_front(item);
            LiveMerge::Inserted
        }
    }

    fn replace_all(&mut self, new_items: Vec<FeedItem>) -> usize {
        let mut positions: HashMap<ItemKey, usize> = HashMap::with_capacity(new_items.len());
        let mut deduped: Vec<FeedItem> = Vec::with_capacity(new_items.len());

        for item in new_items {
            match positions.entry(item.key()) {
                Entry::Occupied(slot) => deduped[*slot.get()] = item,
                Entry::Vacant(slot) => {
                    slot.insert(deduped.len());
                    deduped.push(item);
                }
            }
        }

        // Ties on timestamp fall back to the key so the order is total
        deduped.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.key().cmp(&a.key()))
        });

        self.keys = positions.into_keys().collect();
        self.items = deduped.into();
        self.items.len()
    }

    fn append_absent(&mut self, new_items: Vec<FeedItem>) -> usize {
        let start = self.items.len();
        let mut appended: HashMap<ItemKey, usize> = HashMap::new();

        for item in new_items {
            let key = item.key();

            if let Some(&index) = appended.get(&key) {
                self.items[index] = item;
            } else if self.keys.insert(key) {
                appended.insert(key, self.items.len());
                self.items.push_back(item);
            }
        }

        self.items.len() - start
    }

    /// Remove every item
    pub fn clear(&mut self) {
        self.items.clear();
        self.keys.clear();
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Check if an item with this key is present
    pub fn contains(&self, key: &ItemKey) -> bool {
        self.keys.contains(key)
    }

    /// Item with this key
    pub fn get(&self, key: &ItemKey) -> Option<&FeedItem> {
        if !self.keys.contains(key) {
            return None;
        }
        self.items.iter().find(|item| item.key() == *key)
    }

    /// Position of the item with this key
    pub fn position(&self, key: &ItemKey) -> Option<usize> {
        if !self.keys.contains(key) {
            return None;
        }
        self.items.iter().position(|item| item.key() == *key)
    }

    /// First (most recent) item
    pub fn first(&self) -> Option<&FeedItem> {
        self.items.front()
    }

    /// Iterate in display order
    pub fn iter(&self) -> impl Iterator<Item = &FeedItem> {
        self.items.iter()
    }

    /// Copy of the items in display order
    pub fn to_vec(&self) -> Vec<FeedItem> {
        self.items.iter().cloned().collect()
    }
}
