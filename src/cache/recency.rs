// src/cache/recency.rs

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::errors::{FetchdagError, Result};

/// A cached value with its opaque metadata and recency links.
pub struct CacheEntry<K, V, M> {
    key: K,
    value: V,
    metadata: Option<M>,
    /// Towards the head (more recently used).
    prev: Option<usize>,
    /// Towards the tail (less recently used).
    next: Option<usize>,
}

impl<K, V, M> CacheEntry<K, V, M> {
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    /// Metadata attached at insertion time. Never interpreted by the cache.
    pub fn metadata(&self) -> Option<&M> {
        self.metadata.as_ref()
    }
}

impl<K: fmt::Debug, V: fmt::Debug, M: fmt::Debug> fmt::Debug for CacheEntry<K, V, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Fixed-capacity cache that evicts the least recently used entry.
///
/// Invariants:
/// - `index.len()` equals the number of entries reachable from `head`;
/// - `head` and `tail` are both `None` exactly when the cache is empty;
/// - `len() <= capacity()` after every public operation.
///
/// A capacity of zero disables caching: `add` becomes a no-op.
pub struct RecencyCache<K, V, M = ()> {
    capacity: usize,
    slots: Vec<Option<CacheEntry<K, V, M>>>,
    free: Vec<usize>,
    index: HashMap<K, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<K, V, M> RecencyCache<K, V, M>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
        }
    }

    /// Construct from a signed capacity, as read from configuration.
    pub fn try_new(capacity: i64) -> Result<Self> {
        let capacity = usize::try_from(capacity).map_err(|_| {
            FetchdagError::CacheConfig(format!(
                "capacity must be a non-negative integer (got {capacity})"
            ))
        })?;
        Ok(Self::new(capacity))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Membership test. Does not touch recency order.
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    /// Read a value and promote its entry to most recently used.
    ///
    /// A miss leaves the order untouched.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.index.get(key)?;
        self.unlink(idx);
        self.push_front(idx);
        self.node(idx).map(|entry| &entry.value)
    }

    /// Read a value without promoting it.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.index.get(key)?;
        self.node(idx).map(|entry| &entry.value)
    }

    /// Insert (or replace) `key` at the head, evicting the tail on overflow.
    pub fn add(&mut self, key: K, value: V, metadata: Option<M>) {
        if self.capacity == 0 {
            return;
        }

        if let Some(idx) = self.index.remove(&key) {
            self.unlink(idx);
            self.release(idx);
        }

        let idx = self.alloc(CacheEntry {
            key: key.clone(),
            value,
            metadata,
            prev: None,
            next: None,
        });
        self.push_front(idx);
        self.index.insert(key, idx);

        // At most one entry past the limit per insertion.
        if self.index.len() > self.capacity {
            if let Some(tail) = self.tail {
                self.unlink(tail);
                if let Some(evicted) = self.release(tail) {
                    self.index.remove(&evicted.key);
                }
            }
        }
    }

    /// Remove `key` wherever it sits in the recency chain.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.index.remove(key)?;
        self.unlink(idx);
        self.release(idx).map(|entry| entry.value)
    }

    pub fn clear(&mut self) {
        self.slots = Vec::new();
        self.free = Vec::new();
        self.index = HashMap::new();
        self.head = None;
        self.tail = None;
    }

    /// First entry, scanning from most to least recently used, for which
    /// `predicate` holds. Does not promote the entry found.
    pub fn find<P>(&self, mut predicate: P) -> Option<&CacheEntry<K, V, M>>
    where
        P: FnMut(&CacheEntry<K, V, M>) -> bool,
    {
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let entry = self.node(idx)?;
            cursor = entry.next;
            if predicate(entry) {
                return Some(entry);
            }
        }
        None
    }

    /// Entries from most to least recently used.
    pub fn iter(&self) -> Iter<'_, K, V, M> {
        Iter {
            cache: self,
            cursor: self.head,
        }
    }

    fn node(&self, idx: usize) -> Option<&CacheEntry<K, V, M>> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, idx: usize) -> Option<&mut CacheEntry<K, V, M>> {
        self.slots.get_mut(idx).and_then(Option::as_mut)
    }

    fn alloc(&mut self, entry: CacheEntry<K, V, M>) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(entry);
                idx
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, idx: usize) -> Option<CacheEntry<K, V, M>> {
        let entry = self.slots.get_mut(idx)?.take()?;
        self.free.push(idx);
        Some(entry)
    }

    fn unlink(&mut self, idx: usize) {
        let Some((prev, next)) = self.node(idx).map(|n| (n.prev, n.next)) else {
            return;
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.node_mut(p) {
                    node.next = next;
                }
            }
            None => self.head = next,
        }

        match next {
            Some(n) => {
                if let Some(node) = self.node_mut(n) {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.node_mut(idx) {
            node.prev = None;
            node.next = None;
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;

        if let Some(node) = self.node_mut(idx) {
            node.prev = None;
            node.next = old_head;
        }

        match old_head {
            Some(h) => {
                if let Some(node) = self.node_mut(h) {
                    node.prev = Some(idx);
                }
            }
            None => self.tail = Some(idx),
        }

        self.head = Some(idx);
    }
}

impl<K, V, M> fmt::Debug for RecencyCache<K, V, M>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecencyCache")
            .field("capacity", &self.capacity)
            .field("keys", &self.iter().map(CacheEntry::key).collect::<Vec<_>>())
            .finish()
    }
}

/// Iterator over cache entries, most recently used first.
pub struct Iter<'a, K, V, M> {
    cache: &'a RecencyCache<K, V, M>,
    cursor: Option<usize>,
}

impl<'a, K, V, M> Iterator for Iter<'a, K, V, M>
where
    K: Eq + Hash + Clone,
{
    type Item = &'a CacheEntry<K, V, M>;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cursor?;
        let entry = self.cache.node(idx)?;
        self.cursor = entry.next;
        Some(entry)
    }
}
