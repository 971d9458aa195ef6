//! Append-only, deduplicating result collection.
//!
//! A `ResultStore` pairs the records seen so far with the set of keys already
//! accepted. Both live behind one mutex so "is this new?" and "append it" are
//! a single step. The lock is only ever held for the check and the push; no
//! caller holds it across I/O.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct Inner<K, T> {
    seen: HashSet<K>,
    records: Vec<T>,
}

/// Thread-safe, insertion-ordered store keyed by `K`.
pub struct ResultStore<K, T> {
    inner: Mutex<Inner<K, T>>,
}

impl<K, T> ResultStore<K, T>
where
    K: Eq + Hash,
    T: Clone,
{
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                seen: HashSet::new(),
                records: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, T>> {
        // A panicking writer cannot leave the set and vec out of step: the
        // only mutation is insert-then-push with nothing fallible between.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `record` unless `key` was already accepted.
    ///
    /// Returns `true` when the record was stored. The first record for a key
    /// wins; later ones are dropped.
    pub fn insert(&self, key: K, record: T) -> bool {
        let mut inner = self.lock();
        if !inner.seen.insert(key) {
            return false;
        }
        inner.records.push(record);
        true
    }

    /// Whether `key` has been accepted.
    pub fn contains(&self, key: &K) -> bool {
        self.lock().seen.contains(key)
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the records in insertion order.
    pub fn snapshot(&self) -> Vec<T> {
        self.lock().records.clone()
    }
}

impl<K, T> Default for ResultStore<K, T>
where
    K: Eq + Hash,
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
