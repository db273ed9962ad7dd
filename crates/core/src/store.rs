//! Keyed entity storage.
//!
//! Concurrency policy for [`InMemoryStore`]: every mutation takes the single
//! write guard, so mutations are totally ordered. [`EntityStore::update`] runs
//! its read-merge-write under one guard, which linearizes concurrent updates
//! and deletes of the same id. Reads clone a snapshot under the read guard.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::entity::Entity;

/// Identifier-keyed store abstraction.
pub trait EntityStore<V>: Send + Sync {
    fn get(&self, id: &str) -> Option<V>;

    /// Snapshot of every entity. Order is unspecified.
    fn list(&self) -> Vec<V>;

    /// Insert or overwrite.
    fn put(&self, id: String, value: V);

    /// Store an entity under its own id.
    fn insert(&self, value: V)
    where
        V: Entity,
    {
        self.put(value.id().to_string(), value)
    }

    /// Remove an entity. Returns whether it existed.
    fn delete(&self, id: &str) -> bool;

    /// Atomically replace an existing entity with `f(current)`.
    ///
    /// Returns the stored result, or `None` when `id` is absent (in which case
    /// `f` is not called).
    fn update(&self, id: &str, f: &mut dyn FnMut(&V) -> V) -> Option<V>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V, S> EntityStore<V> for Arc<S>
where
    S: EntityStore<V> + ?Sized,
{
    fn get(&self, id: &str) -> Option<V> {
        (**self).get(id)
    }

    fn list(&self) -> Vec<V> {
        (**self).list()
    }

    fn put(&self, id: String, value: V) {
        (**self).put(id, value)
    }

    fn delete(&self, id: &str) -> bool {
        (**self).delete(id)
    }

    fn update(&self, id: &str, f: &mut dyn FnMut(&V) -> V) -> Option<V> {
        (**self).update(id, f)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

/// Process-lifetime store backed by a `HashMap`.
///
/// Nothing is persisted; contents are lost when the store is dropped.
#[derive(Debug)]
pub struct InMemoryStore<V> {
    inner: RwLock<HashMap<String, V>>,
}

impl<V> InMemoryStore<V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<V> Default for InMemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> EntityStore<V> for InMemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, id: &str) -> Option<V> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(id).cloned()
    }

    fn list(&self) -> Vec<V> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.values().cloned().collect()
    }

    fn put(&self, id: String, value: V) {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(id, value);
    }

    fn delete(&self, id: &str) -> bool {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.remove(id).is_some()
    }

    fn update(&self, id: &str, f: &mut dyn FnMut(&V) -> V) -> Option<V> {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let slot = map.get_mut(id)?;
        let next = f(slot);
        *slot = next.clone();
        Some(next)
    }

    fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
