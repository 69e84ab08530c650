//! In-memory keyed stores
//!
//! Process-local state shared across requests. Stores are constructed at
//! startup and injected through application state, so their lifetime and
//! locking discipline are explicit rather than hidden in module globals.
//! None of them survive a restart, and a multi-instance deployment does not
//! share them; both are accepted limitations of this design.

mod customers;
mod jobs;
mod usage;

pub use customers::CustomerStore;
pub use jobs::JobStore;
pub use usage::UsageStore;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Generic keyed store over a `RwLock<HashMap>`.
///
/// Mutations go through [`MemoryStore::with_entry`], which holds the write
/// lock for the whole read-modify-write, so concurrent writers to the same
/// key cannot lose updates.
#[derive(Clone)]
pub struct MemoryStore<V> {
    inner: Arc<RwLock<HashMap<String, V>>>,
}

impl<V: Clone> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.inner.read().await.get(key).cloned()
    }

    pub async fn insert(&self, key: String, value: V) {
        self.inner.write().await.insert(key, value);
    }

    pub async fn remove(&self, key: &str) -> Option<V> {
        self.inner.write().await.remove(key)
    }

    /// Run a closure against the entry under the write lock, creating it
    /// with `default` if absent. Returns whatever the closure returns.
    pub async fn with_entry<R>(
        &self,
        key: &str,
        default: impl FnOnce() -> V,
        f: impl FnOnce(&mut V) -> R,
    ) -> R {
        let mut guard = self.inner.write().await;
        let entry = guard.entry(key.to_string()).or_insert_with(default);
        f(entry)
    }

    /// Run a closure against an existing entry under the write lock.
    /// Returns None if the key is absent.
    pub async fn with_existing<R>(&self, key: &str, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        let mut guard = self.inner.write().await;
        guard.get_mut(key).map(f)
    }

    /// Remove every entry the predicate rejects; returns the surviving count.
    pub async fn retain(&self, mut keep: impl FnMut(&str, &V) -> bool) -> usize {
        let mut guard = self.inner.write().await;
        guard.retain(|k, v| keep(k, v));
        guard.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

impl<V: Clone> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_entry_creates_and_mutates() {
        let store: MemoryStore<u64> = MemoryStore::new();
        let v = store.with_entry("a", || 0, |n| {
            *n += 5;
            *n
        }).await;
        assert_eq!(v, 5);
        assert_eq!(store.get("a").await, Some(5));
    }

    #[tokio::test]
    async fn test_with_existing_absent_key() {
        let store: MemoryStore<u64> = MemoryStore::new();
        assert!(store.with_existing("missing", |n| *n += 1).await.is_none());
    }

    #[tokio::test]
    async fn test_retain_prunes() {
        let store: MemoryStore<u64> = MemoryStore::new();
        store.insert("old".into(), 1).await;
        store.insert("new".into(), 2).await;
        let left = store.retain(|_, v| *v > 1).await;
        assert_eq!(left, 1);
        assert!(store.get("old").await.is_none());
        assert_eq!(store.get("new").await, Some(2));
    }

    #[tokio::test]
    async fn test_concurrent_increments_do_not_lose_updates() {
        let store: MemoryStore<u64> = MemoryStore::new();
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.with_entry("n", || 0, |n| *n += 1).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.get("n").await, Some(50));
    }
}
