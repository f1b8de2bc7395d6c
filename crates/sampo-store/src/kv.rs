//! The key/value collaborator and its in-memory implementation.
//!
//! The store offers single-key reads and writes only. There are no
//! transactions across keys; compound updates are sequenced by the caller
//! (see [`ProgressStore::reset_all`](crate::ProgressStore::reset_all)).

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::error::StoreError;

/// String-valued key/value storage scoped to one installation.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Read the value at `key`, or `None` if absent.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Write `value` at `key`.
    fn set(&self, key: &str, value: String) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Write-failure injection for [`MemoryStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum WriteFault {
    /// Writes succeed.
    #[default]
    None,
    /// Every write fails.
    Always,
    /// The given number of writes succeed, then every write fails.
    After(u32),
}

/// In-memory [`KeyValueStore`].
///
/// Clones share the same map, so a test can keep a handle while the
/// service owns another. Writes and deletes can be made to fail on demand
/// to exercise persistence-failure paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
    fault: Arc<Mutex<WriteFault>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (`true`) or succeed (`false`).
    pub async fn set_fail_writes(&self, fail: bool) {
        *self.fault.lock().await = if fail {
            WriteFault::Always
        } else {
            WriteFault::None
        };
    }

    /// Allow `writes` more writes, then fail every write after them.
    ///
    /// Simulates a process killed part-way through a compound update.
    pub async fn fail_after_writes(&self, writes: u32) {
        *self.fault.lock().await = WriteFault::After(writes);
    }

    /// Snapshot of every key and value, for inspection in tests.
    pub async fn dump(&self) -> BTreeMap<String, String> {
        self.entries.read().await.clone()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn admit_write(&self, key: &str) -> Result<(), StoreError> {
        let mut fault = self.fault.lock().await;
        match *fault {
            WriteFault::None => Ok(()),
            WriteFault::Always | WriteFault::After(0) => Err(StoreError::Unavailable(format!(
                "write to {key} rejected"
            ))),
            WriteFault::After(remaining) => {
                *fault = WriteFault::After(remaining.saturating_sub(1));
                Ok(())
            }
        }
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.admit_write(key).await?;
        self.entries.write().await.insert(key.to_owned(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.admit_write(key).await?;
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete() {
        let store = MemoryStore::new();
        assert!(store.get("a").await.unwrap().is_none());
        store.set("a", "1".to_owned()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        store.delete("a").await.unwrap();
        store.delete("a").await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn clones_share_entries() {
        let store = MemoryStore::new();
        let handle = store.clone();
        store.set("k", "v".to_owned()).await.unwrap();
        assert_eq!(handle.len().await, 1);
    }

    #[tokio::test]
    async fn failing_writes_leave_map_untouched() {
        let store = MemoryStore::new();
        store.set("k", "old".to_owned()).await.unwrap();
        store.set_fail_writes(true).await;
        assert!(store.set("k", "new".to_owned()).await.is_err());
        assert!(store.delete("k").await.is_err());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("old"));
        store.set_fail_writes(false).await;
        store.set("k", "new".to_owned()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn fail_after_counts_down() {
        let store = MemoryStore::new();
        store.fail_after_writes(2).await;
        store.set("a", "1".to_owned()).await.unwrap();
        store.set("b", "2".to_owned()).await.unwrap();
        assert!(store.set("c", "3".to_owned()).await.is_err());
        assert_eq!(store.len().await, 2);
    }
}
