//! Durable state storage
//!
//! The dialog manager loads `user`, `conversation` and dialog-stack state
//! before each turn and writes it back afterwards through [`Storage`].
//! Writes carry the version they were read at; a backend rejects the whole
//! batch when any key has moved on.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::StorageError;

/// A stored value and its version
#[derive(Debug, Clone, PartialEq)]
pub struct StoreItem {
    pub value: Value,
    /// Incremented on every successful write, starting at 1
    pub version: u64,
}

/// One key of a write batch
#[derive(Debug, Clone, PartialEq)]
pub struct StorageWrite {
    pub key: String,
    pub value: Value,
    /// Version the value was read at; `None` skips the check, `Some(0)` means absent
    pub expected_version: Option<u64>,
}

impl StorageWrite {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
            expected_version: None,
        }
    }

    pub fn expecting(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Key-value backend for durable memory scopes
#[async_trait]
pub trait Storage: Send + Sync {
    /// Items for the keys that exist
    async fn read(&self, keys: &[String]) -> Result<HashMap<String, StoreItem>, StorageError>;

    /// Apply a batch atomically
    async fn write(&self, changes: Vec<StorageWrite>) -> Result<(), StorageError>;

    async fn delete(&self, keys: &[String]) -> Result<(), StorageError>;
}

/// Process-local storage
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Arc<RwLock<HashMap<String, StoreItem>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read(&self, keys: &[String]) -> Result<HashMap<String, StoreItem>, StorageError> {
        let items = self.items.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| items.get(key).map(|item| (key.clone(), item.clone())))
            .collect())
    }

    async fn write(&self, changes: Vec<StorageWrite>) -> Result<(), StorageError> {
        let mut items = self.items.write().await;
        for change in &changes {
            let Some(expected) = change.expected_version else {
                continue;
            };
            let actual = items.get(&change.key).map_or(0, |item| item.version);
            if actual != expected {
                return Err(StorageError::Conflict {
                    key: change.key.clone(),
                    expected,
                    actual,
                });
            }
        }
        for change in changes {
            let version = items.get(&change.key).map_or(0, |item| item.version) + 1;
            debug!(key = %change.key, version, "storage write");
            items.insert(
                change.key,
                StoreItem {
                    value: change.value,
                    version,
                },
            );
        }
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), StorageError> {
        let mut items = self.items.write().await;
        for key in keys {
            items.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_versioned_writes() {
        let storage = MemoryStorage::new();
        storage
            .write(vec![StorageWrite::new("a", json!(1)).expecting(0)])
            .await
            .unwrap();
        let read = storage.read(&["a".into(), "b".into()]).await.unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read["a"].version, 1);

        let err = storage
            .write(vec![StorageWrite::new("a", json!(2)).expecting(0)])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StorageError::Conflict {
                key: "a".into(),
                expected: 0,
                actual: 1
            }
        );

        storage
            .write(vec![StorageWrite::new("a", json!(2)).expecting(1)])
            .await
            .unwrap();
        assert_eq!(storage.read(&["a".into()]).await.unwrap()["a"].value, json!(2));
    }

    #[tokio::test]
    async fn test_conflicting_batch_writes_nothing() {
        let storage = MemoryStorage::new();
        storage.write(vec![StorageWrite::new("a", json!(1))]).await.unwrap();
        let result = storage
            .write(vec![
                StorageWrite::new("b", json!(true)),
                StorageWrite::new("a", json!(5)).expecting(7),
            ])
            .await;
        assert!(result.is_err());
        assert_eq!(storage.len().await, 1);

        storage.delete(&["a".into()]).await.unwrap();
        assert!(storage.is_empty().await);
    }
}
