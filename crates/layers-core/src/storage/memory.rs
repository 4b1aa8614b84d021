//! In-memory storage implementation.

use super::{BoxFuture, Storage, StorageError, StorageResult};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// In-memory storage for testing and ephemeral use.
///
/// Can emulate a byte quota and an unavailable backend.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<HashMap<String, String>>,
    quota: Option<usize>,
    unavailable: Cell<bool>,
    writes: Cell<usize>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that rejects writes once keys plus values exceed `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota: Some(bytes),
            ..Self::default()
        }
    }

    /// Make every operation fail with `Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.unavailable.set(!available);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    /// Synchronous read, for assertions.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    /// Synchronous write, bypassing quota and counters.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.unavailable.get() {
            Err(StorageError::Unavailable("memory storage disabled".to_string()))
        } else {
            Ok(())
        }
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> BoxFuture<'_, StorageResult<Option<String>>> {
        let key = key.to_string();
        Box::pin(async move {
            self.check_available()?;
            Ok(self.entries.borrow().get(&key).cloned())
        })
    }

    fn set(&self, key: &str, value: &str) -> BoxFuture<'_, StorageResult<()>> {
        let key = key.to_string();
        let value = value.to_string();
        Box::pin(async move {
            self.check_available()?;
            if let Some(quota) = self.quota {
                if self.used_bytes_without(&key) + key.len() + value.len() > quota {
                    return Err(StorageError::QuotaExceeded(key));
                }
            }
            self.entries.borrow_mut().insert(key, value);
            self.writes.set(self.writes.get() + 1);
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> BoxFuture<'_, StorageResult<()>> {
        let key = key.to_string();
        Box::pin(async move {
            self.check_available()?;
            self.entries.borrow_mut().remove(&key);
            Ok(())
        })
    }

    fn keys(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.entries.borrow().keys().cloned().collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::block_on;

    #[test]
    fn test_memory_storage_set_get() {
        let storage = MemoryStorage::new();
        block_on(storage.set("a", "1")).unwrap();
        assert_eq!(block_on(storage.get("a")).unwrap(), Some("1".to_string()));
        assert!(block_on(storage.exists("a")).unwrap());
        assert_eq!(block_on(storage.get("b")).unwrap(), None);
        assert_eq!(storage.write_count(), 1);
    }

    #[test]
    fn test_memory_storage_remove() {
        let storage = MemoryStorage::new();
        block_on(storage.set("a", "1")).unwrap();
        block_on(storage.remove("a")).unwrap();
        block_on(storage.remove("missing")).unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_quota_rejects_oversized_write() {
        let storage = MemoryStorage::with_quota(10);
        block_on(storage.set("k", "12345")).unwrap();
        let err = block_on(storage.set("j", "123456789")).unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded(_)));
        // Overwriting the same key only counts the new value.
        block_on(storage.set("k", "123456789")).unwrap();
    }

    #[test]
    fn test_unavailable_storage_fails_everything() {
        let storage = MemoryStorage::new();
        storage.set_available(false);
        assert!(matches!(
            block_on(storage.get("a")),
            Err(StorageError::Unavailable(_))
        ));
        assert!(block_on(storage.set("a", "1")).is_err());
        assert!(block_on(storage.keys()).is_err());
    }
}
