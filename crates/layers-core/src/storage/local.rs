//! `localStorage` implementation for WebAssembly.

use super::{BoxFuture, Storage, StorageError, StorageResult};

/// Browser `localStorage`.
///
/// The handle is looked up on every call; a revoked handle surfaces as
/// `Unavailable`.
#[derive(Debug, Default)]
pub struct LocalStorage;

impl LocalStorage {
    /// Create a handle, failing if storage is not accessible right now.
    pub fn new() -> StorageResult<Self> {
        Self::handle()?;
        Ok(Self)
    }

    fn handle() -> StorageResult<web_sys::Storage> {
        let window = web_sys::window()
            .ok_or_else(|| StorageError::Unavailable("No window object".to_string()))?;
        window
            .local_storage()
            .map_err(|e| StorageError::Unavailable(format!("localStorage error: {:?}", e)))?
            .ok_or_else(|| StorageError::Unavailable("localStorage not available".to_string()))
    }
}

impl Storage for LocalStorage {
    fn get(&self, key: &str) -> BoxFuture<'_, StorageResult<Option<String>>> {
        let key = key.to_string();
        Box::pin(async move {
            Self::handle()?
                .get_item(&key)
                .map_err(|e| StorageError::Other(format!("Failed to read {}: {:?}", key, e)))
        })
    }

    fn set(&self, key: &str, value: &str) -> BoxFuture<'_, StorageResult<()>> {
        let key = key.to_string();
        let value = value.to_string();
        Box::pin(async move {
            // The only failure setItem reports is QuotaExceededError.
            Self::handle()?
                .set_item(&key, &value)
                .map_err(|_| StorageError::QuotaExceeded(key))
        })
    }

    fn remove(&self, key: &str) -> BoxFuture<'_, StorageResult<()>> {
        let key = key.to_string();
        Box::pin(async move {
            Self::handle()?
                .remove_item(&key)
                .map_err(|e| StorageError::Other(format!("Failed to delete {}: {:?}", key, e)))
        })
    }

    fn keys(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        Box::pin(async move {
            let storage = Self::handle()?;
            let len = storage
                .length()
                .map_err(|e| StorageError::Other(format!("Failed to list keys: {:?}", e)))?;
            let mut keys = Vec::with_capacity(len as usize);
            for index in 0..len {
                if let Ok(Some(key)) = storage.key(index) {
                    keys.push(key);
                }
            }
            Ok(keys)
        })
    }
}
