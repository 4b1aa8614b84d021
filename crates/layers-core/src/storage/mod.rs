//! Key/value storage for drafts.

mod memory;

#[cfg(not(target_arch = "wasm32"))]
mod file;

#[cfg(target_arch = "wasm32")]
mod local;

pub use memory::MemoryStorage;

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStorage;

#[cfg(target_arch = "wasm32")]
pub use local::LocalStorage;

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Key not found: {0}")]
    NotFound(String),
    #[error("Storage quota exceeded writing {0}")]
    QuotaExceeded(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async operations (compatible with WASM).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// String key/value store.
///
/// Backends are quota-limited and may be missing entirely (private browsing,
/// disabled storage), so every operation can fail. Sessions are
/// single-threaded; no `Send` bound is required.
pub trait Storage {
    /// Read a value. Missing keys are `Ok(None)`.
    fn get(&self, key: &str) -> BoxFuture<'_, StorageResult<Option<String>>>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// Delete a value. Deleting a missing key succeeds.
    fn remove(&self, key: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// All stored keys.
    fn keys(&self) -> BoxFuture<'_, StorageResult<Vec<String>>>;

    /// Check if a key exists.
    fn exists(&self, key: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let read = self.get(key);
        Box::pin(async move { Ok(read.await?.is_some()) })
    }
}

/// Create the platform's persistent storage.
#[cfg(not(target_arch = "wasm32"))]
pub fn create_default_storage() -> StorageResult<FileStorage> {
    FileStorage::default_location()
}

#[cfg(target_arch = "wasm32")]
pub fn create_default_storage() -> StorageResult<LocalStorage> {
    LocalStorage::new()
}

/// Platform-specific persistent storage.
#[cfg(not(target_arch = "wasm32"))]
pub type PlatformStorage = FileStorage;

#[cfg(target_arch = "wasm32")]
pub type PlatformStorage = LocalStorage;
