//! File-based storage implementation for native platforms.

use super::{BoxFuture, Storage, StorageError, StorageResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File-based storage for native platforms.
///
/// Each key is one `<encoded key>.json` file in the base directory. Bytes
/// outside `[A-Za-z0-9_-]` are percent-encoded, so every key maps to a
/// distinct file name and [`Storage::keys`] returns the original keys.
#[derive(Debug)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new file storage with the given base directory.
    ///
    /// Creates the directory if it doesn't exist.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create storage directory: {}", e))
            })?;
        }
        Ok(Self { base_path })
    }

    /// Create file storage in the default location.
    ///
    /// On Unix: `~/.local/share/layers-editor/drafts/`
    /// On Windows: `%LOCALAPPDATA%\layers-editor\drafts\`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Unavailable("Could not determine home directory".to_string()))?;

        Self::new(base.join("layers-editor").join("drafts"))
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", encode_key(key)))
    }

    /// Get the base path.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

/// Inverse of [`encode_key`]. `None` for names this storage did not write.
fn decode_key(name: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(name.len());
    let mut rest = name.as_bytes();
    while let Some((&first, tail)) = rest.split_first() {
        if first == b'%' {
            let hex = std::str::from_utf8(tail.get(..2)?).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
            rest = &tail[2..];
        } else {
            bytes.push(first);
            rest = tail;
        }
    }
    String::from_utf8(bytes).ok()
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> BoxFuture<'_, StorageResult<Option<String>>> {
        let path = self.entry_path(key);
        Box::pin(async move {
            match fs::read_to_string(&path) {
                Ok(text) => Ok(Some(text)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(StorageError::Io(format!("Failed to read {}: {}", path.display(), e))),
            }
        })
    }

    fn set(&self, key: &str, value: &str) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.entry_path(key);
        let value = value.to_string();
        Box::pin(async move {
            // Write next to the target and rename, so a crash mid-write
            // leaves the previous draft intact.
            let partial = path.with_extension("json.partial");
            fs::write(&partial, value)
                .and_then(|()| fs::rename(&partial, &path))
                .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", path.display(), e)))
        })
    }

    fn remove(&self, key: &str) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.entry_path(key);
        Box::pin(async move {
            match fs::remove_file(&path) {
                Err(e) if e.kind() != ErrorKind::NotFound => {
                    Err(StorageError::Io(format!("Failed to delete {}: {}", path.display(), e)))
                }
                _ => Ok(()),
            }
        })
    }

    fn keys(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        let base = self.base_path.clone();
        Box::pin(async move {
            if !base.exists() {
                return Ok(vec![]);
            }
            let entries = fs::read_dir(&base)
                .map_err(|e| StorageError::Io(format!("Failed to read directory: {}", e)))?;

            let mut keys = Vec::new();
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|e| e == "json") {
                    if let Some(key) = path.file_stem().and_then(|s| s.to_str()).and_then(decode_key) {
                        keys.push(key);
                    }
                }
            }
            keys.sort();
            Ok(keys)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::block_on;
    use tempfile::tempdir;

    #[test]
    fn test_file_storage_set_get() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();

        block_on(storage.set("layers-draft-42-default", "{\"version\":1}")).unwrap();
        let value = block_on(storage.get("layers-draft-42-default")).unwrap();
        assert_eq!(value.as_deref(), Some("{\"version\":1}"));
    }

    #[test]
    fn test_file_storage_missing_key() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(block_on(storage.get("nope")).unwrap(), None);
        assert!(!block_on(storage.exists("nope")).unwrap());
    }

    #[test]
    fn test_file_storage_keys_and_remove() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();

        block_on(storage.set("b", "2")).unwrap();
        block_on(storage.set("a", "1")).unwrap();
        assert_eq!(block_on(storage.keys()).unwrap(), vec!["a", "b"]);

        block_on(storage.remove("a")).unwrap();
        block_on(storage.remove("a")).unwrap();
        assert_eq!(block_on(storage.keys()).unwrap(), vec!["b"]);
    }

    #[test]
    fn test_file_storage_encodes_keys() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        block_on(storage.set("../escape/attempt", "x")).unwrap();
        assert!(dir.path().join("%2E%2E%2Fescape%2Fattempt.json").exists());

        block_on(storage.set("layers-draft-File:Ä.png-default", "y")).unwrap();
        let keys = block_on(storage.keys()).unwrap();
        assert!(keys.contains(&"../escape/attempt".to_string()));
        assert!(keys.contains(&"layers-draft-File:Ä.png-default".to_string()));
        assert_eq!(
            block_on(storage.get("layers-draft-File:Ä.png-default")).unwrap().as_deref(),
            Some("y")
        );
    }

    #[test]
    fn test_decode_rejects_foreign_names() {
        assert_eq!(decode_key("abc%2"), None);
        assert_eq!(decode_key("abc%zz"), None);
        assert_eq!(decode_key("plain"), Some("plain".to_string()));
    }
}
