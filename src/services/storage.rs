use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Local directory holding uploaded originals.
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the upload directory if needed.
    pub async fn init(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Save upload bytes under a generated short name, keeping the extension.
    ///
    /// Returns the stored path. Names are the first group of a UUID v4;
    /// collisions are not checked.
    pub async fn save(&self, original_name: &str, data: &[u8]) -> Result<PathBuf, StorageError> {
        if data.is_empty() {
            return Err(StorageError::Empty(original_name.to_string()));
        }

        let path = self.root.join(stored_name(original_name));
        tokio::fs::write(&path, data).await?;
        Ok(path)
    }

    /// Delete a stored upload.
    pub async fn delete(&self, path: &Path) -> Result<(), StorageError> {
        tokio::fs::remove_file(path).await?;
        Ok(())
    }
}

fn stored_name(original_name: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    let token = &id[..8];
    match Path::new(original_name).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{token}.{}", ext.to_ascii_lowercase()),
        _ => token.to_string(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Upload write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload {0:?} is empty")]
    Empty(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_name_keeps_extension() {
        let name = stored_name("holiday/Beach.JPG");
        assert_eq!(name.len(), 8 + 4);
        assert!(name.ends_with(".jpg"));
    }

    #[test]
    fn test_stored_name_without_extension() {
        assert_eq!(stored_name("snapshot").len(), 8);
    }

    #[tokio::test]
    async fn test_save_writes_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().join("uploads"));
        store.init().await.unwrap();

        let path = store.save("cat.png", b"\x89PNG....").await.unwrap();
        assert_eq!(path.parent().unwrap(), store.root());
        assert_eq!(std::fs::read(&path).unwrap(), b"\x89PNG....");

        store.delete(&path).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        assert!(matches!(store.save("a.png", b"").await, Err(StorageError::Empty(_))));
    }

    #[tokio::test]
    async fn test_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().join("not-created"));
        assert!(matches!(store.save("a.png", b"data").await, Err(StorageError::Io(_))));
    }
}
