//! Blob storage for committed photo bytes.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::StorageConfig;
use crate::ingest::validate::content_hash;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes and return the key they can be found under
    async fn put(&self, bytes: &[u8]) -> Result<String>;

    async fn delete(&self, storage_key: &str) -> Result<()>;
}

/// Content-addressed directory store: `<root>/<hh>/<sha256>.<ext>`.
///
/// Writing the same bytes twice yields the same key, so a retried flush
/// never leaves a second copy behind.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: config.blob_dir.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_for(bytes: &[u8]) -> String {
        let hash = content_hash(bytes);
        let ext = image::guess_format(bytes)
            .ok()
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("bin");
        format!("{}/{}.{}", &hash.as_str()[..2], hash, ext)
    }

    fn path_for(&self, storage_key: &str) -> Result<PathBuf> {
        // Keys are generated by key_for; anything else is refused.
        if storage_key.is_empty()
            || storage_key.contains("..")
            || storage_key.starts_with('/')
            || storage_key.contains('\\')
        {
            bail!("invalid storage key: {}", storage_key);
        }
        Ok(self.root.join(storage_key))
    }

    /// Unique temp name next to the destination so the final rename stays on one filesystem.
    fn temp_path(dest: &Path) -> PathBuf {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut name = dest
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{}.{}.tmp", std::process::id(), seq));
        dest.with_file_name(name)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, bytes: &[u8]) -> Result<String> {
        let key = Self::key_for(bytes);
        let dest = self.path_for(&key)?;

        if dest.exists() {
            return Ok(key);
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).context("Failed to create blob directory")?;
        }

        let tmp = Self::temp_path(&dest);
        fs::write(&tmp, bytes).context("Failed to write blob")?;
        if let Err(e) = fs::rename(&tmp, &dest) {
            let _ = fs::remove_file(&tmp);
            return Err(e).context("Failed to move blob into place");
        }

        Ok(key)
    }

    async fn delete(&self, storage_key: &str) -> Result<()> {
        let path = self.path_for(storage_key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to delete blob"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store(dir: &Path) -> FsBlobStore {
        FsBlobStore::new(&StorageConfig {
            blob_dir: dir.to_path_buf(),
        })
    }

    #[tokio::test]
    async fn test_put_is_content_addressed() {
        let dir = tempdir().unwrap();
        let blobs = store(dir.path());

        let a = blobs.put(b"same bytes").await.unwrap();
        let b = blobs.put(b"same bytes").await.unwrap();
        let c = blobs.put(b"other bytes").await.unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.ends_with(".bin"));
        assert_eq!(fs::read(dir.path().join(&a)).unwrap(), b"same bytes");
    }

    #[tokio::test]
    async fn test_png_gets_png_extension() {
        let dir = tempdir().unwrap();
        let blobs = store(dir.path());
        // PNG signature is enough for format guessing
        let key = blobs.put(b"\x89PNG\r\n\x1a\n0000").await.unwrap();
        assert!(key.ends_with(".png"));
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let dir = tempdir().unwrap();
        let blobs = store(dir.path());

        let key = blobs.put(b"bytes").await.unwrap();
        blobs.delete(&key).await.unwrap();
        assert!(!dir.path().join(&key).exists());
        blobs.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempdir().unwrap();
        let blobs = store(dir.path());
        assert!(blobs.delete("../outside").await.is_err());
        assert!(blobs.delete("/etc/passwd").await.is_err());
    }
}
