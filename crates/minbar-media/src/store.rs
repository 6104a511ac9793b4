use anyhow::{Result, bail};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Disk-backed object store with a flat key namespace.
///
/// Each blob lives at `{dir}/{key}`; the directory is served statically so
/// `public_url(key)` resolves for any stored blob.
pub struct BlobStore {
    dir: PathBuf,
    base_url: String,
}

impl BlobStore {
    pub async fn new(dir: PathBuf, base_url: impl Into<String>) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Blob storage directory: {}", dir.display());
        Ok(Self {
            dir,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Public URL for a key. The inverse of [`key_from_url`].
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    /// Last path segment of a public URL, i.e. the blob key.
    pub fn key_from_url(url: &str) -> &str {
        url.rsplit('/').next().unwrap_or(url)
    }

    /// Store a blob under `key` and return its public URL. Fails if the key
    /// is already taken — keys embed a timestamp and are never reused.
    pub async fn upload(&self, key: &str, bytes: &[u8]) -> Result<String> {
        let path = self.blob_path(key)?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(self.public_url(key))
    }

    pub async fn copy(&self, src_key: &str, dst_key: &str) -> Result<()> {
        let src = self.blob_path(src_key)?;
        let dst = self.blob_path(dst_key)?;
        fs::copy(&src, &dst).await?;
        Ok(())
    }

    /// Remove blobs by key. A key that is already gone is not an error.
    pub async fn delete(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            let path = self.blob_path(key)?;
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!("Blob {} already gone", key);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    pub async fn exists(&self, key: &str) -> bool {
        match self.blob_path(key) {
            Ok(path) => fs::metadata(&path).await.is_ok(),
            Err(_) => false,
        }
    }

    fn blob_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains('/') || key.contains('\\') || key.contains("..") {
            bail!("Invalid blob key: {:?}", key);
        }
        Ok(self.dir.join(key))
    }
}
