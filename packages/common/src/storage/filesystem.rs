use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha512};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::error::StorageError;
use super::hash::ContentHash;
use super::traits::{Blob, BlobStore, StagedBlob};

/// Filesystem-backed content-addressed blob store.
///
/// Published blobs use a sharded layout:
/// `{root}/blobs/{first 2 hex chars}/{remaining 126 hex chars}`.
/// Uploads are staged under `{root}/tmp` and hard-linked into place, so a
/// published blob is never overwritten and concurrent identical uploads
/// converge on a single physical file. Blobs awaiting deletion are renamed
/// into `{root}/retired` first.
pub struct FilesystemBlobStore {
    blobs_dir: PathBuf,
    staging_dir: PathBuf,
    retired_dir: PathBuf,
}

impl FilesystemBlobStore {
    /// Create a new filesystem blob store rooted at `root`.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        let blobs_dir = root.join("blobs");
        let staging_dir = root.join("tmp");
        let retired_dir = root.join("retired");
        fs::create_dir_all(&blobs_dir).await?;
        fs::create_dir_all(&staging_dir).await?;
        fs::create_dir_all(&retired_dir).await?;
        Ok(Self {
            blobs_dir,
            staging_dir,
            retired_dir,
        })
    }

    /// Filesystem path of the blob with the given checksum.
    pub fn blob_path(&self, hash: &ContentHash) -> PathBuf {
        blob_path(&self.blobs_dir, hash)
    }

    /// Directory holding in-flight uploads.
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    fn retired_path(&self, hash: &ContentHash) -> PathBuf {
        self.retired_dir.join(hash.to_hex())
    }
}

async fn remove_if_present(path: &Path) -> Result<bool, StorageError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn blob_path(blobs_dir: &Path, hash: &ContentHash) -> PathBuf {
    blobs_dir.join(hash.shard_prefix()).join(hash.shard_suffix())
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn stage(&self, limit: Option<u64>) -> Result<Box<dyn StagedBlob>, StorageError> {
        let temp_path = self
            .staging_dir
            .join(format!("upload-{}", uuid::Uuid::new_v4()));
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await?;

        Ok(Box::new(FsStagedBlob {
            temp_path,
            blobs_dir: self.blobs_dir.clone(),
            file: Some(file),
            hasher: Sha512::new(),
            written: 0,
            limit,
            sealed: None,
        }))
    }

    async fn open(&self, hash: &ContentHash) -> Result<Blob, StorageError> {
        let path = self.blob_path(hash);
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(hash.to_hex()));
            }
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata().await?.len();
        Ok(Blob {
            reader: Box::new(file),
            len,
        })
    }

    async fn exists(&self, hash: &ContentHash) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.blob_path(hash)).await?)
    }

    async fn delete(&self, hash: &ContentHash) -> Result<bool, StorageError> {
        remove_if_present(&self.blob_path(hash)).await
    }

    async fn retire(&self, hash: &ContentHash) -> Result<bool, StorageError> {
        match fs::rename(self.blob_path(hash), self.retired_path(hash)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn restore(&self, hash: &ContentHash) -> Result<(), StorageError> {
        let retired = self.retired_path(hash);
        let destination = self.blob_path(hash);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }

        match fs::hard_link(&retired, &destination).await {
            Ok(()) => debug!(checksum = %hash, "Restored retired blob"),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!(checksum = %hash, "Blob republished while retired")
            }
            Err(e) => return Err(e.into()),
        }

        remove_if_present(&retired).await?;
        Ok(())
    }

    async fn purge(&self, hash: &ContentHash) -> Result<bool, StorageError> {
        remove_if_present(&self.retired_path(hash)).await
    }
}

/// A temporary upload file that hashes as it is written.
struct FsStagedBlob {
    temp_path: PathBuf,
    blobs_dir: PathBuf,
    file: Option<fs::File>,
    hasher: Sha512,
    written: u64,
    limit: Option<u64>,
    sealed: Option<ContentHash>,
}

#[async_trait]
impl StagedBlob for FsStagedBlob {
    async fn write(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        let total = self.written + chunk.len() as u64;
        if let Some(limit) = self.limit
            && total > limit
        {
            return Err(StorageError::SizeLimitExceeded {
                actual: total,
                limit,
            });
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| std::io::Error::other("staged blob already sealed"))?;
        file.write_all(chunk).await?;
        self.hasher.update(chunk);
        self.written = total;
        Ok(())
    }

    async fn seal(&mut self) -> Result<(ContentHash, u64), StorageError> {
        if let Some(hash) = self.sealed {
            return Ok((hash, self.written));
        }

        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }

        let hash = ContentHash::finalize(std::mem::take(&mut self.hasher));
        self.sealed = Some(hash);
        Ok((hash, self.written))
    }

    async fn publish(self: Box<Self>) -> Result<ContentHash, StorageError> {
        let hash = self.sealed.ok_or(StorageError::Unsealed)?;
        let destination = blob_path(&self.blobs_dir, &hash);

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }

        // A link never replaces an existing entry, so the first writer wins.
        match fs::hard_link(&self.temp_path, &destination).await {
            Ok(()) => debug!(checksum = %hash, size = self.written, "Published new blob"),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!(checksum = %hash, "Blob already present, skipping publish")
            }
            Err(e) => return Err(e.into()),
        }

        Ok(hash)
    }
}

impl Drop for FsStagedBlob {
    fn drop(&mut self) {
        drop(self.file.take());
        if let Err(e) = std::fs::remove_file(&self.temp_path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %self.temp_path.display(), error = %e, "Failed to remove staged upload");
        }
    }
}
