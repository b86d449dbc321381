use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncSeek};

use super::error::StorageError;
use super::hash::ContentHash;

/// Readable, seekable blob content.
pub trait SeekRead: AsyncRead + AsyncSeek + Unpin + Send {}

impl<T: AsyncRead + AsyncSeek + Unpin + Send> SeekRead for T {}

/// Type alias for a boxed seekable reader.
pub type BoxReader = Box<dyn SeekRead>;

/// An opened blob: its content and total length in bytes.
pub struct Blob {
    pub reader: BoxReader,
    pub len: u64,
}

/// An upload in progress, held in the staging area until published.
///
/// Dropping a staged blob removes its temporary object, whether or not it was
/// published.
#[async_trait]
pub trait StagedBlob: Send {
    /// Append a chunk, feeding it to the running checksum.
    async fn write(&mut self, chunk: &[u8]) -> Result<(), StorageError>;

    /// Flush the temporary object and return its checksum and byte count.
    async fn seal(&mut self) -> Result<(ContentHash, u64), StorageError>;

    /// Promote the sealed object to its checksum-addressed location.
    ///
    /// Succeeds without touching the existing object when identical content
    /// has already been published.
    async fn publish(self: Box<Self>) -> Result<ContentHash, StorageError>;
}

/// Content-addressed blob storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Open a new staged blob, rejecting writes past `limit` bytes.
    async fn stage(&self, limit: Option<u64>) -> Result<Box<dyn StagedBlob>, StorageError>;

    /// Store bytes in one step and return the checksum.
    async fn put(&self, data: &[u8]) -> Result<ContentHash, StorageError> {
        let mut staged = self.stage(None).await?;
        staged.write(data).await?;
        staged.seal().await?;
        staged.publish().await
    }

    /// Open a blob for reading.
    async fn open(&self, hash: &ContentHash) -> Result<Blob, StorageError>;

    /// Check whether a blob exists.
    async fn exists(&self, hash: &ContentHash) -> Result<bool, StorageError>;

    /// Delete a blob by its checksum.
    ///
    /// Returns `true` if the blob was deleted, `false` if it did not exist.
    async fn delete(&self, hash: &ContentHash) -> Result<bool, StorageError>;

    /// Move a blob out of the addressable namespace ahead of deletion.
    ///
    /// A publish of the same content after this call creates a fresh blob
    /// instead of trusting the retired one. Returns `false` if the blob did
    /// not exist.
    async fn retire(&self, hash: &ContentHash) -> Result<bool, StorageError>;

    /// Put a retired blob back. A blob published since retirement is kept.
    async fn restore(&self, hash: &ContentHash) -> Result<(), StorageError>;

    /// Permanently remove a retired blob.
    ///
    /// Returns `false` if nothing was retired under this checksum.
    async fn purge(&self, hash: &ContentHash) -> Result<bool, StorageError>;
}
