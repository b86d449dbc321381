//! Metadata repository: maps short public ids to uploaded file records.

mod memory;
mod sql;

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeDelta, Utc};
use common::storage::ContentHash;
use thiserror::Error;

pub use memory::MemoryRepository;
pub use sql::SqlRepository;

/// Random bytes per id. A multiple of 3 encodes to base64 without padding.
pub const ID_BYTES: usize = 9;

/// Length of an encoded id.
pub const ID_LEN: usize = ID_BYTES / 3 * 4;

/// Longest accepted original file name, in characters.
pub const MAX_NAME_LEN: usize = 255;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("file not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("corrupt file record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Metadata for one completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub id: String,
    /// Original file name as sent by the client.
    pub name: String,
    /// Bytes actually written, not the declared length.
    pub size: u64,
    pub checksum: ContentHash,
    pub timestamp: DateTime<Utc>,
    /// `None` means the file never expires.
    pub expires: Option<DateTime<Utc>>,
}

impl FileEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }
}

/// Fields supplied by the upload pipeline when committing a file.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub name: String,
    pub size: u64,
    pub checksum: ContentHash,
}

#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Insert a record under a freshly generated id and return the id.
    ///
    /// Ids are random and not checked against existing rows before insert.
    async fn create(&self, file: NewFile) -> Result<String, RepositoryError>;

    /// Point lookup by id. Expired rows that still exist are returned as-is;
    /// callers decide liveness.
    async fn lookup(&self, id: &str) -> Result<FileEntry, RepositoryError>;

    /// Up to `limit` records whose expiry is at or before `now`, oldest first.
    async fn expired(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<FileEntry>, RepositoryError>;

    /// Delete a record. Returns `false` if it did not exist.
    async fn remove(&self, id: &str) -> Result<bool, RepositoryError>;

    /// Number of unexpired records referencing `checksum`.
    async fn references(
        &self,
        checksum: &ContentHash,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;
}

/// Generate a 12-character URL-safe public id.
pub fn generate_id() -> String {
    let bytes: [u8; ID_BYTES] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Absolute expiry for a record created at `now`.
fn expiry_for(now: DateTime<Utc>, lifetime: Option<Duration>) -> Option<DateTime<Utc>> {
    let lifetime = TimeDelta::from_std(lifetime?).ok()?;
    now.checked_add_signed(lifetime)
}
