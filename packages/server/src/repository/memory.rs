use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use common::storage::ContentHash;
use dashmap::DashMap;

use super::{FileEntry, FileRepository, NewFile, RepositoryError, expiry_for, generate_id};

/// In-process repository. Records live as long as the process.
pub struct MemoryRepository {
    files: DashMap<String, FileEntry>,
    lifetime: Option<Duration>,
}

impl MemoryRepository {
    pub fn new(lifetime: Option<Duration>) -> Self {
        Self {
            files: DashMap::new(),
            lifetime,
        }
    }

    /// Store a record verbatim, replacing any record with the same id.
    pub fn insert(&self, entry: FileEntry) {
        self.files.insert(entry.id.clone(), entry);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[async_trait]
impl FileRepository for MemoryRepository {
    async fn create(&self, file: NewFile) -> Result<String, RepositoryError> {
        let now = Utc::now().trunc_subsecs(0);
        let entry = FileEntry {
            id: generate_id(),
            name: file.name,
            size: file.size,
            checksum: file.checksum,
            timestamp: now,
            expires: expiry_for(now, self.lifetime),
        };
        let id = entry.id.clone();
        self.insert(entry);
        Ok(id)
    }

    async fn lookup(&self, id: &str) -> Result<FileEntry, RepositoryError> {
        self.files
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or(RepositoryError::NotFound)
    }

    async fn expired(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<FileEntry>, RepositoryError> {
        let mut expired: Vec<FileEntry> = self
            .files
            .iter()
            .filter(|entry| entry.is_expired(now))
            .map(|entry| entry.value().clone())
            .collect();
        expired.sort_by_key(|entry| entry.expires);
        expired.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(expired)
    }

    async fn remove(&self, id: &str) -> Result<bool, RepositoryError> {
        Ok(self.files.remove(id).is_some())
    }

    async fn references(
        &self,
        checksum: &ContentHash,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        Ok(self
            .files
            .iter()
            .filter(|entry| entry.checksum == *checksum && !entry.is_expired(now))
            .count() as u64)
    }
}
