use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use common::storage::ContentHash;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use tracing::instrument;

use super::{FileEntry, FileRepository, NewFile, RepositoryError, expiry_for, generate_id};
use crate::entity::file;

/// Repository backed by any database SeaORM can reach.
///
/// Expiry is stored as an absolute `expires_at` column; rows are removed only
/// by the reaper.
pub struct SqlRepository {
    db: DatabaseConnection,
    lifetime: Option<Duration>,
}

impl SqlRepository {
    pub fn new(db: DatabaseConnection, lifetime: Option<Duration>) -> Self {
        Self { db, lifetime }
    }
}

impl TryFrom<file::Model> for FileEntry {
    type Error = RepositoryError;

    fn try_from(model: file::Model) -> Result<Self, Self::Error> {
        let checksum =
            ContentHash::from_hex(&model.checksum).map_err(|e| RepositoryError::Corrupt {
                id: model.id.clone(),
                reason: e.to_string(),
            })?;
        let size = u64::try_from(model.size).map_err(|_| RepositoryError::Corrupt {
            id: model.id.clone(),
            reason: format!("negative size {}", model.size),
        })?;

        Ok(Self {
            id: model.id,
            name: model.name,
            size,
            checksum,
            timestamp: model.created_at,
            expires: model.expires_at,
        })
    }
}

#[async_trait]
impl FileRepository for SqlRepository {
    #[instrument(skip(self, file), fields(checksum = %file.checksum))]
    async fn create(&self, file: NewFile) -> Result<String, RepositoryError> {
        let id = generate_id();
        let now = Utc::now().trunc_subsecs(0);

        let model = file::ActiveModel {
            id: Set(id.clone()),
            name: Set(file.name),
            size: Set(i64::try_from(file.size).unwrap_or(i64::MAX)),
            checksum: Set(file.checksum.to_hex()),
            created_at: Set(now),
            expires_at: Set(expiry_for(now, self.lifetime)),
        };
        file::Entity::insert(model)
            .exec_without_returning(&self.db)
            .await?;

        Ok(id)
    }

    async fn lookup(&self, id: &str) -> Result<FileEntry, RepositoryError> {
        file::Entity::find_by_id(id.to_owned())
            .one(&self.db)
            .await?
            .ok_or(RepositoryError::NotFound)?
            .try_into()
    }

    async fn expired(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<FileEntry>, RepositoryError> {
        file::Entity::find()
            .filter(file::Column::ExpiresAt.lte(now))
            .order_by_asc(file::Column::ExpiresAt)
            .limit(limit)
            .all(&self.db)
            .await?
            .into_iter()
            .map(FileEntry::try_from)
            .collect()
    }

    async fn remove(&self, id: &str) -> Result<bool, RepositoryError> {
        let result = file::Entity::delete_by_id(id.to_owned())
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn references(
        &self,
        checksum: &ContentHash,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let count = file::Entity::find()
            .filter(file::Column::Checksum.eq(checksum.to_hex()))
            .filter(
                Condition::any()
                    .add(file::Column::ExpiresAt.is_null())
                    .add(file::Column::ExpiresAt.gt(now)),
            )
            .count(&self.db)
            .await?;
        Ok(count)
    }
}
