//! Background removal of expired files.
//!
//! Expiry is always enforced on read; the reaper only reclaims space. A row
//! is deleted first and its blob only once no live row shares the checksum.
//! The blob is retired before the final count: an identical upload committed
//! earlier shows up in that count and the blob is restored, while one
//! committed later finds no blob and publishes its own copy.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::storage::{BlobStore, ContentHash};
use tracing::{debug, error, info, warn};

use crate::config::ReaperConfig;
use crate::repository::{FileRepository, RepositoryError};

/// Counts from one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub files: u64,
    pub blobs: u64,
}

/// Spawn a background task that periodically deletes expired files.
pub fn spawn_reaper(
    repository: Arc<dyn FileRepository>,
    blob_store: Arc<dyn BlobStore>,
    config: ReaperConfig,
) -> tokio::task::JoinHandle<()> {
    info!(
        interval_secs = config.interval_secs,
        batch_size = config.batch_size,
        "Starting expiry reaper"
    );

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(config.interval_secs.max(1)));

        loop {
            interval.tick().await;
            match sweep_once(
                repository.as_ref(),
                blob_store.as_ref(),
                Utc::now(),
                config.batch_size,
            )
            .await
            {
                Ok(stats) if stats.files > 0 => {
                    info!(files = stats.files, blobs = stats.blobs, "Reaped expired files");
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "Expiry sweep failed"),
            }
        }
    })
}

/// Delete up to `batch_size` files that expired at or before `now`.
///
/// Per-blob failures are logged and skipped; only failing to list expired
/// rows aborts the sweep.
pub async fn sweep_once(
    repository: &dyn FileRepository,
    blob_store: &dyn BlobStore,
    now: DateTime<Utc>,
    batch_size: u64,
) -> Result<SweepStats, RepositoryError> {
    let mut stats = SweepStats::default();

    for entry in repository.expired(now, batch_size).await? {
        match repository.remove(&entry.id).await {
            Ok(true) => stats.files += 1,
            Ok(false) => continue,
            Err(e) => {
                warn!(id = %entry.id, error = %e, "Failed to remove expired file");
                continue;
            }
        }

        // Expired rows sharing the checksum may still be waiting in this or a
        // later batch; the first one to reclaim the blob wins.
        if reclaim_blob(repository, blob_store, &entry.checksum, now).await {
            stats.blobs += 1;
        }
    }

    Ok(stats)
}

/// Delete the blob for `checksum` if no live row references it.
///
/// Returns `true` if the blob was deleted.
async fn reclaim_blob(
    repository: &dyn FileRepository,
    blob_store: &dyn BlobStore,
    checksum: &ContentHash,
    now: DateTime<Utc>,
) -> bool {
    match repository.references(checksum, now).await {
        Ok(0) => {}
        Ok(live) => {
            debug!(checksum = %checksum, live, "Blob still referenced");
            return false;
        }
        Err(e) => {
            warn!(checksum = %checksum, error = %e, "Failed to count blob references");
            return false;
        }
    }

    match blob_store.retire(checksum).await {
        Ok(true) => {}
        Ok(false) => return false,
        Err(e) => {
            warn!(checksum = %checksum, error = %e, "Failed to retire blob");
            return false;
        }
    }

    match repository.references(checksum, now).await {
        Ok(0) => match blob_store.purge(checksum).await {
            Ok(purged) => return purged,
            Err(e) => {
                warn!(checksum = %checksum, error = %e, "Failed to purge retired blob");
                return false;
            }
        },
        Ok(live) => debug!(checksum = %checksum, live, "Blob referenced again, restoring"),
        Err(e) => warn!(checksum = %checksum, error = %e, "Failed to recount blob references"),
    }

    if let Err(e) = blob_store.restore(checksum).await {
        error!(checksum = %checksum, error = %e, "Failed to restore retired blob");
    }
    false
}
