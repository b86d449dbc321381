use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Storage configuration shared by the server and its background tasks.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Storage root. Blobs live under `{path}/blobs`, in-flight uploads under
    /// `{path}/tmp`. Default: "./files".
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// Largest accepted upload in bytes. Default: 150 MB.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
    /// Seconds an upload stays available. `0` disables expiry. Default: 24h.
    #[serde(default = "default_lifetime_secs")]
    pub lifetime_secs: u64,
}

impl StorageConfig {
    /// Configured file lifetime, or `None` when files never expire.
    pub fn lifetime(&self) -> Option<Duration> {
        (self.lifetime_secs > 0).then(|| Duration::from_secs(self.lifetime_secs))
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./files")
}
fn default_max_upload_size() -> u64 {
    150 * 1024 * 1024
}
fn default_lifetime_secs() -> u64 {
    24 * 60 * 60
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            max_upload_size: default_max_upload_size(),
            lifetime_secs: default_lifetime_secs(),
        }
    }
}
