use std::sync::Arc;

use common::storage::BlobStore;

use crate::config::AppConfig;
use crate::repository::FileRepository;
use crate::utils::mime::MimeTable;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repository: Arc<dyn FileRepository>,
    pub blob_store: Arc<dyn BlobStore>,
    pub mime: Arc<MimeTable>,
}
