use std::sync::Arc;

use anyhow::Context;
use common::storage::BlobStore;
use common::storage::filesystem::FilesystemBlobStore;
use tracing::{Level, info, warn};

use server::config::AppConfig;
use server::database::init_db;
use server::reaper::spawn_reaper;
use server::repository::{FileRepository, MemoryRepository, SqlRepository};
use server::state::AppState;
use server::utils::mime::MimeTable;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let lifetime = config.storage.lifetime();

    let repository: Arc<dyn FileRepository> = if config.database.is_memory() {
        warn!("Using in-memory repository; uploads are forgotten on restart");
        Arc::new(MemoryRepository::new(lifetime))
    } else {
        let db = init_db(&config.database)
            .await
            .context("Failed to initialize database")?;
        Arc::new(SqlRepository::new(db, lifetime))
    };

    let blob_store: Arc<dyn BlobStore> = Arc::new(
        FilesystemBlobStore::new(&config.storage.path)
            .await
            .with_context(|| {
                format!(
                    "Failed to open storage at {}",
                    config.storage.path.display()
                )
            })?,
    );

    let mime = match &config.web.mime_types {
        Some(path) => MimeTable::load(path)
            .with_context(|| format!("Failed to load MIME table {}", path.display()))?,
        None => MimeTable::new(),
    };

    if config.reaper.enabled {
        if lifetime.is_some() {
            spawn_reaper(repository.clone(), blob_store.clone(), config.reaper.clone());
        } else {
            warn!("Reaper enabled but files never expire; not starting it");
        }
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!(
        storage = %config.storage.path.display(),
        web = %config.web.path.display(),
        max_upload_size = config.storage.max_upload_size,
        lifetime_secs = config.storage.lifetime_secs,
        "Configuration loaded"
    );

    let state = AppState {
        config: Arc::new(config),
        repository,
        blob_store,
        mime: Arc::new(mime),
    };
    let app = server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running at http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
