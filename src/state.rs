use crate::config::AppConfig;
use crate::db;
use crate::storage::{DiskStorage, StorageClient};
use crate::users::repo::{InMemoryUserStore, PgUserStore, UserStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn StorageClient>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let users = match config.database_url.as_deref() {
            Some(url) => {
                let pool = db::connect(url).await?;
                Arc::new(PgUserStore::new(pool)) as Arc<dyn UserStore>
            }
            None => {
                tracing::warn!("DATABASE_URL not set; users are kept in memory");
                Arc::new(InMemoryUserStore::new()) as Arc<dyn UserStore>
            }
        };

        let storage =
            Arc::new(DiskStorage::new(&config.upload_dir).await?) as Arc<dyn StorageClient>;

        Ok(Self::from_parts(users, config, storage))
    }

    pub fn from_parts(
        users: Arc<dyn UserStore>,
        config: Arc<AppConfig>,
        storage: Arc<dyn StorageClient>,
    ) -> Self {
        Self {
            users,
            config,
            storage,
        }
    }

    /// In-memory users and disk uploads in a fresh temp dir. Keep the
    /// returned dir alive for the duration of the test.
    #[cfg(test)]
    pub async fn for_tests() -> (Self, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("temp dir");
        let upload_dir = dir.path().to_string_lossy().into_owned();

        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            base_url: "http://test.local".into(),
            database_url: None,
            upload_dir: upload_dir.clone(),
            max_upload_bytes: 1024 * 1024,
        });
        let storage = Arc::new(DiskStorage::new(&upload_dir).await.expect("disk storage"))
            as Arc<dyn StorageClient>;
        let users = Arc::new(InMemoryUserStore::new()) as Arc<dyn UserStore>;

        (Self::from_parts(users, config, storage), dir)
    }
}
