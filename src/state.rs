use crate::auth::repo::{SessionStore, UserRepo};
use crate::config::AppConfig;
use crate::db::PgStore;
use crate::posts::repo::PostRepo;
use crate::storage::{LocalStorage, StorageClient};
use std::sync::Arc;

/// Everything a request handler needs, passed explicitly through axum state.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepo>,
    pub posts: Arc<dyn PostRepo>,
    pub sessions: Arc<dyn SessionStore>,
    pub storage: Arc<dyn StorageClient>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = PgStore::connect(&config.database_url).await?;
        store.migrate().await?;
        let store = Arc::new(store);

        let storage =
            Arc::new(LocalStorage::new(&config.avatar_dir).await?) as Arc<dyn StorageClient>;

        Ok(Self {
            users: store.clone(),
            posts: store.clone(),
            sessions: store,
            storage,
            config,
        })
    }
}
