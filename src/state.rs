use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AccountService, HttpMailService, MailService, SeaOrmAccountService, SeaOrmSessionService,
    SessionService,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub mailer: Arc<dyn MailService>,

    pub session_service: Arc<dyn SessionService>,

    pub account_service: Arc<dyn AccountService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let mailer = Arc::new(HttpMailService::new(config.mail.clone())?) as Arc<dyn MailService>;

        Self::with_collaborators(config, store, mailer)
    }

    /// Wire the state around pre-built collaborators. Tests swap in an
    /// in-memory store and a mock mailer through this path.
    pub fn with_collaborators(
        config: Config,
        store: Store,
        mailer: Arc<dyn MailService>,
    ) -> anyhow::Result<Self> {
        let session_service = Arc::new(SeaOrmSessionService::new(
            store.clone(),
            config.sessions.ttl_secs(),
        )) as Arc<dyn SessionService>;

        let account_service = Arc::new(SeaOrmAccountService::new(
            store.clone(),
            mailer.clone(),
            session_service.clone(),
            config.security.clone(),
        )) as Arc<dyn AccountService>;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            mailer,
            session_service,
            account_service,
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}
