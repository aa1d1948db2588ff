use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::user::{ProfileChanges, User};

use crate::entities::session_tokens;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn token_repo(&self) -> repositories::token::TokenRepository {
        repositories::token::TokenRepository::new(self.conn.clone())
    }

    // ========== User Repository Methods ==========

    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn is_user_taken(&self, username: &str, email: &str) -> Result<bool> {
        self.user_repo().is_taken(username, email).await
    }

    pub async fn verify_user_password(&self, username: &str, password: &str) -> Result<bool> {
        self.user_repo().verify_password(username, password).await
    }

    pub async fn activate_user_by_token(&self, activation_token: &str) -> Result<Option<User>> {
        self.user_repo().activate_by_token(activation_token).await
    }

    pub async fn set_user_reset_token(
        &self,
        email: &str,
        reset_token: &str,
    ) -> Result<Option<User>> {
        self.user_repo().set_reset_token(email, reset_token).await
    }

    pub async fn consume_user_reset_token(
        &self,
        reset_token: &str,
        new_password_hash: &str,
    ) -> Result<Option<User>> {
        self.user_repo()
            .consume_reset_token(reset_token, new_password_hash)
            .await
    }

    pub async fn update_user_profile(
        &self,
        id: i32,
        changes: ProfileChanges,
    ) -> Result<Option<User>> {
        self.user_repo().update_profile(id, changes).await
    }

    pub async fn delete_user(&self, id: i32) -> Result<bool> {
        self.user_repo().delete(id).await
    }

    // ========== Token Repository Methods ==========

    pub async fn insert_session_token(&self, token: &str, user_id: i32) -> Result<()> {
        self.token_repo().insert(token, user_id).await
    }

    pub async fn find_session_token(&self, token: &str) -> Result<Option<session_tokens::Model>> {
        self.token_repo().find(token).await
    }

    pub async fn touch_session_token(&self, token: &str) -> Result<()> {
        self.token_repo().touch(token).await
    }

    pub async fn delete_session_token(&self, token: &str) -> Result<u64> {
        self.token_repo().delete(token).await
    }

    pub async fn delete_session_tokens_for_user(&self, user_id: i32) -> Result<u64> {
        self.token_repo().delete_for_user(user_id).await
    }

    pub async fn delete_session_tokens_older_than(&self, cutoff: i64) -> Result<u64> {
        self.token_repo().delete_older_than(cutoff).await
    }
}
