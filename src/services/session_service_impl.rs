//! `SeaORM` implementation of the `SessionService` trait.

use async_trait::async_trait;
use tracing::debug;

use crate::constants::tokens::SESSION_TOKEN_BYTES;
use crate::db::Store;
use crate::db::repositories::user::generate_secret;
use crate::services::session_service::{SessionError, SessionService};

pub struct SeaOrmSessionService {
    store: Store,
    ttl_secs: i64,
}

impl SeaOrmSessionService {
    #[must_use]
    pub const fn new(store: Store, ttl_secs: i64) -> Self {
        Self { store, ttl_secs }
    }
}

#[async_trait]
impl SessionService for SeaOrmSessionService {
    async fn issue(&self, user_id: i32) -> Result<String, SessionError> {
        let token = generate_secret(SESSION_TOKEN_BYTES);

        self.store.insert_session_token(&token, user_id).await?;

        metrics::counter!("sessions_issued_total").increment(1);

        Ok(token)
    }

    async fn verify(&self, token: &str) -> Result<i32, SessionError> {
        let Some(row) = self.store.find_session_token(token).await? else {
            return Err(SessionError::Unauthorized);
        };

        let now = chrono::Utc::now().timestamp();
        if now - row.last_used_at > self.ttl_secs {
            // Expired but not yet swept. Same failure as a deleted row.
            debug!(user_id = row.user_id, "Rejected expired session token");
            return Err(SessionError::Unauthorized);
        }

        self.store.touch_session_token(token).await?;

        Ok(row.user_id)
    }

    async fn revoke(&self, token: &str) -> Result<(), SessionError> {
        self.store.delete_session_token(token).await?;
        Ok(())
    }

    async fn revoke_all(&self, user_id: i32) -> Result<u64, SessionError> {
        let revoked = self.store.delete_session_tokens_for_user(user_id).await?;

        if revoked > 0 {
            debug!(user_id, revoked, "Bulk-revoked session tokens");
        }

        Ok(revoked)
    }
}
