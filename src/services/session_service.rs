//! Domain service for the session-token lifecycle.
//!
//! Tokens are opaque bearer credentials with sliding expiration: every
//! successful verification pushes the expiry window forward. Expired rows
//! linger until the sweep removes them, but verification fails closed on
//! them either way.

use thiserror::Error;

/// Errors specific to session-token operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Token missing, expired, or malformed. Indistinguishable on purpose;
    /// the boundary degrades the request instead of leaking which case hit.
    #[error("Invalid or expired session token")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for SessionError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Domain service trait for issuing and verifying session tokens.
#[async_trait::async_trait]
pub trait SessionService: Send + Sync {
    /// Mints a fresh token for `user_id` and persists it.
    async fn issue(&self, user_id: i32) -> Result<String, SessionError>;

    /// Verifies a presented token and returns the owning user id.
    ///
    /// On success the token's `last_used_at` is refreshed in the same
    /// logical step; callers never observe a verified-but-stale row.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Unauthorized`] when the token is unknown or
    /// older than the configured TTL.
    async fn verify(&self, token: &str) -> Result<i32, SessionError>;

    /// Deletes one token. Revoking an absent token is not an error.
    async fn revoke(&self, token: &str) -> Result<(), SessionError>;

    /// Deletes every token owned by `user_id` and returns how many died.
    /// Used after account deletion and password reset.
    async fn revoke_all(&self, user_id: i32) -> Result<u64, SessionError>;
}
