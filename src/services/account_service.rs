//! Domain service for account lifecycle: registration, activation, profile
//! changes, deletion, and the password-reset flow.

use thiserror::Error;

use crate::db::User;
use crate::services::mail_service::MailError;

/// Errors specific to account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Username or email is already taken")]
    Taken,

    #[error("Unknown activation token")]
    InvalidActivationToken,

    #[error("Unknown password reset token")]
    ResetTokenNotFound,

    #[error("No account for that email address")]
    EmailNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Email dispatch failed: {0}")]
    MailDispatch(#[source] MailError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for AccountError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<sea_orm::DbErr> for AccountError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

/// Input for a registration attempt.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Requested profile changes. `None` leaves the field untouched. A new
/// password is hashed and stored without comparing the old one; credential
/// verification happens at login only.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Domain service trait for account management.
#[async_trait::async_trait]
pub trait AccountService: Send + Sync {
    /// Registers a new, inactive account and emails its activation secret.
    ///
    /// The user row and the email dispatch succeed or fail together: the
    /// insert happens inside a transaction that is committed only after the
    /// dispatcher accepts the message, and rolled back otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::MailDispatch`] when the email collaborator
    /// rejects or errors; no user row persists in that case.
    async fn register(&self, new: NewAccount) -> Result<(), AccountError>;

    /// Consumes an activation secret. Single-use: a repeat call with the
    /// same secret fails with [`AccountError::InvalidActivationToken`].
    async fn activate(&self, activation_token: &str) -> Result<User, AccountError>;

    /// Issues a single-use reset secret for the account owning `email` and
    /// emails it. The secret is durable before dispatch and is NOT rolled
    /// back when dispatch fails.
    async fn request_password_reset(&self, email: &str) -> Result<(), AccountError>;

    /// Consumes a reset secret: stores the new password hash, clears both
    /// secrets, reactivates the account, and revokes every live session.
    async fn consume_password_reset(
        &self,
        reset_token: &str,
        new_password: &str,
    ) -> Result<(), AccountError>;

    /// Applies profile changes for an authenticated user.
    async fn update_profile(
        &self,
        user_id: i32,
        changes: ProfileUpdate,
    ) -> Result<User, AccountError>;

    /// Deletes the account and revokes every session it owned.
    async fn delete_account(&self, user_id: i32) -> Result<(), AccountError>;
}
