//! `SeaORM` implementation of the `AccountService` trait.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::TransactionTrait;
use tracing::{error, info, warn};

use crate::config::SecurityConfig;
use crate::constants::tokens::SECRET_BYTES;
use crate::db::Store;
use crate::db::repositories::user::{generate_secret, hash_password_blocking};
use crate::db::{ProfileChanges, User};
use crate::services::account_service::{AccountError, AccountService, NewAccount, ProfileUpdate};
use crate::services::mail_service::MailService;
use crate::services::session_service::SessionService;

pub struct SeaOrmAccountService {
    store: Store,
    mailer: Arc<dyn MailService>,
    sessions: Arc<dyn SessionService>,
    security: SecurityConfig,
}

impl SeaOrmAccountService {
    #[must_use]
    pub fn new(
        store: Store,
        mailer: Arc<dyn MailService>,
        sessions: Arc<dyn SessionService>,
        security: SecurityConfig,
    ) -> Self {
        Self {
            store,
            mailer,
            sessions,
            security,
        }
    }
}

fn validate_username(username: &str) -> Result<(), AccountError> {
    if username.len() < 3 || username.len() > 32 {
        return Err(AccountError::Validation(
            "Username must be between 3 and 32 characters".to_string(),
        ));
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AccountError::Validation(
            "Username can only contain letters, numbers, hyphens, and underscores".to_string(),
        ));
    }

    Ok(())
}

fn validate_email(email: &str) -> Result<(), AccountError> {
    let looks_like_address = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));

    if !looks_like_address {
        return Err(AccountError::Validation(
            "Invalid email address".to_string(),
        ));
    }

    Ok(())
}

fn validate_password(password: &str) -> Result<(), AccountError> {
    if password.len() < 8 {
        return Err(AccountError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    Ok(())
}

fn activation_email(username: &str, token: &str) -> (String, String) {
    (
        "Activate your account".to_string(),
        format!(
            "Hello {username},\n\n\
             Use this code to activate your account: {token}\n\n\
             The code works exactly once."
        ),
    )
}

fn reset_email(username: &str, token: &str) -> (String, String) {
    (
        "Reset your password".to_string(),
        format!(
            "Hello {username},\n\n\
             Use this code to reset your password: {token}\n\n\
             If you did not request a reset, you can ignore this message."
        ),
    )
}

#[async_trait]
impl AccountService for SeaOrmAccountService {
    async fn register(&self, new: NewAccount) -> Result<(), AccountError> {
        validate_username(&new.username)?;
        validate_email(&new.email)?;
        validate_password(&new.password)?;

        if self.store.is_user_taken(&new.username, &new.email).await? {
            return Err(AccountError::Taken);
        }

        let password_hash = hash_password_blocking(&new.password, &self.security).await?;
        let activation_token = generate_secret(SECRET_BYTES);

        // The insert stays provisional until the activation email is out:
        // commit happens after dispatch succeeds, rollback when it fails,
        // so a failed attempt leaves zero user rows behind.
        let txn = self.store.conn.begin().await?;

        let user = self
            .store
            .user_repo()
            .insert(
                &txn,
                &new.username,
                &new.email,
                &password_hash,
                &activation_token,
            )
            .await?;

        let (subject, body) = activation_email(&new.username, &activation_token);
        match self.mailer.send(&new.email, &subject, &body).await {
            Ok(()) => {
                if let Err(commit_err) = txn.commit().await {
                    // The activation email is already out; the account it
                    // references will never exist. Accepted inconsistency
                    // window, surfaced loudly instead of masked.
                    error!(
                        username = %new.username,
                        error = %commit_err,
                        "Registration commit failed after activation email was dispatched"
                    );
                    return Err(commit_err.into());
                }

                metrics::counter!("accounts_registered_total").increment(1);
                info!(user_id = user.id, username = %new.username, "Account registered");
                Ok(())
            }
            Err(mail_err) => {
                txn.rollback().await?;
                warn!(
                    username = %new.username,
                    error = %mail_err,
                    "Activation email dispatch failed; registration rolled back"
                );
                Err(AccountError::MailDispatch(mail_err))
            }
        }
    }

    async fn activate(&self, activation_token: &str) -> Result<User, AccountError> {
        let user = self
            .store
            .activate_user_by_token(activation_token)
            .await?
            .ok_or(AccountError::InvalidActivationToken)?;

        info!(user_id = user.id, "Account activated");
        Ok(user)
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), AccountError> {
        let reset_token = generate_secret(SECRET_BYTES);

        // The secret is persisted before dispatch and deliberately NOT
        // rolled back on dispatch failure, unlike registration.
        let user = self
            .store
            .set_user_reset_token(email, &reset_token)
            .await?
            .ok_or(AccountError::EmailNotFound)?;

        let (subject, body) = reset_email(&user.username, &reset_token);
        if let Err(mail_err) = self.mailer.send(email, &subject, &body).await {
            warn!(
                user_id = user.id,
                error = %mail_err,
                "Reset email dispatch failed; stored secret kept"
            );
            return Err(AccountError::MailDispatch(mail_err));
        }

        info!(user_id = user.id, "Password reset requested");
        Ok(())
    }

    async fn consume_password_reset(
        &self,
        reset_token: &str,
        new_password: &str,
    ) -> Result<(), AccountError> {
        validate_password(new_password)?;

        let password_hash = hash_password_blocking(new_password, &self.security).await?;

        let user = self
            .store
            .consume_user_reset_token(reset_token, &password_hash)
            .await?
            .ok_or(AccountError::ResetTokenNotFound)?;

        // Every session minted under the old credential dies with it.
        let revoked = self
            .sessions
            .revoke_all(user.id)
            .await
            .map_err(|e| AccountError::Database(e.to_string()))?;

        info!(user_id = user.id, revoked, "Password reset consumed");
        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: i32,
        changes: ProfileUpdate,
    ) -> Result<User, AccountError> {
        if let Some(username) = &changes.username {
            validate_username(username)?;
        }
        if let Some(email) = &changes.email {
            validate_email(email)?;
        }

        let password_hash = match &changes.password {
            Some(password) => {
                validate_password(password)?;
                Some(hash_password_blocking(password, &self.security).await?)
            }
            None => None,
        };

        let user = self
            .store
            .update_user_profile(
                user_id,
                ProfileChanges {
                    username: changes.username,
                    email: changes.email,
                    password_hash,
                },
            )
            .await?
            .ok_or(AccountError::UserNotFound)?;

        Ok(user)
    }

    async fn delete_account(&self, user_id: i32) -> Result<(), AccountError> {
        if !self.store.delete_user(user_id).await? {
            return Err(AccountError::UserNotFound);
        }

        let revoked = self
            .sessions
            .revoke_all(user_id)
            .await
            .map_err(|e| AccountError::Database(e.to_string()))?;

        info!(user_id, revoked, "Account deleted");
        Ok(())
    }
}
