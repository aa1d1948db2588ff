use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use tokio::task;

use crate::config::SecurityConfig;
use crate::entities::users;

/// User data returned from the repository (without secrets or password hash)
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub inactive: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            inactive: model.inactive,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Field changes for a profile update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Insert a new, inactive user row.
    ///
    /// Generic over the connection so registration can run it inside a
    /// transaction that is only committed once the activation email is out.
    pub async fn insert<C: ConnectionTrait>(
        &self,
        conn: &C,
        username: &str,
        email: &str,
        password_hash: &str,
        activation_token: &str,
    ) -> Result<users::Model> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = users::ActiveModel {
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            password_hash: Set(password_hash.to_string()),
            activation_token: Set(Some(activation_token.to_string())),
            password_reset_token: Set(None),
            inactive: Set(true),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(conn)
            .await
            .context("Failed to insert user")?;

        Ok(model)
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    /// Get user by username
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(User::from))
    }

    /// Get user by email
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")?;

        Ok(user.map(User::from))
    }

    /// Check whether a username or email is already taken.
    pub async fn is_taken(&self, username: &str, email: &str) -> Result<bool> {
        let existing = users::Entity::find()
            .filter(
                Condition::any()
                    .add(users::Column::Username.eq(username))
                    .add(users::Column::Email.eq(email)),
            )
            .one(&self.conn)
            .await
            .context("Failed to query user for uniqueness check")?;

        Ok(existing.is_some())
    }

    /// Verify password for a user
    /// Note: This uses `spawn_blocking` because Argon2 hashing is CPU-intensive
    /// and would block the async runtime if run directly.
    pub async fn verify_password(&self, username: &str, password: &str) -> Result<bool> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        let Some(user) = user else {
            return Ok(false);
        };

        let password_hash = user.password_hash;
        let password = password.to_string();

        let is_valid = task::spawn_blocking(move || {
            let parsed_hash = PasswordHash::new(&password_hash)
                .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

            let argon2 = Argon2::default();
            Ok::<bool, anyhow::Error>(
                argon2
                    .verify_password(password.as_bytes(), &parsed_hash)
                    .is_ok(),
            )
        })
        .await
        .context("Password verification task panicked")??;

        Ok(is_valid)
    }

    /// Consume an activation secret: clears it and marks the account active
    /// in a single write. Returns `None` when no user carries the secret,
    /// which includes a secret that was already consumed.
    pub async fn activate_by_token(&self, activation_token: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::ActivationToken.eq(activation_token))
            .one(&self.conn)
            .await
            .context("Failed to query user by activation token")?;

        let Some(user) = user else {
            return Ok(None);
        };

        let now = chrono::Utc::now().to_rfc3339();

        let mut active: users::ActiveModel = user.into();
        active.activation_token = Set(None);
        active.inactive = Set(false);
        active.updated_at = Set(now);
        let updated = active.update(&self.conn).await?;

        Ok(Some(User::from(updated)))
    }

    /// Store a password-reset secret for the user owning `email`.
    /// Returns the owning user, or `None` when the email is unknown.
    pub async fn set_reset_token(&self, email: &str, reset_token: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user by email for reset request")?;

        let Some(user) = user else {
            return Ok(None);
        };

        let now = chrono::Utc::now().to_rfc3339();

        let mut active: users::ActiveModel = user.into();
        active.password_reset_token = Set(Some(reset_token.to_string()));
        active.updated_at = Set(now);
        let updated = active.update(&self.conn).await?;

        Ok(Some(User::from(updated)))
    }

    /// Consume a password-reset secret: swaps in the new hash, clears both
    /// secrets and reactivates the account in a single write. Returns `None`
    /// when no user carries the secret.
    pub async fn consume_reset_token(
        &self,
        reset_token: &str,
        new_password_hash: &str,
    ) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::PasswordResetToken.eq(reset_token))
            .one(&self.conn)
            .await
            .context("Failed to query user by reset token")?;

        let Some(user) = user else {
            return Ok(None);
        };

        let now = chrono::Utc::now().to_rfc3339();

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(new_password_hash.to_string());
        active.password_reset_token = Set(None);
        active.activation_token = Set(None);
        active.inactive = Set(false);
        active.updated_at = Set(now);
        let updated = active.update(&self.conn).await?;

        Ok(Some(User::from(updated)))
    }

    /// Apply profile changes. A new password arrives pre-hashed; the old one
    /// is never compared here.
    pub async fn update_profile(&self, id: i32, changes: ProfileChanges) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for profile update")?;

        let Some(user) = user else {
            return Ok(None);
        };

        let now = chrono::Utc::now().to_rfc3339();

        let mut active: users::ActiveModel = user.into();
        if let Some(username) = changes.username {
            active.username = Set(username);
        }
        if let Some(email) = changes.email {
            active.email = Set(email);
        }
        if let Some(password_hash) = changes.password_hash {
            active.password_hash = Set(password_hash);
        }
        active.updated_at = Set(now);
        let updated = active.update(&self.conn).await?;

        Ok(Some(User::from(updated)))
    }

    /// Delete a user row. Session tokens are revoked by the caller.
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = users::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete user")?;

        Ok(result.rows_affected > 0)
    }
}

/// Hash a password using Argon2id with the configured params.
pub fn hash_password(password: &str, config: &SecurityConfig) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let params = Params::new(
        config.argon2_memory_cost_kib,
        config.argon2_time_cost,
        config.argon2_parallelism,
        None, // output length (use default)
    )
    .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Hash a password on the blocking pool; Argon2 would stall the async
/// runtime if run inline.
pub async fn hash_password_blocking(password: &str, config: &SecurityConfig) -> Result<String> {
    let password = password.to_string();
    let config = config.clone();

    task::spawn_blocking(move || hash_password(&password, &config))
        .await
        .context("Password hashing task panicked")?
}

/// Generate a random lowercase-hex secret of `bytes * 2` characters.
#[must_use]
pub fn generate_secret(bytes: usize) -> String {
    use rand::RngCore;

    let mut rng = rand::rng();
    let mut buf = vec![0u8; bytes];
    rng.fill_bytes(&mut buf);

    buf.iter().fold(String::with_capacity(bytes * 2), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
