use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    sea_query::Expr,
};

use crate::entities::session_tokens;

pub struct TokenRepository {
    conn: DatabaseConnection,
}

impl TokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Persist a freshly issued token with `last_used_at = now`.
    ///
    /// Token strings come from a 256-bit random space; a primary-key
    /// collision is a data-integrity fault and surfaces as a database error.
    pub async fn insert(&self, token: &str, user_id: i32) -> Result<()> {
        let active = session_tokens::ActiveModel {
            token: Set(token.to_string()),
            user_id: Set(user_id),
            last_used_at: Set(chrono::Utc::now().timestamp()),
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert session token")?;

        Ok(())
    }

    /// Exact-match lookup.
    pub async fn find(&self, token: &str) -> Result<Option<session_tokens::Model>> {
        let row = session_tokens::Entity::find_by_id(token)
            .one(&self.conn)
            .await
            .context("Failed to query session token")?;

        Ok(row)
    }

    /// Sliding refresh: bump `last_used_at` to now in a single-row write.
    pub async fn touch(&self, token: &str) -> Result<()> {
        session_tokens::Entity::update_many()
            .col_expr(
                session_tokens::Column::LastUsedAt,
                Expr::value(chrono::Utc::now().timestamp()),
            )
            .filter(session_tokens::Column::Token.eq(token))
            .exec(&self.conn)
            .await
            .context("Failed to refresh session token")?;

        Ok(())
    }

    /// Idempotent delete; removing an absent token is not an error.
    pub async fn delete(&self, token: &str) -> Result<u64> {
        let result = session_tokens::Entity::delete_by_id(token)
            .exec(&self.conn)
            .await
            .context("Failed to delete session token")?;

        Ok(result.rows_affected)
    }

    /// Delete every token owned by `user_id`.
    pub async fn delete_for_user(&self, user_id: i32) -> Result<u64> {
        let result = session_tokens::Entity::delete_many()
            .filter(session_tokens::Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to delete session tokens for user")?;

        Ok(result.rows_affected)
    }

    /// Delete every token whose `last_used_at` predates `cutoff` (unix
    /// seconds). Used by the sweep.
    pub async fn delete_older_than(&self, cutoff: i64) -> Result<u64> {
        let result = session_tokens::Entity::delete_many()
            .filter(session_tokens::Column::LastUsedAt.lt(cutoff))
            .exec(&self.conn)
            .await
            .context("Failed to delete expired session tokens")?;

        Ok(result.rows_affected)
    }
}
