use crate::entities::prelude::*;
use crate::entities::session_tokens;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(SessionTokens)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Bulk revocation and the sweep both scan by these columns.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_session_tokens_user_id")
                    .table(SessionTokens)
                    .col(session_tokens::Column::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_session_tokens_last_used_at")
                    .table(SessionTokens)
                    .col(session_tokens::Column::LastUsedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SessionTokens).to_owned())
            .await?;

        Ok(())
    }
}
