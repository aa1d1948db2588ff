use sea_orm_migration::prelude::*;

mod m20260512_initial;
mod m20260518_add_session_tokens;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260512_initial::Migration),
            Box::new(m20260518_add_session_tokens::Migration),
        ]
    }
}
