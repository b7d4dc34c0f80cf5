pub use sea_orm_migration::prelude::*;

mod m20250901_000001_create_users;
mod m20250901_000002_create_prizes;
mod m20250901_000003_create_deferred_grant_tasks;
mod m20250901_000004_create_card_purchases;
mod m20250901_000005_create_reward_claims;

use sea_orm_migration::sea_orm::DatabaseBackend;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250901_000001_create_users::Migration),
            Box::new(m20250901_000002_create_prizes::Migration),
            Box::new(m20250901_000003_create_deferred_grant_tasks::Migration),
            Box::new(m20250901_000004_create_card_purchases::Migration),
            Box::new(m20250901_000005_create_reward_claims::Migration),
        ]
    }
}

/// Auto-increment primary key. SQLite only accepts AUTOINCREMENT on `integer`,
/// which is 64-bit there anyway; Postgres gets `bigint` to match the `i64` models.
pub(crate) fn pk_column<T: IntoIden>(manager: &SchemaManager, name: T) -> ColumnDef {
    let mut col = ColumnDef::new(name);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => col.integer(),
        _ => col.big_integer(),
    };
    col.not_null().auto_increment().primary_key();
    col
}
