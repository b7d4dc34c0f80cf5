use sea_orm_migration::prelude::*;

use crate::pk_column;

/// 延迟发放任务：grant_at 到期后由后台任务发放一次卡片
#[derive(DeriveIden)]
enum DeferredGrantTasks {
    Table,
    Id,
    UserId,
    CreatedAt,
    GrantAt,
    IsGranted,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DeferredGrantTasks::Table)
                    .if_not_exists()
                    .col(&mut pk_column(manager, DeferredGrantTasks::Id))
                    .col(
                        ColumnDef::new(DeferredGrantTasks::UserId)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeferredGrantTasks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeferredGrantTasks::GrantAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeferredGrantTasks::IsGranted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        // 扫描到期任务
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_deferred_grant_tasks_pending")
                    .table(DeferredGrantTasks::Table)
                    .col(DeferredGrantTasks::IsGranted)
                    .col(DeferredGrantTasks::GrantAt)
                    .to_owned(),
            )
            .await?;

        // 每日上限 / 时间窗口检查
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_deferred_grant_tasks_user_created")
                    .table(DeferredGrantTasks::Table)
                    .col(DeferredGrantTasks::UserId)
                    .col(DeferredGrantTasks::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeferredGrantTasks::Table).to_owned())
            .await?;
        Ok(())
    }
}
