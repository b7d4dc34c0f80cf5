use sea_orm_migration::prelude::*;

use crate::pk_column;

/// 奖品配置表
/// - prize_type: points / card / material / thanks
/// - probability_weight: 相对权重（非百分比），同一玩法内按总和归一
/// - quota: 0 表示不限量；distributed_count 为已发放数量
#[derive(DeriveIden)]
enum Prizes {
    Table,
    Id,
    Name,
    PrizeType,
    Value,
    ProbabilityWeight,
    PlayMode,
    IsTimeBased,
    StartTime,
    EndTime,
    Quota,
    DistributedCount,
    ImageRef,
    CreatedAt,
    UpdatedAt,
}

/// 实物奖品中奖记录（线下履约用，只追加不修改）
#[derive(DeriveIden)]
enum PhysicalPrizeAwards {
    Table,
    Id,
    UserId,
    PrizeId,
    PrizeName,
    WonAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Prizes::Table)
                    .if_not_exists()
                    .col(&mut pk_column(manager, Prizes::Id))
                    .col(ColumnDef::new(Prizes::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Prizes::PrizeType).string_len(32).not_null())
                    .col(ColumnDef::new(Prizes::Value).double().not_null().default(0.0))
                    .col(
                        ColumnDef::new(Prizes::ProbabilityWeight)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(ColumnDef::new(Prizes::PlayMode).string_len(64).not_null())
                    .col(
                        ColumnDef::new(Prizes::IsTimeBased)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Prizes::StartTime).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Prizes::EndTime).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Prizes::Quota).big_integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Prizes::DistributedCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Prizes::ImageRef).string_len(255).not_null().default(""))
                    .col(ColumnDef::new(Prizes::CreatedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Prizes::UpdatedAt).timestamp_with_time_zone().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_prizes_play_mode")
                    .table(Prizes::Table)
                    .col(Prizes::PlayMode)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PhysicalPrizeAwards::Table)
                    .if_not_exists()
                    .col(&mut pk_column(manager, PhysicalPrizeAwards::Id))
                    .col(
                        ColumnDef::new(PhysicalPrizeAwards::UserId)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PhysicalPrizeAwards::PrizeId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PhysicalPrizeAwards::PrizeName)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PhysicalPrizeAwards::WonAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_physical_prize_awards_user_id")
                    .table(PhysicalPrizeAwards::Table)
                    .col(PhysicalPrizeAwards::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PhysicalPrizeAwards::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Prizes::Table).to_owned())
            .await?;
        Ok(())
    }
}
