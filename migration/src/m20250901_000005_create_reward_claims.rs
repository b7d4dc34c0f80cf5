use sea_orm_migration::prelude::*;

use crate::pk_column;

/// 成就（分享任务）奖励，每个成就每用户只发一次
#[derive(DeriveIden)]
enum AchievementRewards {
    Table,
    Id,
    UserId,
    AchievementName,
    RewardType,
    Amount,
    CreatedAt,
}

/// 每日首次登录奖励领取记录
#[derive(DeriveIden)]
enum DailyBonusClaims {
    Table,
    Id,
    UserId,
    ClaimDate,
    Cards,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AchievementRewards::Table)
                    .if_not_exists()
                    .col(&mut pk_column(manager, AchievementRewards::Id))
                    .col(ColumnDef::new(AchievementRewards::UserId).string_len(128).not_null())
                    .col(
                        ColumnDef::new(AchievementRewards::AchievementName)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AchievementRewards::RewardType).string_len(32).not_null())
                    .col(ColumnDef::new(AchievementRewards::Amount).double().not_null())
                    .col(
                        ColumnDef::new(AchievementRewards::CreatedAt)
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
                    .name("uq_achievement_rewards_user_achievement")
                    .table(AchievementRewards::Table)
                    .col(AchievementRewards::UserId)
                    .col(AchievementRewards::AchievementName)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DailyBonusClaims::Table)
                    .if_not_exists()
                    .col(&mut pk_column(manager, DailyBonusClaims::Id))
                    .col(ColumnDef::new(DailyBonusClaims::UserId).string_len(128).not_null())
                    .col(ColumnDef::new(DailyBonusClaims::ClaimDate).string_len(10).not_null())
                    .col(ColumnDef::new(DailyBonusClaims::Cards).big_integer().not_null())
                    .col(
                        ColumnDef::new(DailyBonusClaims::CreatedAt)
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
                    .name("uq_daily_bonus_claims_user_day")
                    .table(DailyBonusClaims::Table)
                    .col(DailyBonusClaims::UserId)
                    .col(DailyBonusClaims::ClaimDate)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DailyBonusClaims::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AchievementRewards::Table).to_owned())
            .await?;
        Ok(())
    }
}
