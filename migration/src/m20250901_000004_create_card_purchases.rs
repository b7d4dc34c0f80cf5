use sea_orm_migration::prelude::*;

use crate::pk_column;

/// 可购买的卡包类型
#[derive(DeriveIden)]
enum CardTypes {
    Table,
    Id,
    CardType,
    Price,
    CardCount,
}

/// 购买记录（用于每日限购统计）
#[derive(DeriveIden)]
enum CardPurchases {
    Table,
    Id,
    UserId,
    CardType,
    Price,
    CardCount,
    PurchasedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CardTypes::Table)
                    .if_not_exists()
                    .col(&mut pk_column(manager, CardTypes::Id))
                    .col(ColumnDef::new(CardTypes::CardType).string_len(64).not_null())
                    .col(ColumnDef::new(CardTypes::Price).double().not_null())
                    .col(ColumnDef::new(CardTypes::CardCount).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_card_types_card_type")
                    .table(CardTypes::Table)
                    .col(CardTypes::CardType)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CardPurchases::Table)
                    .if_not_exists()
                    .col(&mut pk_column(manager, CardPurchases::Id))
                    .col(ColumnDef::new(CardPurchases::UserId).string_len(128).not_null())
                    .col(ColumnDef::new(CardPurchases::CardType).string_len(64).not_null())
                    .col(ColumnDef::new(CardPurchases::Price).double().not_null())
                    .col(ColumnDef::new(CardPurchases::CardCount).big_integer().not_null())
                    .col(
                        ColumnDef::new(CardPurchases::PurchasedAt)
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
                    .name("idx_card_purchases_user_day")
                    .table(CardPurchases::Table)
                    .col(CardPurchases::UserId)
                    .col(CardPurchases::PurchasedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CardPurchases::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CardTypes::Table).to_owned())
            .await?;
        Ok(())
    }
}
