use sea_orm_migration::prelude::*;

use crate::m20261019_000001_create_deposit_intents::DepositIntents;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DepositTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DepositTransactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DepositTransactions::DepositIntentId)
                            .string()
                            .not_null(),
                    )
                    // One row per external hash, system-wide
                    .col(
                        ColumnDef::new(DepositTransactions::TxHash)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(DepositTransactions::Amount).string().not_null())
                    .col(ColumnDef::new(DepositTransactions::Currency).string().not_null())
                    .col(ColumnDef::new(DepositTransactions::TxType).string().not_null())
                    .col(ColumnDef::new(DepositTransactions::Status).string().not_null())
                    .col(
                        ColumnDef::new(DepositTransactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DepositTransactions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deposit_transactions_intent")
                            .from(DepositTransactions::Table, DepositTransactions::DepositIntentId)
                            .to(DepositIntents::Table, DepositIntents::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_deposit_transactions_intent")
                    .table(DepositTransactions::Table)
                    .col(DepositTransactions::DepositIntentId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DepositTransactions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DepositTransactions {
    Table,
    Id,
    DepositIntentId,
    TxHash,
    Amount,
    Currency,
    TxType,
    Status,
    CreatedAt,
    UpdatedAt,
}
