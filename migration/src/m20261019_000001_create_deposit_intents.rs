//! Deposit intents: one row per deposit-address request, status is the
//! serialization point for the approval/processing workflow.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DepositIntents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DepositIntents::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DepositIntents::UserId).string().not_null())
                    .col(ColumnDef::new(DepositIntents::Currency).string().not_null())
                    .col(ColumnDef::new(DepositIntents::Network).string().not_null())
                    .col(ColumnDef::new(DepositIntents::TargetCurrency).string())
                    .col(ColumnDef::new(DepositIntents::TargetNetwork).string())
                    .col(ColumnDef::new(DepositIntents::Address).string().not_null())
                    .col(ColumnDef::new(DepositIntents::Memo).string())
                    .col(ColumnDef::new(DepositIntents::Status).string().not_null())
                    .col(ColumnDef::new(DepositIntents::RejectionReason).string())
                    .col(ColumnDef::new(DepositIntents::ErrorMessage).string())
                    .col(
                        ColumnDef::new(DepositIntents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DepositIntents::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Recovery and stats query by status
        manager
            .create_index(
                Index::create()
                    .name("idx_deposit_intents_status")
                    .table(DepositIntents::Table)
                    .col(DepositIntents::Status)
                    .to_owned(),
            )
            .await?;

        // Webhook deliveries are matched by deposit address
        manager
            .create_index(
                Index::create()
                    .name("idx_deposit_intents_address")
                    .table(DepositIntents::Table)
                    .col(DepositIntents::Address)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DepositIntents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum DepositIntents {
    Table,
    Id,
    UserId,
    Currency,
    Network,
    TargetCurrency,
    TargetNetwork,
    Address,
    Memo,
    Status,
    RejectionReason,
    ErrorMessage,
    CreatedAt,
    UpdatedAt,
}
