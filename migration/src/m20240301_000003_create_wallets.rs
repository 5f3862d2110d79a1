use sea_orm_migration::{prelude::*, schema::*, sea_orm::sea_query::extension::postgres::Type};

use super::m20240301_000002_create_trips::Trip;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(TransactionKind::Enum)
                    .values([TransactionKind::Credit, TransactionKind::Debit])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Wallet::Table)
                    .if_not_exists()
                    .col(uuid(Wallet::Id).primary_key())
                    .col(string_len(Wallet::UserId, 255).not_null().unique_key())
                    .col(
                        double(Wallet::Balance)
                            .not_null()
                            .default(0.0)
                            .check(Expr::col(Wallet::Balance).gte(0.0)),
                    )
                    .col(
                        timestamp_with_time_zone(Wallet::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WalletTransaction::Table)
                    .if_not_exists()
                    .col(uuid(WalletTransaction::Id).primary_key())
                    .col(uuid(WalletTransaction::WalletId).not_null())
                    .col(
                        ColumnDef::new(WalletTransaction::Kind)
                            .custom(TransactionKind::Enum)
                            .not_null(),
                    )
                    .col(
                        double(WalletTransaction::Amount)
                            .not_null()
                            .check(Expr::col(WalletTransaction::Amount).gt(0.0)),
                    )
                    .col(string_len(WalletTransaction::Description, 255).not_null())
                    .col(uuid_null(WalletTransaction::RelatedTripId))
                    .col(
                        timestamp_with_time_zone(WalletTransaction::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_wallet_transaction_wallet")
                            .from(WalletTransaction::Table, WalletTransaction::WalletId)
                            .to(Wallet::Table, Wallet::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_wallet_transaction_trip")
                            .from(WalletTransaction::Table, WalletTransaction::RelatedTripId)
                            .to(Trip::Table, Trip::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WalletTransaction::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Wallet::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(TransactionKind::Enum).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Wallet {
    Table,
    Id,
    UserId,
    Balance,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum WalletTransaction {
    Table,
    Id,
    WalletId,
    Kind,
    Amount,
    Description,
    RelatedTripId,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum TransactionKind {
    #[sea_orm(iden = "transaction_kind")]
    Enum,
    #[sea_orm(iden = "credit")]
    Credit,
    #[sea_orm(iden = "debit")]
    Debit,
}
