use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Pass::Table)
                    .if_not_exists()
                    .col(uuid(Pass::Id).primary_key())
                    .col(string_len(Pass::UserId, 255).not_null())
                    .col(string_len(Pass::RouteId, 255).not_null())
                    .col(double(Pass::Fare).not_null())
                    .col(
                        timestamp_with_time_zone(Pass::PurchasedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(timestamp_with_time_zone(Pass::ExpiresAt).not_null())
                    .col(boolean(Pass::Active).not_null().default(true))
                    .col(integer(Pass::UsageCount).not_null().default(0))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PassUsage::Table)
                    .if_not_exists()
                    .col(uuid(PassUsage::Id).primary_key())
                    .col(uuid(PassUsage::PassId).not_null())
                    .col(string_len(PassUsage::UserId, 255).not_null())
                    .col(string_len_null(PassUsage::Location, 100))
                    .col(
                        timestamp_with_time_zone(PassUsage::ScannedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pass_usage_pass")
                            .from(PassUsage::Table, PassUsage::PassId)
                            .to(Pass::Table, Pass::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PassUsage::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Pass::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Pass {
    Table,
    Id,
    UserId,
    RouteId,
    Fare,
    PurchasedAt,
    ExpiresAt,
    Active,
    UsageCount,
}

#[derive(DeriveIden)]
pub enum PassUsage {
    Table,
    Id,
    PassId,
    UserId,
    Location,
    ScannedAt,
}
