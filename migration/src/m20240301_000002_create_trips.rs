use sea_orm_migration::{prelude::*, schema::*, sea_orm::sea_query::extension::postgres::Type};

use super::m20240301_000001_create_buses::Bus;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(FareKind::Enum)
                    .values([FareKind::Trip, FareKind::Ride])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Trip::Table)
                    .if_not_exists()
                    .col(uuid(Trip::Id).primary_key())
                    .col(string_len(Trip::UserId, 255).not_null())
                    .col(string_len_null(Trip::DisplayName, 200))
                    .col(uuid_null(Trip::BusId))
                    .col(string_len_null(Trip::BusName, 100))
                    .col(
                        ColumnDef::new(Trip::FareKind)
                            .custom(FareKind::Enum)
                            .not_null(),
                    )
                    .col(double(Trip::StartLat).not_null())
                    .col(double(Trip::StartLng).not_null())
                    .col(timestamp_with_time_zone(Trip::StartedAt).not_null())
                    .col(double_null(Trip::EndLat))
                    .col(double_null(Trip::EndLng))
                    .col(timestamp_with_time_zone_null(Trip::EndedAt))
                    .col(boolean(Trip::Active).not_null().default(true))
                    .col(double_null(Trip::Distance))
                    .col(double_null(Trip::Fare))
                    .col(integer_null(Trip::Duration))
                    .col(
                        timestamp_with_time_zone(Trip::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_trip_bus")
                            .from(Trip::Table, Trip::BusId)
                            .to(Bus::Table, Bus::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_trip_user_created")
                    .table(Trip::Table)
                    .col(Trip::UserId)
                    .col(Trip::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // At most one open trip per rider
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_trip_user_active \
                 ON trip (user_id) WHERE active",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Trip::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(FareKind::Enum).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Trip {
    Table,
    Id,
    UserId,
    DisplayName,
    BusId,
    BusName,
    FareKind,
    StartLat,
    StartLng,
    StartedAt,
    EndLat,
    EndLng,
    EndedAt,
    Active,
    Distance,
    Fare,
    Duration,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum FareKind {
    #[sea_orm(iden = "fare_kind")]
    Enum,
    #[sea_orm(iden = "trip")]
    Trip,
    #[sea_orm(iden = "ride")]
    Ride,
}
