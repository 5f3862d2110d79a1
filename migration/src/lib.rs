pub use sea_orm_migration::prelude::*;

mod m20240301_000001_create_buses;
mod m20240301_000002_create_trips;
mod m20240301_000003_create_wallets;
mod m20240301_000004_create_passes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_buses::Migration),
            Box::new(m20240301_000002_create_trips::Migration),
            Box::new(m20240301_000003_create_wallets::Migration),
            Box::new(m20240301_000004_create_passes::Migration),
        ]
    }
}
