pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;

use std::sync::Arc;

pub use config::Config;
pub use error::{AppError, AppResult};

use services::{PassService, ScannerRegistry, TripService};
use store::{BusStore, Stores, WalletStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub trips: TripService,
    pub wallets: Arc<dyn WalletStore>,
    pub passes: PassService,
    pub buses: Arc<dyn BusStore>,
    pub scanners: Arc<ScannerRegistry>,
}

impl AppState {
    pub fn new(config: Config, stores: Stores) -> Self {
        let trips = TripService::new(stores.trips, stores.wallets.clone());
        let passes = PassService::new(stores.passes);
        let scanners = Arc::new(ScannerRegistry::new(
            trips.clone(),
            passes.clone(),
            config.scan_reset_delay,
        ));

        Self {
            config,
            trips,
            wallets: stores.wallets,
            passes,
            buses: stores.buses,
            scanners,
        }
    }
}
