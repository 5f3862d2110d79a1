//! Persistence seams for trips, wallets, passes and buses.
//!
//! Each trait has a `sea-orm` implementation in [`database`] and an
//! in-memory one in [`memory`]. Both enforce the same invariants: at most
//! one active trip per user, completion happens once, and a debit never
//! takes a balance below zero.

pub mod database;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, DbErr};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Bus, NewPass, NewTrip, Pass, PassUsage, Trip, TripCompletion, Wallet, WalletTransaction,
};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("trip is already completed")]
    AlreadyCompleted,
    #[error("user already has an active trip")]
    ActiveTripExists,
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: f64, available: f64 },
    #[error("invalid amount: {0}")]
    InvalidAmount(f64),
    #[error(transparent)]
    Database(#[from] DbErr),
}

/// Amounts moved through a wallet must be positive and finite
pub(crate) fn check_amount(amount: f64) -> StoreResult<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(StoreError::InvalidAmount(amount));
    }
    Ok(())
}

#[async_trait]
pub trait TripStore: Send + Sync {
    /// Fails with [`StoreError::ActiveTripExists`] when the user already has an open trip
    async fn create(&self, new: NewTrip) -> StoreResult<Trip>;

    async fn find_active_by_user(&self, user_id: &str) -> StoreResult<Option<Trip>>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Trip>>;

    /// Writes the end-of-trip metrics and flips `active` off in one step
    async fn complete(&self, id: Uuid, completion: TripCompletion) -> StoreResult<Trip>;

    /// Newest first
    async fn history_for_user(&self, user_id: &str, limit: u64) -> StoreResult<Vec<Trip>>;

    /// Newest first
    async fn list_active(&self) -> StoreResult<Vec<Trip>>;

    /// One page of ended trips, most recently ended first, plus the total count
    async fn list_completed(&self, page: u64, per_page: u64) -> StoreResult<(Vec<Trip>, u64)>;
}

#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn find_or_create(&self, user_id: &str) -> StoreResult<Wallet>;

    async fn credit(&self, user_id: &str, amount: f64, description: &str) -> StoreResult<Wallet>;

    /// Balance check and deduction are one atomic unit per wallet
    async fn debit(
        &self,
        user_id: &str,
        amount: f64,
        description: &str,
        related_trip_id: Option<Uuid>,
    ) -> StoreResult<Wallet>;

    /// Newest first
    async fn transactions(&self, user_id: &str) -> StoreResult<Vec<WalletTransaction>>;
}

#[async_trait]
pub trait PassStore: Send + Sync {
    async fn create(&self, new: NewPass) -> StoreResult<Pass>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Pass>>;

    /// The most recently purchased pass that is active and unexpired at `at`
    async fn active_for_user(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Pass>>;

    /// Newest first
    async fn usages_for_user(&self, user_id: &str) -> StoreResult<Vec<PassUsage>>;

    /// Bumps the usage counter and appends a usage record
    async fn record_usage(
        &self,
        id: Uuid,
        user_id: &str,
        location: Option<String>,
        at: DateTime<Utc>,
    ) -> StoreResult<(Pass, PassUsage)>;
}

#[async_trait]
pub trait BusStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Bus>>;
}

/// The full set of stores the service runs on
#[derive(Clone)]
pub struct Stores {
    pub trips: Arc<dyn TripStore>,
    pub wallets: Arc<dyn WalletStore>,
    pub passes: Arc<dyn PassStore>,
    pub buses: Arc<dyn BusStore>,
}

impl Stores {
    pub fn database(db: DatabaseConnection) -> Self {
        Self {
            trips: Arc::new(database::DbTripStore::new(db.clone())),
            wallets: Arc::new(database::DbWalletStore::new(db.clone())),
            passes: Arc::new(database::DbPassStore::new(db.clone())),
            buses: Arc::new(database::DbBusStore::new(db)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            trips: Arc::new(memory::MemoryTripStore::default()),
            wallets: Arc::new(memory::MemoryWalletStore::default()),
            passes: Arc::new(memory::MemoryPassStore::default()),
            buses: Arc::new(memory::MemoryBusStore::default()),
        }
    }
}
