use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    check_amount, BusStore, PassStore, StoreError, StoreResult, TripStore, WalletStore,
};
use crate::entities::wallet_transaction::TransactionKind;
use crate::models::{
    Bus, NewPass, NewTrip, Pass, PassUsage, Trip, TripCompletion, Wallet, WalletTransaction,
};

/// Trips kept in insertion order behind a single lock, so the active-trip
/// check and the insert cannot interleave.
#[derive(Default)]
pub struct MemoryTripStore {
    trips: RwLock<Vec<Trip>>,
}

#[async_trait]
impl TripStore for MemoryTripStore {
    async fn create(&self, new: NewTrip) -> StoreResult<Trip> {
        let mut trips = self.trips.write().await;
        if trips.iter().any(|t| t.active && t.user_id == new.user_id) {
            return Err(StoreError::ActiveTripExists);
        }

        let trip = Trip::from_new(Uuid::new_v4(), new);
        trips.push(trip.clone());
        Ok(trip)
    }

    async fn find_active_by_user(&self, user_id: &str) -> StoreResult<Option<Trip>> {
        let trips = self.trips.read().await;
        Ok(trips
            .iter()
            .find(|t| t.active && t.user_id == user_id)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Trip>> {
        let trips = self.trips.read().await;
        Ok(trips.iter().find(|t| t.id == id).cloned())
    }

    async fn complete(&self, id: Uuid, completion: TripCompletion) -> StoreResult<Trip> {
        let mut trips = self.trips.write().await;
        let trip = trips
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound("Trip"))?;

        if !trip.active {
            return Err(StoreError::AlreadyCompleted);
        }

        trip.apply(&completion);
        Ok(trip.clone())
    }

    async fn history_for_user(&self, user_id: &str, limit: u64) -> StoreResult<Vec<Trip>> {
        let trips = self.trips.read().await;
        Ok(trips
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn list_active(&self) -> StoreResult<Vec<Trip>> {
        let trips = self.trips.read().await;
        Ok(trips.iter().rev().filter(|t| t.active).cloned().collect())
    }

    async fn list_completed(&self, page: u64, per_page: u64) -> StoreResult<(Vec<Trip>, u64)> {
        let trips = self.trips.read().await;
        let mut completed: Vec<&Trip> = trips.iter().filter(|t| !t.active).collect();
        completed.sort_by_key(|t| std::cmp::Reverse(t.end_location.map(|l| l.timestamp)));

        let total = completed.len() as u64;
        let skip = page.saturating_sub(1).saturating_mul(per_page) as usize;
        let items = completed
            .into_iter()
            .skip(skip)
            .take(per_page as usize)
            .cloned()
            .collect();

        Ok((items, total))
    }
}

/// Wallets keyed by user id. Every balance change happens under the write
/// lock together with its ledger entry.
#[derive(Default)]
pub struct MemoryWalletStore {
    wallets: RwLock<HashMap<String, Wallet>>,
}

impl MemoryWalletStore {
    fn entry(
        kind: TransactionKind,
        amount: f64,
        description: &str,
        related_trip_id: Option<Uuid>,
    ) -> WalletTransaction {
        WalletTransaction {
            id: Uuid::new_v4(),
            kind,
            amount,
            description: description.to_string(),
            related_trip_id,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
impl WalletStore for MemoryWalletStore {
    async fn find_or_create(&self, user_id: &str) -> StoreResult<Wallet> {
        let mut wallets = self.wallets.write().await;
        let wallet = wallets
            .entry(user_id.to_string())
            .or_insert_with(|| Wallet::empty(user_id));
        Ok(wallet.clone())
    }

    async fn credit(&self, user_id: &str, amount: f64, description: &str) -> StoreResult<Wallet> {
        check_amount(amount)?;

        let mut wallets = self.wallets.write().await;
        let wallet = wallets
            .entry(user_id.to_string())
            .or_insert_with(|| Wallet::empty(user_id));

        wallet.balance += amount;
        wallet
            .transactions
            .push(Self::entry(TransactionKind::Credit, amount, description, None));
        Ok(wallet.clone())
    }

    async fn debit(
        &self,
        user_id: &str,
        amount: f64,
        description: &str,
        related_trip_id: Option<Uuid>,
    ) -> StoreResult<Wallet> {
        check_amount(amount)?;

        let mut wallets = self.wallets.write().await;
        let wallet = wallets
            .entry(user_id.to_string())
            .or_insert_with(|| Wallet::empty(user_id));

        if wallet.balance < amount {
            return Err(StoreError::InsufficientFunds {
                required: amount,
                available: wallet.balance,
            });
        }

        wallet.balance -= amount;
        wallet.transactions.push(Self::entry(
            TransactionKind::Debit,
            amount,
            description,
            related_trip_id,
        ));
        Ok(wallet.clone())
    }

    async fn transactions(&self, user_id: &str) -> StoreResult<Vec<WalletTransaction>> {
        let wallets = self.wallets.read().await;
        Ok(wallets
            .get(user_id)
            .map(|w| w.transactions.iter().rev().cloned().collect())
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MemoryPassStore {
    passes: RwLock<HashMap<Uuid, Pass>>,
    usages: RwLock<Vec<PassUsage>>,
}

impl MemoryPassStore {
    pub async fn insert(&self, pass: Pass) {
        self.passes.write().await.insert(pass.id, pass);
    }

    pub async fn usages(&self) -> Vec<PassUsage> {
        self.usages.read().await.clone()
    }
}

#[async_trait]
impl PassStore for MemoryPassStore {
    async fn create(&self, new: NewPass) -> StoreResult<Pass> {
        let pass = Pass::from_new(Uuid::new_v4(), new);
        self.passes.write().await.insert(pass.id, pass.clone());
        Ok(pass)
    }

    async fn active_for_user(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Pass>> {
        let passes = self.passes.read().await;
        Ok(passes
            .values()
            .filter(|p| p.user_id == user_id && p.is_valid_at(at))
            .max_by_key(|p| p.purchased_at)
            .cloned())
    }

    async fn usages_for_user(&self, user_id: &str) -> StoreResult<Vec<PassUsage>> {
        let usages = self.usages.read().await;
        Ok(usages
            .iter()
            .rev()
            .filter(|u| u.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Pass>> {
        Ok(self.passes.read().await.get(&id).cloned())
    }

    async fn record_usage(
        &self,
        id: Uuid,
        user_id: &str,
        location: Option<String>,
        at: DateTime<Utc>,
    ) -> StoreResult<(Pass, PassUsage)> {
        let mut passes = self.passes.write().await;
        let pass = passes.get_mut(&id).ok_or(StoreError::NotFound("Pass"))?;
        pass.usage_count += 1;

        let usage = PassUsage {
            id: Uuid::new_v4(),
            pass_id: id,
            user_id: user_id.to_string(),
            location,
            scanned_at: at,
        };
        self.usages.write().await.push(usage.clone());

        Ok((pass.clone(), usage))
    }
}

#[derive(Default)]
pub struct MemoryBusStore {
    buses: RwLock<HashMap<Uuid, Bus>>,
}

impl MemoryBusStore {
    pub async fn insert(&self, bus: Bus) {
        self.buses.write().await.insert(bus.id, bus);
    }
}

#[async_trait]
impl BusStore for MemoryBusStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Bus>> {
        Ok(self.buses.read().await.get(&id).cloned())
    }
}
