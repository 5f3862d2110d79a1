use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use super::{
    check_amount, BusStore, PassStore, StoreError, StoreResult, TripStore, WalletStore,
};
use crate::entities::wallet_transaction::TransactionKind;
use crate::entities::{bus, pass, pass_usage, trip, wallet, wallet_transaction};
use crate::models::{
    Bus, NewPass, NewTrip, Pass, PassUsage, Trip, TripCompletion, Wallet, WalletTransaction,
};

pub struct DbTripStore {
    db: DatabaseConnection,
}

impl DbTripStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TripStore for DbTripStore {
    async fn create(&self, new: NewTrip) -> StoreResult<Trip> {
        let started_at = new.start_location.timestamp;
        let model = trip::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(new.user_id),
            display_name: Set(new.display_name),
            bus_id: Set(new.bus_id),
            bus_name: Set(new.bus_name),
            fare_kind: Set(new.fare_kind),
            start_lat: Set(new.start_location.latitude),
            start_lng: Set(new.start_location.longitude),
            started_at: Set(started_at.into()),
            end_lat: Set(None),
            end_lng: Set(None),
            ended_at: Set(None),
            active: Set(true),
            distance: Set(None),
            fare: Set(None),
            duration: Set(None),
            created_at: Set(started_at.into()),
        };

        // The partial unique index on (user_id) WHERE active decides races
        match model.insert(&self.db).await {
            Ok(created) => Ok(created.into()),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(StoreError::ActiveTripExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_active_by_user(&self, user_id: &str) -> StoreResult<Option<Trip>> {
        let found = trip::Entity::find()
            .filter(trip::Column::UserId.eq(user_id))
            .filter(trip::Column::Active.eq(true))
            .one(&self.db)
            .await?;
        Ok(found.map(Into::into))
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Trip>> {
        let found = trip::Entity::find_by_id(id).one(&self.db).await?;
        Ok(found.map(Into::into))
    }

    async fn complete(&self, id: Uuid, completion: TripCompletion) -> StoreResult<Trip> {
        let ended_at: sea_orm::prelude::DateTimeWithTimeZone =
            completion.end_location.timestamp.into();

        // Guarded on `active` so a second completion matches no rows
        let result = trip::Entity::update_many()
            .col_expr(trip::Column::EndLat, Expr::value(completion.end_location.latitude))
            .col_expr(trip::Column::EndLng, Expr::value(completion.end_location.longitude))
            .col_expr(trip::Column::EndedAt, Expr::value(ended_at))
            .col_expr(trip::Column::Distance, Expr::value(completion.distance))
            .col_expr(trip::Column::Fare, Expr::value(completion.fare))
            .col_expr(trip::Column::Duration, Expr::value(completion.duration))
            .col_expr(trip::Column::Active, Expr::value(false))
            .filter(trip::Column::Id.eq(id))
            .filter(trip::Column::Active.eq(true))
            .exec(&self.db)
            .await?;

        let stored = trip::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(StoreError::NotFound("Trip"))?;

        if result.rows_affected == 0 {
            return Err(StoreError::AlreadyCompleted);
        }

        Ok(stored.into())
    }

    async fn history_for_user(&self, user_id: &str, limit: u64) -> StoreResult<Vec<Trip>> {
        let trips = trip::Entity::find()
            .filter(trip::Column::UserId.eq(user_id))
            .order_by_desc(trip::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(trips.into_iter().map(Into::into).collect())
    }

    async fn list_active(&self) -> StoreResult<Vec<Trip>> {
        let trips = trip::Entity::find()
            .filter(trip::Column::Active.eq(true))
            .order_by_desc(trip::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(trips.into_iter().map(Into::into).collect())
    }

    async fn list_completed(&self, page: u64, per_page: u64) -> StoreResult<(Vec<Trip>, u64)> {
        let paginator = trip::Entity::find()
            .filter(trip::Column::Active.eq(false))
            .order_by_desc(trip::Column::EndedAt)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let trips = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((trips.into_iter().map(Into::into).collect(), total))
    }
}

pub struct DbWalletStore {
    db: DatabaseConnection,
}

impl DbWalletStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert an empty wallet unless the user already has one
    async fn ensure_wallet<C: ConnectionTrait>(conn: &C, user_id: &str) -> Result<(), DbErr> {
        let model = wallet::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id.to_string()),
            balance: Set(0.0),
            created_at: Set(Utc::now().into()),
        };

        let inserted = wallet::Entity::insert(model)
            .on_conflict(
                OnConflict::column(wallet::Column::UserId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(conn)
            .await;

        match inserted {
            Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn load<C: ConnectionTrait>(conn: &C, user_id: &str) -> StoreResult<Wallet> {
        let model = wallet::Entity::find()
            .filter(wallet::Column::UserId.eq(user_id))
            .one(conn)
            .await?
            .ok_or(StoreError::NotFound("Wallet"))?;

        let transactions = wallet_transaction::Entity::find()
            .filter(wallet_transaction::Column::WalletId.eq(model.id))
            .order_by_asc(wallet_transaction::Column::CreatedAt)
            .all(conn)
            .await?;

        Ok(Wallet::from_parts(model, transactions))
    }

    /// Apply a balance change and its ledger entry in one transaction, with
    /// the wallet row locked for the duration.
    async fn apply(
        &self,
        user_id: &str,
        kind: TransactionKind,
        amount: f64,
        description: &str,
        related_trip_id: Option<Uuid>,
    ) -> StoreResult<Wallet> {
        check_amount(amount)?;

        let txn = self.db.begin().await?;
        Self::ensure_wallet(&txn, user_id).await?;

        let locked = wallet::Entity::find()
            .filter(wallet::Column::UserId.eq(user_id))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(StoreError::NotFound("Wallet"))?;

        let balance = match kind {
            TransactionKind::Credit => locked.balance + amount,
            TransactionKind::Debit => {
                if locked.balance < amount {
                    txn.rollback().await?;
                    return Err(StoreError::InsufficientFunds {
                        required: amount,
                        available: locked.balance,
                    });
                }
                locked.balance - amount
            }
        };

        let wallet_id = locked.id;
        let mut active: wallet::ActiveModel = locked.into();
        active.balance = Set(balance);
        active.update(&txn).await?;

        wallet_transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            wallet_id: Set(wallet_id),
            kind: Set(kind),
            amount: Set(amount),
            description: Set(description.to_string()),
            related_trip_id: Set(related_trip_id),
            created_at: Set(Utc::now().into()),
        }
        .insert(&txn)
        .await?;

        let wallet = Self::load(&txn, user_id).await?;
        txn.commit().await?;
        Ok(wallet)
    }
}

#[async_trait]
impl WalletStore for DbWalletStore {
    async fn find_or_create(&self, user_id: &str) -> StoreResult<Wallet> {
        Self::ensure_wallet(&self.db, user_id).await?;
        Self::load(&self.db, user_id).await
    }

    async fn credit(&self, user_id: &str, amount: f64, description: &str) -> StoreResult<Wallet> {
        self.apply(user_id, TransactionKind::Credit, amount, description, None)
            .await
    }

    async fn debit(
        &self,
        user_id: &str,
        amount: f64,
        description: &str,
        related_trip_id: Option<Uuid>,
    ) -> StoreResult<Wallet> {
        self.apply(
            user_id,
            TransactionKind::Debit,
            amount,
            description,
            related_trip_id,
        )
        .await
    }

    async fn transactions(&self, user_id: &str) -> StoreResult<Vec<WalletTransaction>> {
        let Some(model) = wallet::Entity::find()
            .filter(wallet::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?
        else {
            return Ok(Vec::new());
        };

        let transactions = wallet_transaction::Entity::find()
            .filter(wallet_transaction::Column::WalletId.eq(model.id))
            .order_by_desc(wallet_transaction::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(transactions.into_iter().map(Into::into).collect())
    }
}

pub struct DbPassStore {
    db: DatabaseConnection,
}

impl DbPassStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PassStore for DbPassStore {
    async fn create(&self, new: NewPass) -> StoreResult<Pass> {
        let created = pass::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(new.user_id),
            route_id: Set(new.route_id),
            fare: Set(new.fare),
            purchased_at: Set(new.purchased_at.into()),
            expires_at: Set(new.expires_at.into()),
            active: Set(true),
            usage_count: Set(0),
        }
        .insert(&self.db)
        .await?;
        Ok(created.into())
    }

    async fn active_for_user(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Pass>> {
        let at: sea_orm::prelude::DateTimeWithTimeZone = at.into();
        let found = pass::Entity::find()
            .filter(pass::Column::UserId.eq(user_id))
            .filter(pass::Column::Active.eq(true))
            .filter(pass::Column::ExpiresAt.gt(at))
            .order_by_desc(pass::Column::PurchasedAt)
            .one(&self.db)
            .await?;
        Ok(found.map(Into::into))
    }

    async fn usages_for_user(&self, user_id: &str) -> StoreResult<Vec<PassUsage>> {
        let usages = pass_usage::Entity::find()
            .filter(pass_usage::Column::UserId.eq(user_id))
            .order_by_desc(pass_usage::Column::ScannedAt)
            .all(&self.db)
            .await?;
        Ok(usages.into_iter().map(Into::into).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Pass>> {
        let found = pass::Entity::find_by_id(id).one(&self.db).await?;
        Ok(found.map(Into::into))
    }

    async fn record_usage(
        &self,
        id: Uuid,
        user_id: &str,
        location: Option<String>,
        at: DateTime<Utc>,
    ) -> StoreResult<(Pass, PassUsage)> {
        let txn = self.db.begin().await?;

        let locked = pass::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(StoreError::NotFound("Pass"))?;

        let usage_count = locked.usage_count + 1;
        let mut active: pass::ActiveModel = locked.into();
        active.usage_count = Set(usage_count);
        let updated = active.update(&txn).await?;

        let usage = pass_usage::ActiveModel {
            id: Set(Uuid::new_v4()),
            pass_id: Set(id),
            user_id: Set(user_id.to_string()),
            location: Set(location),
            scanned_at: Set(at.into()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok((updated.into(), usage.into()))
    }
}

pub struct DbBusStore {
    db: DatabaseConnection,
}

impl DbBusStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BusStore for DbBusStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Bus>> {
        let found = bus::Entity::find_by_id(id).one(&self.db).await?;
        Ok(found.map(Into::into))
    }
}
