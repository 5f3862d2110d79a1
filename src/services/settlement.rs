use serde::Serialize;
use uuid::Uuid;

use crate::store::{StoreError, WalletStore};

pub const TRIP_FARE_DESCRIPTION: &str = "Trip fare";

/// How charging a finished trip against the rider's wallet went.
///
/// Never an error type: every branch is reported back alongside the ended trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SettlementOutcome {
    #[serde(rename_all = "camelCase")]
    Success {
        amount_charged: f64,
        remaining_balance: f64,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    InsufficientFunds {
        required: f64,
        available: f64,
        message: String,
    },
    Error { message: String },
}

impl SettlementOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SettlementOutcome::Success { .. })
    }

    fn charged(fare: f64, remaining_balance: f64) -> Self {
        SettlementOutcome::Success {
            amount_charged: fare,
            remaining_balance,
            message: format!(
                "₹{:.2} deducted from wallet. New balance: ₹{:.2}",
                fare, remaining_balance
            ),
        }
    }

    fn short(required: f64, available: f64) -> Self {
        SettlementOutcome::InsufficientFunds {
            required,
            available,
            message: format!(
                "Insufficient funds. Required: ₹{:.2}, Available: ₹{:.2}",
                required, available
            ),
        }
    }
}

/// Charge `fare` to the user's wallet for the given trip.
///
/// The debit is only attempted when the balance covers it. A concurrent
/// debit that wins the race shows up as insufficient funds; any other store
/// failure becomes [`SettlementOutcome::Error`].
pub async fn settle(
    wallets: &dyn WalletStore,
    user_id: &str,
    fare: f64,
    trip_id: Uuid,
) -> SettlementOutcome {
    let wallet = match wallets.find_or_create(user_id).await {
        Ok(wallet) => wallet,
        Err(e) => {
            tracing::error!(user_id, %trip_id, error = %e, "Failed to load wallet for settlement");
            return SettlementOutcome::Error {
                message: format!("Payment error: {}", e),
            };
        }
    };

    if fare <= 0.0 {
        return SettlementOutcome::charged(0.0, wallet.balance);
    }

    if wallet.balance < fare {
        tracing::info!(
            user_id,
            %trip_id,
            fare,
            balance = wallet.balance,
            "Fare not collected, insufficient funds"
        );
        return SettlementOutcome::short(fare, wallet.balance);
    }

    match wallets
        .debit(user_id, fare, TRIP_FARE_DESCRIPTION, Some(trip_id))
        .await
    {
        Ok(updated) => {
            tracing::info!(user_id, %trip_id, fare, balance = updated.balance, "Fare collected");
            SettlementOutcome::charged(fare, updated.balance)
        }
        Err(StoreError::InsufficientFunds {
            required,
            available,
        }) => {
            tracing::info!(user_id, %trip_id, fare, available, "Balance changed before debit");
            SettlementOutcome::short(required, available)
        }
        Err(e) => {
            tracing::error!(user_id, %trip_id, fare, error = %e, "Fare debit failed");
            SettlementOutcome::Error {
                message: format!("Payment error: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::entities::wallet_transaction::TransactionKind;
    use crate::models::{Wallet, WalletTransaction};
    use crate::store::memory::MemoryWalletStore;
    use crate::store::StoreResult;

    #[tokio::test]
    async fn test_settle_success() {
        let wallets = MemoryWalletStore::default();
        wallets.credit("rider", 100.0, "Wallet top-up").await.unwrap();
        let trip_id = Uuid::new_v4();

        let outcome = settle(&wallets, "rider", 11.0, trip_id).await;
        assert_eq!(
            outcome,
            SettlementOutcome::Success {
                amount_charged: 11.0,
                remaining_balance: 89.0,
                message: "₹11.00 deducted from wallet. New balance: ₹89.00".to_string(),
            }
        );

        let wallet = wallets.find_or_create("rider").await.unwrap();
        let debit = wallet.transactions.last().unwrap();
        assert_eq!(debit.kind, TransactionKind::Debit);
        assert_eq!(debit.related_trip_id, Some(trip_id));
        assert_eq!(debit.description, TRIP_FARE_DESCRIPTION);
    }

    #[tokio::test]
    async fn test_settle_insufficient_leaves_wallet_alone() {
        let wallets = MemoryWalletStore::default();
        wallets.credit("rider", 5.0, "Wallet top-up").await.unwrap();

        let outcome = settle(&wallets, "rider", 11.0, Uuid::new_v4()).await;
        assert!(matches!(
            outcome,
            SettlementOutcome::InsufficientFunds { required, available, .. }
                if required == 11.0 && available == 5.0
        ));

        let wallet = wallets.find_or_create("rider").await.unwrap();
        assert_eq!(wallet.balance, 5.0);
        assert_eq!(wallet.transactions.len(), 1);
    }

    #[tokio::test]
    async fn test_settle_creates_missing_wallet() {
        let wallets = MemoryWalletStore::default();

        let outcome = settle(&wallets, "newcomer", 5.0, Uuid::new_v4()).await;
        assert!(matches!(outcome, SettlementOutcome::InsufficientFunds { available, .. } if available == 0.0));
        assert_eq!(wallets.find_or_create("newcomer").await.unwrap().balance, 0.0);
    }

    struct BrokenWallets;

    #[async_trait]
    impl WalletStore for BrokenWallets {
        async fn find_or_create(&self, user_id: &str) -> StoreResult<Wallet> {
            let mut wallet = Wallet::empty(user_id);
            wallet.balance = 50.0;
            Ok(wallet)
        }

        async fn credit(&self, _: &str, _: f64, _: &str) -> StoreResult<Wallet> {
            Err(StoreError::Database(sea_orm::DbErr::Custom("offline".into())))
        }

        async fn debit(&self, _: &str, _: f64, _: &str, _: Option<Uuid>) -> StoreResult<Wallet> {
            Err(StoreError::Database(sea_orm::DbErr::Custom("offline".into())))
        }

        async fn transactions(&self, _: &str) -> StoreResult<Vec<WalletTransaction>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_not_raised() {
        let outcome = settle(&BrokenWallets, "rider", 11.0, Uuid::new_v4()).await;
        match outcome {
            SettlementOutcome::Error { message } => assert!(message.contains("offline")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_outcome_wire_shape() {
        let json = serde_json::to_value(SettlementOutcome::short(10.0, 5.0)).unwrap();
        assert_eq!(json["status"], "insufficient_funds");
        assert_eq!(json["required"], 10.0);
        assert_eq!(json["available"], 5.0);
    }
}
