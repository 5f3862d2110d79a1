use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::wallet_transaction::{self, TransactionKind};
use crate::entities::wallet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_trip_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<wallet_transaction::Model> for WalletTransaction {
    fn from(m: wallet_transaction::Model) -> Self {
        Self {
            id: m.id,
            kind: m.kind,
            amount: m.amount,
            description: m.description,
            related_trip_id: m.related_trip_id,
            created_at: m.created_at.with_timezone(&Utc),
        }
    }
}

/// A rider's balance and its append-only ledger, oldest entry first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: String,
    pub balance: f64,
    pub transactions: Vec<WalletTransaction>,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    pub fn empty(user_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            balance: 0.0,
            transactions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn from_parts(model: wallet::Model, transactions: Vec<wallet_transaction::Model>) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            balance: model.balance,
            transactions: transactions.into_iter().map(Into::into).collect(),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }

    /// Credits minus debits over the whole ledger
    pub fn ledger_total(&self) -> f64 {
        self.transactions
            .iter()
            .map(|t| match t.kind {
                TransactionKind::Credit => t.amount,
                TransactionKind::Debit => -t.amount,
            })
            .sum()
    }
}
