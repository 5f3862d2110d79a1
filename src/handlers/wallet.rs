use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::ensure_can_act_for;
use crate::models::{Wallet, WalletTransaction};
use crate::utils::jwt::Claims;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AddFundsRequest {
    pub amount: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductFundsRequest {
    pub amount: f64,
    pub description: Option<String>,
    pub trip_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub message: String,
    pub wallet: Wallet,
}

/// Get the wallet, creating an empty one on first access
pub async fn get_wallet(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Wallet>> {
    ensure_can_act_for(&claims, &user_id)?;

    let wallet = state.wallets.find_or_create(&user_id).await?;
    Ok(Json(wallet))
}

/// Top up a wallet
pub async fn add_funds(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<String>,
    Json(payload): Json<AddFundsRequest>,
) -> AppResult<Json<WalletResponse>> {
    ensure_can_act_for(&claims, &user_id)?;

    if payload.amount > state.config.max_top_up {
        return Err(AppError::Validation(format!(
            "Top-up cannot exceed {}",
            state.config.max_top_up
        )));
    }

    let wallet = state
        .wallets
        .credit(&user_id, payload.amount, "Wallet top-up")
        .await?;

    tracing::info!(%user_id, amount = payload.amount, balance = wallet.balance, "Funds added");

    Ok(Json(WalletResponse {
        message: "Funds added successfully".to_string(),
        wallet,
    }))
}

/// Deduct from a wallet outside the trip flow
pub async fn deduct_funds(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<String>,
    Json(payload): Json<DeductFundsRequest>,
) -> AppResult<Json<WalletResponse>> {
    ensure_can_act_for(&claims, &user_id)?;

    // Ledger entries may only point at this rider's own trips
    if let Some(trip_id) = payload.trip_id {
        let trip = state.trips.trip(trip_id).await?;
        if trip.user_id != user_id {
            return Err(AppError::Validation(
                "Trip does not belong to this wallet".to_string(),
            ));
        }
    }

    let description = payload.description.as_deref().unwrap_or("Payment");
    let wallet = state
        .wallets
        .debit(&user_id, payload.amount, description, payload.trip_id)
        .await?;

    tracing::info!(%user_id, amount = payload.amount, balance = wallet.balance, "Funds deducted");

    Ok(Json(WalletResponse {
        message: "Funds deducted successfully".to_string(),
        wallet,
    }))
}

/// Ledger entries, newest first
pub async fn transactions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<WalletTransaction>>> {
    ensure_can_act_for(&claims, &user_id)?;

    Ok(Json(state.wallets.transactions(&user_id).await?))
}
