use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::ensure_can_act_for;
use crate::models::{Pass, PassUsage};
use crate::services::passes::PurchasedPass;
use crate::utils::jwt::Claims;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasePassRequest {
    pub user_id: String,
    pub route_id: String,
    pub fare: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Option<String>,
}

impl UserQuery {
    fn required(self) -> AppResult<String> {
        self.user_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest("User ID is required".to_string()))
    }
}

/// Issue a monthly pass
pub async fn purchase_pass(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<PurchasePassRequest>,
) -> AppResult<(StatusCode, Json<PurchasedPass>)> {
    ensure_can_act_for(&claims, &payload.user_id)?;

    let purchased = state
        .passes
        .purchase(&payload.user_id, &payload.route_id, payload.fare)
        .await?;

    Ok((StatusCode::CREATED, Json(purchased)))
}

/// The rider's current pass, 404 when none is usable
pub async fn current_pass(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<Pass>> {
    let user_id = query.required()?;
    ensure_can_act_for(&claims, &user_id)?;

    Ok(Json(state.passes.current_pass(&user_id).await?))
}

pub async fn usage_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<Vec<PassUsage>>> {
    let user_id = query.required()?;
    ensure_can_act_for(&claims, &user_id)?;

    Ok(Json(state.passes.usage_history(&user_id).await?))
}
