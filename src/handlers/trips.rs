use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::auth::ensure_can_act_for;
use crate::models::Trip;
use crate::services::EndTripResult;
use crate::utils::geo::Coordinates;
use crate::utils::jwt::Claims;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTripRequest {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
pub struct EndTripRequest {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize)]
pub struct ActiveTripResponse {
    pub active: bool,
    pub trip: Option<Trip>,
}

/// Check a rider in
pub async fn start_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StartTripRequest>,
) -> AppResult<(StatusCode, Json<Trip>)> {
    ensure_can_act_for(&claims, &payload.user_id)?;

    let trip = state
        .trips
        .start_trip(
            &payload.user_id,
            Coordinates::new(payload.latitude, payload.longitude),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(trip)))
}

/// Check a rider out and settle the fare
pub async fn end_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(trip_id): Path<Uuid>,
    Json(payload): Json<EndTripRequest>,
) -> AppResult<Json<EndTripResult>> {
    let trip = state.trips.trip(trip_id).await?;
    ensure_can_act_for(&claims, &trip.user_id)?;

    let result = state
        .trips
        .end_trip(trip_id, Coordinates::new(payload.latitude, payload.longitude))
        .await?;

    Ok(Json(result))
}

/// The rider's open trip, if any
pub async fn active_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<String>,
) -> AppResult<Json<ActiveTripResponse>> {
    ensure_can_act_for(&claims, &user_id)?;

    let trip = state.trips.active_trip_for_user(&user_id).await?;
    Ok(Json(ActiveTripResponse {
        active: trip.is_some(),
        trip,
    }))
}

/// Rider's trips, newest first
pub async fn trip_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<Trip>>> {
    ensure_can_act_for(&claims, &user_id)?;

    let trips = state.trips.trip_history_for_user(&user_id).await?;
    Ok(Json(trips))
}
