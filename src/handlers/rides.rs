use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::ensure_can_act_for;
use crate::models::{Bus, Ref, Trip};
use crate::services::trips::{CompletedPage, RideDetails};
use crate::store::BusStore;
use crate::utils::geo::Coordinates;
use crate::utils::jwt::Claims;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRideRequest {
    pub user_id: String,
    pub user_name: Option<String>,
    pub bus: Ref<Bus>,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
pub struct CompletedQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Turn a bus reference into the stored bus record. Expanded references are
/// looked up by id too, so the name written onto the ride is the stored one.
pub async fn resolve_bus(buses: &dyn BusStore, bus: Ref<Bus>) -> AppResult<Bus> {
    let id = match bus {
        Ref::Expanded(bus) => bus.id,
        Ref::Id(id) => Uuid::parse_str(&id)
            .map_err(|_| AppError::Validation("Invalid bus ID format".to_string()))?,
    };

    buses
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Bus not found".to_string()))
}

/// Start a ride on a specific bus
pub async fn start_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StartRideRequest>,
) -> AppResult<(StatusCode, Json<Trip>)> {
    ensure_can_act_for(&claims, &payload.user_id)?;

    let bus = resolve_bus(state.buses.as_ref(), payload.bus).await?;
    let details = RideDetails {
        display_name: Some(
            payload
                .user_name
                .unwrap_or_else(|| "Unknown User".to_string()),
        ),
        bus_id: Some(bus.id),
        bus_name: Some(bus.name),
    };

    let ride = state
        .trips
        .start_ride(
            &payload.user_id,
            Coordinates::new(payload.latitude, payload.longitude),
            details,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ride)))
}

/// All rides in progress (admin)
pub async fn active_rides(State(state): State<AppState>) -> AppResult<Json<Vec<Trip>>> {
    Ok(Json(state.trips.active_trips().await?))
}

/// Ended rides, most recent first, paginated (admin)
pub async fn completed_rides(
    State(state): State<AppState>,
    Query(query): Query<CompletedQuery>,
) -> AppResult<Json<CompletedPage>> {
    let page = state
        .trips
        .completed_trips(query.page.unwrap_or(1), query.limit.unwrap_or(20))
        .await?;
    Ok(Json(page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryBusStore;

    #[tokio::test]
    async fn test_resolve_bus_reference() {
        let store = MemoryBusStore::default();
        let bus = Bus {
            id: Uuid::new_v4(),
            name: "Margao Express".to_string(),
        };
        store.insert(bus.clone()).await;

        let by_id = resolve_bus(&store, Ref::Id(bus.id.to_string())).await.unwrap();
        assert_eq!(by_id, bus);

        let expanded = resolve_bus(&store, Ref::Expanded(bus.clone())).await.unwrap();
        assert_eq!(expanded, bus);

        assert!(matches!(
            resolve_bus(&store, Ref::Id(Uuid::new_v4().to_string())).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            resolve_bus(&store, Ref::Id("bus-12".to_string())).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_expanded_bus_must_exist_and_keeps_stored_name() {
        let store = MemoryBusStore::default();
        let bus = Bus {
            id: Uuid::new_v4(),
            name: "Margao Express".to_string(),
        };
        store.insert(bus.clone()).await;

        let renamed = Bus {
            id: bus.id,
            name: "Free Rides Forever".to_string(),
        };
        assert_eq!(
            resolve_bus(&store, Ref::Expanded(renamed)).await.unwrap().name,
            "Margao Express"
        );

        let unknown = Bus {
            id: Uuid::new_v4(),
            name: "Ghost Bus".to_string(),
        };
        assert!(matches!(
            resolve_bus(&store, Ref::Expanded(unknown)).await,
            Err(AppError::NotFound(_))
        ));
    }
}
