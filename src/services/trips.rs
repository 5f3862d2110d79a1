use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::trip::FareKind;
use crate::error::{AppError, AppResult};
use crate::models::{Location, NewTrip, Trip, TripCompletion};
use crate::services::settlement::{self, SettlementOutcome};
use crate::store::{StoreError, TripStore, WalletStore};
use crate::utils::geo::{self, Coordinates};

/// Trip history is capped at this many entries
pub const HISTORY_LIMIT: u64 = 50;

/// Denormalised display fields carried by the ride flow
#[derive(Debug, Clone, Default)]
pub struct RideDetails {
    pub display_name: Option<String>,
    pub bus_id: Option<Uuid>,
    pub bus_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndTripResult {
    pub trip: Trip,
    pub settlement: SettlementOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPage {
    pub trips: Vec<Trip>,
    pub total_pages: u64,
    pub current_page: u64,
}

/// Per-user trip state machine: no active trip, then one in progress, then
/// none again once it is ended and settled.
#[derive(Clone)]
pub struct TripService {
    trips: Arc<dyn TripStore>,
    wallets: Arc<dyn WalletStore>,
}

impl TripService {
    pub fn new(trips: Arc<dyn TripStore>, wallets: Arc<dyn WalletStore>) -> Self {
        Self { trips, wallets }
    }

    /// Start a QR check-in trip, priced with the trip fare schedule
    pub async fn start_trip(&self, user_id: &str, coords: Coordinates) -> AppResult<Trip> {
        self.start_at(user_id, coords, FareKind::Trip, RideDetails::default(), Utc::now())
            .await
    }

    /// Start a bus ride, priced with the ride fare schedule
    pub async fn start_ride(
        &self,
        user_id: &str,
        coords: Coordinates,
        details: RideDetails,
    ) -> AppResult<Trip> {
        self.start_at(user_id, coords, FareKind::Ride, details, Utc::now())
            .await
    }

    pub async fn start_at(
        &self,
        user_id: &str,
        coords: Coordinates,
        fare_kind: FareKind,
        details: RideDetails,
        at: DateTime<Utc>,
    ) -> AppResult<Trip> {
        if user_id.trim().is_empty() {
            return Err(AppError::Validation("User ID is required".to_string()));
        }
        coords.validate()?;

        if self.trips.find_active_by_user(user_id).await?.is_some() {
            return Err(AppError::Conflict(
                "User already has an active trip".to_string(),
            ));
        }

        let trip = self
            .trips
            .create(NewTrip {
                user_id: user_id.to_string(),
                display_name: details.display_name,
                bus_id: details.bus_id,
                bus_name: details.bus_name,
                fare_kind,
                start_location: Location::at(coords, at),
            })
            .await?;

        tracing::info!(
            user_id,
            trip_id = %trip.id,
            fare_kind = ?fare_kind,
            latitude = coords.latitude,
            longitude = coords.longitude,
            "Trip started"
        );

        Ok(trip)
    }

    pub async fn end_trip(&self, trip_id: Uuid, coords: Coordinates) -> AppResult<EndTripResult> {
        self.end_at(trip_id, coords, Utc::now()).await
    }

    /// End a trip, record its metrics, then try to collect the fare.
    ///
    /// The trip stays ended even when settlement fails; the outcome is
    /// returned next to it.
    pub async fn end_at(
        &self,
        trip_id: Uuid,
        coords: Coordinates,
        at: DateTime<Utc>,
    ) -> AppResult<EndTripResult> {
        coords.validate()?;

        let trip = self
            .trips
            .find_by_id(trip_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Trip not found".to_string()))?;

        if !trip.active {
            return Err(AppError::InvalidState(
                "Trip is already completed".to_string(),
            ));
        }

        let distance = geo::round_distance(geo::distance_km(
            trip.start_location.coordinates(),
            coords,
        ));
        let fare = trip.fare_kind.schedule().charge(distance);
        let duration = geo::duration_minutes(trip.start_location.timestamp, at);

        if duration < 0 {
            tracing::warn!(%trip_id, duration, "Trip ended before its recorded start");
        }

        let trip = self
            .trips
            .complete(
                trip_id,
                TripCompletion {
                    end_location: Location::at(coords, at),
                    distance,
                    fare,
                    duration,
                },
            )
            .await
            .map_err(|e| match e {
                // Lost a race with another end request
                StoreError::AlreadyCompleted => {
                    AppError::InvalidState("Trip is already completed".to_string())
                }
                other => other.into(),
            })?;

        tracing::info!(
            user_id = %trip.user_id,
            %trip_id,
            distance,
            fare,
            duration,
            "Trip ended"
        );

        let settlement =
            settlement::settle(self.wallets.as_ref(), &trip.user_id, fare, trip_id).await;

        Ok(EndTripResult { trip, settlement })
    }

    pub async fn trip(&self, trip_id: Uuid) -> AppResult<Trip> {
        self.trips
            .find_by_id(trip_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Trip not found".to_string()))
    }

    pub async fn active_trip_for_user(&self, user_id: &str) -> AppResult<Option<Trip>> {
        Ok(self.trips.find_active_by_user(user_id).await?)
    }

    /// Most recent first, capped at [`HISTORY_LIMIT`]
    pub async fn trip_history_for_user(&self, user_id: &str) -> AppResult<Vec<Trip>> {
        Ok(self.trips.history_for_user(user_id, HISTORY_LIMIT).await?)
    }

    pub async fn active_trips(&self) -> AppResult<Vec<Trip>> {
        Ok(self.trips.list_active().await?)
    }

    pub async fn completed_trips(&self, page: u64, limit: u64) -> AppResult<CompletedPage> {
        if page == 0 {
            return Err(AppError::Validation("Page must be at least 1".to_string()));
        }
        if !(1..=100).contains(&limit) {
            return Err(AppError::Validation(
                "Limit must be between 1 and 100".to_string(),
            ));
        }

        let (trips, total) = self.trips.list_completed(page, limit).await?;
        Ok(CompletedPage {
            trips,
            total_pages: total.div_ceil(limit),
            current_page: page,
        })
    }
}
