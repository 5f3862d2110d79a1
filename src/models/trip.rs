use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::trip::{self, FareKind};
use crate::utils::geo::Coordinates;

/// A GPS fix with the instant it was taken
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

impl Location {
    pub fn at(coords: Coordinates, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude: coords.latitude,
            longitude: coords.longitude,
            timestamp,
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// A single journey from check-in to check-out.
///
/// `end_location`, `distance`, `fare` and `duration` are either all present
/// (the trip has ended) or all absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: Uuid,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bus_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bus_name: Option<String>,
    pub fare_kind: FareKind,
    pub start_location: Location,
    pub end_location: Option<Location>,
    pub active: bool,
    pub distance: Option<f64>,
    pub fare: Option<f64>,
    pub duration: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl Trip {
    pub fn from_new(id: Uuid, new: NewTrip) -> Self {
        Self {
            id,
            user_id: new.user_id,
            display_name: new.display_name,
            bus_id: new.bus_id,
            bus_name: new.bus_name,
            fare_kind: new.fare_kind,
            created_at: new.start_location.timestamp,
            start_location: new.start_location,
            end_location: None,
            active: true,
            distance: None,
            fare: None,
            duration: None,
        }
    }

    pub fn apply(&mut self, completion: &TripCompletion) {
        self.end_location = Some(completion.end_location);
        self.distance = Some(completion.distance);
        self.fare = Some(completion.fare);
        self.duration = Some(completion.duration);
        self.active = false;
    }
}

impl From<trip::Model> for Trip {
    fn from(m: trip::Model) -> Self {
        let end_location = match (m.end_lat, m.end_lng, m.ended_at) {
            (Some(latitude), Some(longitude), Some(ended_at)) => Some(Location {
                latitude,
                longitude,
                timestamp: ended_at.with_timezone(&Utc),
            }),
            _ => None,
        };

        Self {
            id: m.id,
            user_id: m.user_id,
            display_name: m.display_name,
            bus_id: m.bus_id,
            bus_name: m.bus_name,
            fare_kind: m.fare_kind,
            start_location: Location {
                latitude: m.start_lat,
                longitude: m.start_lng,
                timestamp: m.started_at.with_timezone(&Utc),
            },
            end_location,
            active: m.active,
            distance: m.distance,
            fare: m.fare,
            duration: m.duration,
            created_at: m.created_at.with_timezone(&Utc),
        }
    }
}

/// Everything needed to open a trip
#[derive(Debug, Clone)]
pub struct NewTrip {
    pub user_id: String,
    pub display_name: Option<String>,
    pub bus_id: Option<Uuid>,
    pub bus_name: Option<String>,
    pub fare_kind: FareKind,
    pub start_location: Location,
}

/// The metrics written exactly once when a trip ends
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripCompletion {
    pub end_location: Location,
    pub distance: f64,
    pub fare: f64,
    pub duration: i32,
}
