use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Reject NaN and out-of-range fixes before they reach the distance math
    pub fn validate(&self) -> AppResult<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(AppError::Validation(format!(
                "Latitude must be between -90 and 90, got {}",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(AppError::Validation(format!(
                "Longitude must be between -180 and 180, got {}",
                self.longitude
            )));
        }
        Ok(())
    }
}

/// Calculate distance between two coordinates using Haversine formula
/// Returns distance in kilometers
pub fn haversine_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

pub fn distance_km(a: Coordinates, b: Coordinates) -> f64 {
    haversine_distance(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Round to two decimal places, the precision distances are stored at
pub fn round_distance(km: f64) -> f64 {
    (km * 100.0).round() / 100.0
}

/// Whole minutes between two instants. Negative when `end` precedes `start`.
pub fn duration_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i32 {
    let millis = (end - start).num_milliseconds() as f64;
    (millis / 60_000.0).round() as i32
}

/// A (base, per-km, floor) triple converting distance into a fare
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FareSchedule {
    pub base: f64,
    pub per_km: f64,
    pub minimum: f64,
}

/// Fare used by bus rides started with a bus reference
pub const RIDE_FARE_SCHEDULE: FareSchedule = FareSchedule {
    base: 20.0,
    per_km: 8.0,
    minimum: 0.0,
};

/// Fare used by QR check-in trips
pub const TRIP_FARE_SCHEDULE: FareSchedule = FareSchedule {
    base: 5.0,
    per_km: 2.0,
    minimum: 5.0,
};

impl FareSchedule {
    /// Unrounded fare for a distance
    pub fn fare(&self, distance_km: f64) -> f64 {
        self.minimum.max(self.base + distance_km * self.per_km)
    }

    /// Fare rounded to whole currency units, as persisted on a trip
    pub fn charge(&self, distance_km: f64) -> f64 {
        self.fare(distance_km).round()
    }
}
