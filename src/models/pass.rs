use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{pass, pass_usage};

/// A monthly pass, validated by scanning rather than charged per trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pass {
    pub id: Uuid,
    pub user_id: String,
    pub route_id: String,
    pub fare: f64,
    pub purchased_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
    pub usage_count: i32,
}

impl Pass {
    pub fn from_new(id: Uuid, new: NewPass) -> Self {
        Self {
            id,
            user_id: new.user_id,
            route_id: new.route_id,
            fare: new.fare,
            purchased_at: new.purchased_at,
            expires_at: new.expires_at,
            active: true,
            usage_count: 0,
        }
    }

    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.active && at < self.expires_at
    }

    /// The JSON a scanner reads back through the pass branch of the decoder
    pub fn qr_payload(&self) -> String {
        serde_json::json!({
            "type": "pass",
            "passId": self.id,
            "userId": self.user_id,
            "expiryDate": self.expires_at,
            "routeId": self.route_id,
        })
        .to_string()
    }
}

#[derive(Debug, Clone)]
pub struct NewPass {
    pub user_id: String,
    pub route_id: String,
    pub fare: f64,
    pub purchased_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<pass::Model> for Pass {
    fn from(m: pass::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            route_id: m.route_id,
            fare: m.fare,
            purchased_at: m.purchased_at.with_timezone(&Utc),
            expires_at: m.expires_at.with_timezone(&Utc),
            active: m.active,
            usage_count: m.usage_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassUsage {
    pub id: Uuid,
    pub pass_id: Uuid,
    pub user_id: String,
    pub location: Option<String>,
    pub scanned_at: DateTime<Utc>,
}

impl From<pass_usage::Model> for PassUsage {
    fn from(m: pass_usage::Model) -> Self {
        Self {
            id: m.id,
            pass_id: m.pass_id,
            user_id: m.user_id,
            location: m.location,
            scanned_at: m.scanned_at.with_timezone(&Utc),
        }
    }
}
