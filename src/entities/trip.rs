use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::utils::geo::{FareSchedule, RIDE_FARE_SCHEDULE, TRIP_FARE_SCHEDULE};

/// Which flow started the trip, and so which fare schedule prices it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "fare_kind")]
#[serde(rename_all = "lowercase")]
pub enum FareKind {
    #[sea_orm(string_value = "trip")]
    Trip,
    #[sea_orm(string_value = "ride")]
    Ride,
}

impl FareKind {
    pub fn schedule(self) -> FareSchedule {
        match self {
            FareKind::Trip => TRIP_FARE_SCHEDULE,
            FareKind::Ride => RIDE_FARE_SCHEDULE,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "trip")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: String,
    pub display_name: Option<String>,
    pub bus_id: Option<Uuid>,
    pub bus_name: Option<String>,
    pub fare_kind: FareKind,
    pub start_lat: f64,
    pub start_lng: f64,
    pub started_at: DateTimeWithTimeZone,
    pub end_lat: Option<f64>,
    pub end_lng: Option<f64>,
    pub ended_at: Option<DateTimeWithTimeZone>,
    pub active: bool,
    pub distance: Option<f64>,
    pub fare: Option<f64>,
    pub duration: Option<i32>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bus::Entity",
        from = "Column::BusId",
        to = "super::bus::Column::Id"
    )]
    Bus,
}

impl Related<super::bus::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bus.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
