use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::bus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    pub id: Uuid,
    pub name: String,
}

impl From<bus::Model> for Bus {
    fn from(m: bus::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
        }
    }
}

/// A reference that arrives either as a bare id or as the expanded record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ref<T> {
    Id(String),
    Expanded(T),
}
