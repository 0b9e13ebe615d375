//! Entity trait: identity + continuity across state changes.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Which of the synchronized entity kinds this is.
    const ENTITY_TYPE: EntityType;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Untyped key used for store addressing and event topics.
    fn key(&self) -> EntityKey;
}

/// The entity kinds whose status is synchronized across admin sessions.
///
/// The serialized names are part of the published event wire format.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Order,
    Shipment,
    #[serde(rename = "return")]
    ReturnRequest,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Order => "order",
            EntityType::Shipment => "shipment",
            EntityType::ReturnRequest => "return",
        }
    }
}

impl core::fmt::Display for EntityType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order" => Ok(EntityType::Order),
            "shipment" => Ok(EntityType::Shipment),
            "return" => Ok(EntityType::ReturnRequest),
            other => Err(DomainError::validation(format!(
                "unknown entity type '{other}' (expected order, shipment or return)"
            ))),
        }
    }
}

/// Type-tagged entity address.
///
/// Doubles as the delivery "topic" for per-session sequencing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub entity_type: EntityType,
    pub entity_id: Uuid,
}

impl EntityKey {
    pub fn new(entity_type: EntityType, entity_id: impl Into<Uuid>) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
        }
    }
}

impl core::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.entity_id)
    }
}
