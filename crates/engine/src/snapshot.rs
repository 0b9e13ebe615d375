use serde::Serialize;

use resellsync_core::{AggregateRoot, Entity, EntityKey, EntityType, StateMachine};
use resellsync_orders::Order;
use resellsync_returns::ReturnRequest;
use resellsync_shipping::Shipment;

/// Current state of any synchronized entity, as loaded from the store.
///
/// Serializes as the bare entity; the caller knows which kind it asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EntitySnapshot {
    Order(Order),
    Shipment(Shipment),
    Return(ReturnRequest),
}

impl EntitySnapshot {
    pub fn entity_type(&self) -> EntityType {
        match self {
            EntitySnapshot::Order(_) => EntityType::Order,
            EntitySnapshot::Shipment(_) => EntityType::Shipment,
            EntitySnapshot::Return(_) => EntityType::ReturnRequest,
        }
    }

    pub fn key(&self) -> EntityKey {
        match self {
            EntitySnapshot::Order(o) => o.key(),
            EntitySnapshot::Shipment(s) => s.key(),
            EntitySnapshot::Return(r) => r.key(),
        }
    }

    pub fn version(&self) -> u64 {
        match self {
            EntitySnapshot::Order(o) => o.version(),
            EntitySnapshot::Shipment(s) => s.version(),
            EntitySnapshot::Return(r) => r.version(),
        }
    }

    /// Wire name of the current status.
    pub fn status_name(&self) -> &'static str {
        match self {
            EntitySnapshot::Order(o) => o.status_name(),
            EntitySnapshot::Shipment(s) => s.status_name(),
            EntitySnapshot::Return(r) => r.status_name(),
        }
    }

    pub fn as_order(&self) -> Option<&Order> {
        match self {
            EntitySnapshot::Order(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_shipment(&self) -> Option<&Shipment> {
        match self {
            EntitySnapshot::Shipment(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_return(&self) -> Option<&ReturnRequest> {
        match self {
            EntitySnapshot::Return(r) => Some(r),
            _ => None,
        }
    }
}

impl From<Order> for EntitySnapshot {
    fn from(value: Order) -> Self {
        EntitySnapshot::Order(value)
    }
}

impl From<Shipment> for EntitySnapshot {
    fn from(value: Shipment) -> Self {
        EntitySnapshot::Shipment(value)
    }
}

impl From<ReturnRequest> for EntitySnapshot {
    fn from(value: ReturnRequest) -> Self {
        EntitySnapshot::Return(value)
    }
}
