use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use resellsync_core::{EntityKey, EntityType, ExpectedVersion, OrderId, ProductId, ShipmentId};
use resellsync_engine::EntitySnapshot;
use resellsync_events::StatusEvent;
use resellsync_inventory::{StockChange, StockDelta, StockKey};
use resellsync_shipping::{CarrierReport, Shipment};

/// A decided transition, ready to be committed under the version guard.
///
/// `next` already carries `expected_version + 1`. The event's `from_state` is
/// taken from the stored snapshot, not from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    pub expected_version: ExpectedVersion,
    pub next: EntitySnapshot,
    pub effects: Vec<StockDelta>,
    pub committed_at: DateTime<Utc>,
}

/// What a successful commit wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub snapshot: EntitySnapshot,
    pub stock_changes: Vec<StockChange>,
    pub event: StatusEvent,
}

/// Entity store operation error.
///
/// These are infrastructure outcomes (missing rows, lost races, integrity
/// alarms, outages), as opposed to state-machine decisions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unknown entity: {0}")]
    UnknownEntity(EntityKey),

    #[error("version conflict on {key} (expected: {expected}, actual: {actual})")]
    VersionConflict {
        key: EntityKey,
        expected: u64,
        actual: u64,
    },

    #[error("stock underflow: {0}")]
    StockUnderflow(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Transactional storage for orders, shipments, returns and stock.
///
/// ## Atomicity
///
/// `commit` is a compare-and-set keyed by entity id + expected version. The
/// entity write, every stock delta, and the outbox append happen in one
/// critical section: either all of them are visible afterwards or none is.
///
/// ## Outbox
///
/// Every successful `commit` and `insert` appends exactly one
/// [`StatusEvent`] to the store's outbox, in commit order.
///
/// ## Implementation requirements
///
/// - `commit` must fail with `VersionConflict` unless the stored version equals
///   `expected_version` exactly
/// - stock cells must never go below zero (`StockUnderflow`, nothing written)
/// - `insert` enforces cross-entity preconditions (approved order, one
///   shipment per order, returnable quantity)
pub trait EntityStore: Send + Sync {
    fn load(&self, key: EntityKey) -> Result<EntitySnapshot, StoreError>;

    /// All entities of one kind, oldest first.
    fn list(&self, entity_type: EntityType) -> Result<Vec<EntitySnapshot>, StoreError>;

    fn commit(&self, request: CommitRequest) -> Result<Committed, StoreError>;

    /// Insert a freshly created entity at version 0.
    fn insert(&self, snapshot: EntitySnapshot, at: DateTime<Utc>) -> Result<Committed, StoreError>;

    fn shipment_for_order(&self, order_id: OrderId) -> Result<Option<Shipment>, StoreError>;

    fn stock(&self, product_id: ProductId) -> Result<Vec<(StockKey, u64)>, StoreError>;

    /// Administrative seeding of a stock cell. Publishes nothing.
    fn set_stock(&self, key: StockKey, quantity: u64) -> Result<(), StoreError>;

    /// Record a raw carrier status string. Never touches the shipment's
    /// status or version.
    fn record_carrier_report(
        &self,
        shipment_id: ShipmentId,
        report: CarrierReport,
    ) -> Result<(), StoreError>;

    fn carrier_report(&self, shipment_id: ShipmentId) -> Result<Option<CarrierReport>, StoreError>;
}

impl<S> EntityStore for Arc<S>
where
    S: EntityStore + ?Sized,
{
    fn load(&self, key: EntityKey) -> Result<EntitySnapshot, StoreError> {
        (**self).load(key)
    }

    fn list(&self, entity_type: EntityType) -> Result<Vec<EntitySnapshot>, StoreError> {
        (**self).list(entity_type)
    }

    fn commit(&self, request: CommitRequest) -> Result<Committed, StoreError> {
        (**self).commit(request)
    }

    fn insert(&self, snapshot: EntitySnapshot, at: DateTime<Utc>) -> Result<Committed, StoreError> {
        (**self).insert(snapshot, at)
    }

    fn shipment_for_order(&self, order_id: OrderId) -> Result<Option<Shipment>, StoreError> {
        (**self).shipment_for_order(order_id)
    }

    fn stock(&self, product_id: ProductId) -> Result<Vec<(StockKey, u64)>, StoreError> {
        (**self).stock(product_id)
    }

    fn set_stock(&self, key: StockKey, quantity: u64) -> Result<(), StoreError> {
        (**self).set_stock(key, quantity)
    }

    fn record_carrier_report(
        &self,
        shipment_id: ShipmentId,
        report: CarrierReport,
    ) -> Result<(), StoreError> {
        (**self).record_carrier_report(shipment_id, report)
    }

    fn carrier_report(&self, shipment_id: ShipmentId) -> Result<Option<CarrierReport>, StoreError> {
        (**self).carrier_report(shipment_id)
    }
}
