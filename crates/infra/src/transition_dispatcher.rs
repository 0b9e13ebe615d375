//! Transition execution pipeline (application-level orchestration).
//!
//! ```text
//! request_transition
//!   ↓
//! 1. Load the current snapshot from the store
//!   ↓
//! 2. Check the caller's expected version against it
//!   ↓
//! 3. Decide (pure state machine: next snapshot + stock deltas)
//!   ↓
//! 4. Commit under the version guard; the store applies stock deltas and
//!    appends the event to its outbox in the same critical section
//! ```
//!
//! Broadcasting is downstream of the outbox and never on this path. Nothing
//! here retries: a `VersionConflict` is returned to the caller, who refreshes
//! and decides again.

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use resellsync_core::{
    DomainError, EntityKey, EntityType, ExpectedVersion, OrderId, PrincipalId, ProductId,
    ResellerId, ReturnId, ShipmentId,
};
use resellsync_engine::{EntitySnapshot, decide};
use resellsync_events::StatusEvent;
use resellsync_inventory::{StockChange, StockKey, StockLocation};
use resellsync_orders::{NewOrderLine, Order};
use resellsync_returns::ReturnRequest;
use resellsync_shipping::{CarrierReport, Shipment, ShipmentDetails};

use crate::entity_store::{CommitRequest, EntityStore, StoreError};

/// Why a transition request did not commit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("illegal {entity_type} transition from '{from}' via '{requested}'")]
    IllegalTransition {
        entity_type: EntityType,
        from: String,
        requested: String,
    },

    #[error("unknown entity: {0}")]
    UnknownEntity(EntityKey),

    #[error("version conflict (expected: {expected}, actual: {actual})")]
    VersionConflict { expected: u64, actual: u64 },

    #[error("stock underflow: {0}")]
    StockUnderflow(String),

    /// The store refused the commit for a reason a retry cannot fix.
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for TransitionError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::UnknownEntity(key) => TransitionError::UnknownEntity(key),
            StoreError::VersionConflict {
                expected, actual, ..
            } => TransitionError::VersionConflict { expected, actual },
            StoreError::StockUnderflow(msg) => TransitionError::StockUnderflow(msg),
            StoreError::Precondition(msg) => TransitionError::Precondition(msg),
            StoreError::Unavailable(msg) => TransitionError::Unavailable(msg),
        }
    }
}

/// Why a create/record/seed request did not commit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CreateError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("unknown entity: {0}")]
    UnknownEntity(EntityKey),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for CreateError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::UnknownEntity(key) => CreateError::UnknownEntity(key),
            StoreError::Precondition(msg) => CreateError::Precondition(msg),
            StoreError::VersionConflict { .. } | StoreError::StockUnderflow(_) => {
                CreateError::Precondition(value.to_string())
            }
            StoreError::Unavailable(msg) => CreateError::Unavailable(msg),
        }
    }
}

impl From<DomainError> for CreateError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => CreateError::Validation(msg),
            DomainError::InvariantViolation(msg) => CreateError::Precondition(msg),
            other => CreateError::Precondition(other.to_string()),
        }
    }
}

/// Result of a committed transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub entity: EntitySnapshot,
    pub new_state: &'static str,
    pub committed_version: u64,
    pub side_effects_applied: Vec<StockChange>,
    pub event: StatusEvent,
}

/// Shipment snapshot joined with the last carrier-reported status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShipmentView {
    #[serde(flatten)]
    pub shipment: Shipment,
    pub carrier_report: Option<CarrierReport>,
}

/// Command gateway core: transitions, creation, and snapshot reads over an
/// [`EntityStore`].
#[derive(Debug)]
pub struct TransitionDispatcher<S> {
    store: S,
}

impl<S> TransitionDispatcher<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> TransitionDispatcher<S>
where
    S: EntityStore,
{
    /// Validate, decide and commit one status transition.
    ///
    /// The expected version is checked before deciding, so a request made
    /// against a stale view reports `VersionConflict` even when the action
    /// would also be illegal from the current state.
    pub fn request_transition(
        &self,
        entity_type: EntityType,
        entity_id: Uuid,
        action: &str,
        expected_version: ExpectedVersion,
        actor: PrincipalId,
    ) -> Result<TransitionOutcome, TransitionError> {
        let key = EntityKey::new(entity_type, entity_id);
        let current = self.store.load(key)?;

        if !expected_version.matches(current.version()) {
            debug!(
                entity = %key,
                actor = %actor,
                expected = expected_version.0,
                actual = current.version(),
                "stale transition request"
            );
            return Err(TransitionError::VersionConflict {
                expected: expected_version.0,
                actual: current.version(),
            });
        }

        let now = Utc::now();
        let transition =
            decide(&current, action, now).map_err(|err| decision_error(err, &current, action))?;

        let committed = self
            .store
            .commit(CommitRequest {
                expected_version,
                next: transition.next,
                effects: transition.effects,
                committed_at: now,
            })
            .map_err(|err| {
                match &err {
                    StoreError::VersionConflict { .. } => {
                        debug!(entity = %key, actor = %actor, error = %err, "lost commit race")
                    }
                    StoreError::StockUnderflow(_) => {
                        error!(entity = %key, actor = %actor, action, "transition refused: stock underflow")
                    }
                    StoreError::Precondition(_) => {
                        error!(entity = %key, actor = %actor, action, error = %err, "store rejected commit")
                    }
                    _ => {}
                }
                TransitionError::from(err)
            })?;

        info!(
            entity = %key,
            actor = %actor,
            from = transition.from_state,
            to = transition.to_state,
            version = committed.snapshot.version(),
            stock_changes = committed.stock_changes.len(),
            "transition committed"
        );

        Ok(TransitionOutcome {
            new_state: transition.to_state,
            committed_version: committed.snapshot.version(),
            entity: committed.snapshot,
            side_effects_applied: committed.stock_changes,
            event: committed.event,
        })
    }

    pub fn place_order(
        &self,
        reseller_id: ResellerId,
        lines: Vec<NewOrderLine>,
        notes: Option<String>,
        actor: PrincipalId,
    ) -> Result<Order, CreateError> {
        let now = Utc::now();
        let order = Order::place(OrderId::new(), reseller_id, lines, notes, now)?;
        self.store.insert(order.clone().into(), now)?;

        info!(
            order_id = %order.id_typed(),
            reseller_id = %reseller_id,
            actor = %actor,
            total = order.total_amount(),
            "order placed"
        );
        Ok(order)
    }

    /// Create the (single) shipment for an approved order.
    pub fn create_shipment(
        &self,
        order_id: OrderId,
        details: ShipmentDetails,
        actor: PrincipalId,
    ) -> Result<Shipment, CreateError> {
        let order = self.order(order_id)?;
        let now = Utc::now();
        let shipment = Shipment::create(ShipmentId::new(), &order, details, now)?;
        self.store.insert(shipment.clone().into(), now)?;

        info!(
            shipment_id = %shipment.id_typed(),
            order_id = %order_id,
            actor = %actor,
            carrier = shipment.carrier(),
            "shipment created"
        );
        Ok(shipment)
    }

    /// File a pending return for a product on an approved order.
    pub fn file_return(
        &self,
        order_id: OrderId,
        product_id: ProductId,
        reseller_id: ResellerId,
        quantity: u32,
        reason: String,
        actor: PrincipalId,
    ) -> Result<ReturnRequest, CreateError> {
        let order = self.order(order_id)?;
        if order.reseller_id() != reseller_id {
            return Err(CreateError::Validation(format!(
                "order {order_id} does not belong to reseller {reseller_id}"
            )));
        }

        let now = Utc::now();
        let request = ReturnRequest::file(ReturnId::new(), &order, product_id, quantity, reason, now)?;
        self.store.insert(request.clone().into(), now)?;

        info!(
            return_id = %request.id_typed(),
            order_id = %order_id,
            product_id = %product_id,
            quantity,
            actor = %actor,
            "return filed"
        );
        Ok(request)
    }

    /// Record a raw carrier-reported status; the shipment state machine is
    /// not involved.
    pub fn record_carrier_status(
        &self,
        shipment_id: ShipmentId,
        status_text: &str,
        actor: PrincipalId,
    ) -> Result<CarrierReport, CreateError> {
        let status_text = status_text.trim();
        if status_text.is_empty() {
            return Err(CreateError::Validation("status_text cannot be empty".to_string()));
        }

        let report = CarrierReport {
            status_text: status_text.to_string(),
            reported_at: Utc::now(),
        };
        self.store.record_carrier_report(shipment_id, report.clone())?;

        debug!(shipment_id = %shipment_id, actor = %actor, status = status_text, "carrier status recorded");
        Ok(report)
    }

    /// Administrative stock seeding.
    pub fn set_stock(
        &self,
        product_id: ProductId,
        location: StockLocation,
        quantity: u64,
        actor: PrincipalId,
    ) -> Result<(), CreateError> {
        let key = StockKey {
            product_id,
            location,
        };
        self.store.set_stock(key, quantity)?;
        info!(product_id = %product_id, location = %location, quantity, actor = %actor, "stock set");
        Ok(())
    }

    pub fn order(&self, order_id: OrderId) -> Result<Order, StoreError> {
        let key = EntityKey::new(EntityType::Order, order_id);
        self.store
            .load(key)?
            .as_order()
            .cloned()
            .ok_or(StoreError::UnknownEntity(key))
    }

    pub fn shipment(&self, shipment_id: ShipmentId) -> Result<ShipmentView, StoreError> {
        let key = EntityKey::new(EntityType::Shipment, shipment_id);
        let shipment = self
            .store
            .load(key)?
            .as_shipment()
            .cloned()
            .ok_or(StoreError::UnknownEntity(key))?;
        let carrier_report = self.store.carrier_report(shipment_id)?;
        Ok(ShipmentView {
            shipment,
            carrier_report,
        })
    }

    pub fn shipment_for_order(&self, order_id: OrderId) -> Result<Option<Shipment>, StoreError> {
        self.store.shipment_for_order(order_id)
    }

    pub fn return_request(&self, return_id: ReturnId) -> Result<ReturnRequest, StoreError> {
        let key = EntityKey::new(EntityType::ReturnRequest, return_id);
        self.store
            .load(key)?
            .as_return()
            .cloned()
            .ok_or(StoreError::UnknownEntity(key))
    }

    pub fn list(&self, entity_type: EntityType) -> Result<Vec<EntitySnapshot>, StoreError> {
        self.store.list(entity_type)
    }

    pub fn stock(&self, product_id: ProductId) -> Result<Vec<(StockKey, u64)>, StoreError> {
        self.store.stock(product_id)
    }
}

/// Map a state-machine refusal onto the gateway's error kinds.
fn decision_error(err: DomainError, current: &EntitySnapshot, action: &str) -> TransitionError {
    match err {
        DomainError::IllegalTransition {
            entity_type,
            from,
            requested,
        } => TransitionError::IllegalTransition {
            entity_type,
            from,
            requested,
        },
        DomainError::VersionConflict { expected, actual } => {
            TransitionError::VersionConflict { expected, actual }
        }
        DomainError::StockUnderflow(msg) => TransitionError::StockUnderflow(msg),
        DomainError::Validation(_) | DomainError::InvariantViolation(_) | DomainError::InvalidId(_) => {
            TransitionError::IllegalTransition {
                entity_type: current.entity_type(),
                from: current.status_name().to_string(),
                requested: action.to_string(),
            }
        }
    }
}
