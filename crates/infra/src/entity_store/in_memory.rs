use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};

use resellsync_core::{EntityKey, EntityType, OrderId, ProductId, ShipmentId};
use resellsync_engine::EntitySnapshot;
use resellsync_events::{EventBus, InMemoryEventBus, StatusEvent};
use resellsync_inventory::{StockKey, StockLevels};
use resellsync_orders::Order;
use resellsync_shipping::{CarrierReport, Shipment};

use super::r#trait::{CommitRequest, Committed, EntityStore, StoreError};
use crate::side_effects::SideEffectApplier;

#[derive(Debug, Default)]
struct State {
    entities: HashMap<EntityKey, EntitySnapshot>,
    insertion_order: Vec<EntityKey>,
    shipment_by_order: HashMap<OrderId, ShipmentId>,
    stock: StockLevels,
    carrier_reports: HashMap<ShipmentId, CarrierReport>,
    last_committed_at: Option<DateTime<Utc>>,
}

impl State {
    /// Stamp for the next outbox event: the requested instant, raised to the
    /// previous event's stamp if the clock read ran ahead of the lock.
    fn commit_instant(&self, requested: DateTime<Utc>) -> DateTime<Utc> {
        self.last_committed_at
            .map_or(requested, |last| last.max(requested))
    }

    fn order(&self, order_id: OrderId) -> Result<&Order, StoreError> {
        let key = EntityKey::new(EntityType::Order, order_id);
        self.entities
            .get(&key)
            .and_then(EntitySnapshot::as_order)
            .ok_or(StoreError::UnknownEntity(key))
    }

    fn check_insert(&self, snapshot: &EntitySnapshot) -> Result<(), StoreError> {
        match snapshot {
            EntitySnapshot::Order(_) => Ok(()),
            EntitySnapshot::Shipment(shipment) => {
                let order = self.order(shipment.order_id())?;
                if !order.is_shippable() {
                    return Err(StoreError::Precondition(format!(
                        "order {} is not approved",
                        shipment.order_id()
                    )));
                }
                if let Some(existing) = self.shipment_by_order.get(&shipment.order_id()) {
                    return Err(StoreError::Precondition(format!(
                        "order {} already has shipment {existing}",
                        shipment.order_id()
                    )));
                }
                Ok(())
            }
            EntitySnapshot::Return(request) => {
                let order = self.order(request.order_id())?;
                if !order.is_shippable() {
                    return Err(StoreError::Precondition(format!(
                        "order {} is not approved",
                        request.order_id()
                    )));
                }
                let ordered = order.ordered_quantity(request.product_id());
                if u64::from(request.quantity()) > ordered {
                    return Err(StoreError::Precondition(format!(
                        "return quantity {} exceeds ordered quantity {ordered}",
                        request.quantity()
                    )));
                }
                Ok(())
            }
        }
    }
}

/// In-memory transactional entity store.
///
/// Intended for tests/dev. A single `RwLock` guards all state, so every commit
/// is serialized and the outbox sees events in exactly the commit order.
///
/// Event stamps are assigned under the lock and never decrease in outbox
/// order, even when callers read the clock before contending for it.
///
/// Fault injection: [`set_available`](Self::set_available) makes every
/// operation fail with `Unavailable`; [`set_commit_latency`](Self::set_commit_latency)
/// delays writes before they take the lock.
#[derive(Debug)]
pub struct InMemoryEntityStore<B = Arc<InMemoryEventBus<StatusEvent>>> {
    state: RwLock<State>,
    outbox: B,
    applier: SideEffectApplier,
    available: AtomicBool,
    commit_latency_ms: AtomicU64,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::with_outbox(Arc::new(InMemoryEventBus::new()))
    }
}

impl Default for InMemoryEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> InMemoryEntityStore<B> {
    pub fn with_outbox(outbox: B) -> Self {
        Self {
            state: RwLock::new(State::default()),
            outbox,
            applier: SideEffectApplier,
            available: AtomicBool::new(true),
            commit_latency_ms: AtomicU64::new(0),
        }
    }

    pub fn outbox(&self) -> &B {
        &self.outbox
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_commit_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.commit_latency_ms.store(ms, Ordering::SeqCst);
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        let latency = self.commit_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            thread::sleep(Duration::from_millis(latency));
        }
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

impl<B> InMemoryEntityStore<B>
where
    B: EventBus<StatusEvent>,
{
    fn append_to_outbox(&self, event: &StatusEvent) -> Result<(), StoreError> {
        self.outbox
            .publish(event.clone())
            .map_err(|err| StoreError::Unavailable(format!("outbox append failed: {err:?}")))
    }
}

impl<B> EntityStore for InMemoryEntityStore<B>
where
    B: EventBus<StatusEvent>,
{
    fn load(&self, key: EntityKey) -> Result<EntitySnapshot, StoreError> {
        let state = self.read()?;
        state
            .entities
            .get(&key)
            .cloned()
            .ok_or(StoreError::UnknownEntity(key))
    }

    fn list(&self, entity_type: EntityType) -> Result<Vec<EntitySnapshot>, StoreError> {
        let state = self.read()?;
        Ok(state
            .insertion_order
            .iter()
            .filter(|k| k.entity_type == entity_type)
            .filter_map(|k| state.entities.get(k).cloned())
            .collect())
    }

    fn commit(&self, request: CommitRequest) -> Result<Committed, StoreError> {
        let key = request.next.key();
        let mut state = self.write()?;

        let current = state.entities.get(&key).ok_or(StoreError::UnknownEntity(key))?;
        let actual = current.version();
        if !request.expected_version.matches(actual) {
            return Err(StoreError::VersionConflict {
                key,
                expected: request.expected_version.0,
                actual,
            });
        }
        if request.next.version() != request.expected_version.next() {
            return Err(StoreError::Precondition(format!(
                "next snapshot of {key} carries version {}, expected {}",
                request.next.version(),
                request.expected_version.next()
            )));
        }

        let changes = self.applier.stage(&state.stock, key, &request.effects)?;
        let committed_at = state.commit_instant(request.committed_at);
        let event = StatusEvent::transition(
            key,
            current.status_name(),
            request.next.status_name(),
            committed_at,
            request.next.version(),
        );

        // Nothing is written unless the outbox accepted the event.
        self.append_to_outbox(&event)?;
        state.last_committed_at = Some(committed_at);
        self.applier.commit(&mut state.stock, &changes);
        state.entities.insert(key, request.next.clone());

        Ok(Committed {
            snapshot: request.next,
            stock_changes: changes,
            event,
        })
    }

    fn insert(&self, snapshot: EntitySnapshot, at: DateTime<Utc>) -> Result<Committed, StoreError> {
        let key = snapshot.key();
        let mut state = self.write()?;

        if state.entities.contains_key(&key) {
            return Err(StoreError::Precondition(format!("{key} already exists")));
        }
        if snapshot.version() != 0 {
            return Err(StoreError::Precondition(format!(
                "new {key} must start at version 0"
            )));
        }
        state.check_insert(&snapshot)?;

        let committed_at = state.commit_instant(at);
        let event = StatusEvent::created(key, snapshot.status_name(), committed_at);
        self.append_to_outbox(&event)?;
        state.last_committed_at = Some(committed_at);

        if let EntitySnapshot::Shipment(shipment) = &snapshot {
            state
                .shipment_by_order
                .insert(shipment.order_id(), shipment.id_typed());
        }
        state.insertion_order.push(key);
        state.entities.insert(key, snapshot.clone());

        Ok(Committed {
            snapshot,
            stock_changes: Vec::new(),
            event,
        })
    }

    fn shipment_for_order(&self, order_id: OrderId) -> Result<Option<Shipment>, StoreError> {
        let state = self.read()?;
        Ok(state.shipment_by_order.get(&order_id).and_then(|id| {
            state
                .entities
                .get(&EntityKey::new(EntityType::Shipment, *id))
                .and_then(EntitySnapshot::as_shipment)
                .cloned()
        }))
    }

    fn stock(&self, product_id: ProductId) -> Result<Vec<(StockKey, u64)>, StoreError> {
        let state = self.read()?;
        Ok(state.stock.for_product(product_id))
    }

    fn set_stock(&self, key: StockKey, quantity: u64) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state.stock.set(key, quantity);
        Ok(())
    }

    fn record_carrier_report(
        &self,
        shipment_id: ShipmentId,
        report: CarrierReport,
    ) -> Result<(), StoreError> {
        let key = EntityKey::new(EntityType::Shipment, shipment_id);
        let mut state = self.write()?;
        if !state.entities.contains_key(&key) {
            return Err(StoreError::UnknownEntity(key));
        }
        state.carrier_reports.insert(shipment_id, report);
        Ok(())
    }

    fn carrier_report(&self, shipment_id: ShipmentId) -> Result<Option<CarrierReport>, StoreError> {
        let state = self.read()?;
        Ok(state.carrier_reports.get(&shipment_id).cloned())
    }
}
