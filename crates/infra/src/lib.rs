//! Infrastructure layer: entity store, side effects, gateway core, config,
//! and the outbox-to-broadcaster pump.

pub mod config;
pub mod entity_store;
pub mod side_effects;
pub mod transition_dispatcher;
pub mod workers;


pub use config::{AppConfig, ConfigError};
pub use entity_store::{CommitRequest, Committed, EntityStore, InMemoryEntityStore, StoreError};
pub use side_effects::SideEffectApplier;
pub use transition_dispatcher::{
    CreateError, ShipmentView, TransitionDispatcher, TransitionError, TransitionOutcome,
};
pub use workers::{BroadcastPump, WorkerHandle};
