//! `resellsync-events`: status events and their fan-out to admin sessions.
//!
//! - [`StatusEvent`]: the immutable, sequenced wire record of a committed change
//! - [`EventBus`] / [`InMemoryEventBus`]: the commit outbox the store appends to
//! - [`SessionRegistry`]: live admin push channels and their delivery bookkeeping
//! - [`Broadcaster`]: delivers events to every session through a [`Transport`]

pub mod broadcaster;
pub mod bus;
pub mod event;
pub mod in_memory_bus;
pub mod session;

pub use broadcaster::{BroadcastReport, Broadcaster, DeliveryError, ReplayFrom, Transport};
pub use bus::{EventBus, Subscription};
pub use event::StatusEvent;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use session::{AdminSession, RegistryError, SessionHandle, SessionRegistry};
