//! `resellsync-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the entity/state-machine contracts, the version guard and the
//! domain error model shared by the order, shipment and return modules.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;

pub use aggregate::{AggregateRoot, Decision, ExpectedVersion, StateMachine};
pub use entity::{Entity, EntityKey, EntityType};
pub use error::{DomainError, DomainResult};
pub use id::{ConnectionId, OrderId, PrincipalId, ProductId, ResellerId, ReturnId, ShipmentId};
