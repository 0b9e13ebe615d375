//! Order requests domain module.
//!
//! This crate contains business rules for reseller orders (line pricing and the
//! pending → approved/rejected lifecycle), implemented purely as deterministic
//! domain logic (no IO, no HTTP, no storage).

pub mod order;

pub use order::{NewOrderLine, Order, OrderAction, OrderLine, OrderStatus};
