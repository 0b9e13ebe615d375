//! Transactional entity store boundary.
//!
//! The store is the only owner of durable state. It applies decided
//! transitions under a version guard and appends the resulting events to its
//! outbox in the same critical section.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEntityStore;
pub use r#trait::{CommitRequest, Committed, EntityStore, StoreError};
