//! Transition engine: pure decision logic across all synchronized entities.
//!
//! Given an entity snapshot and a requested action, decide legality and
//! compute `(next snapshot, side effects)`. Never touches storage; the caller
//! commits the result under a version guard.

pub mod engine;
pub mod snapshot;

pub use engine::{decide, decide_action, Transition, TransitionAction};
pub use snapshot::EntitySnapshot;
