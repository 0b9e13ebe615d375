//! Aggregate root + state machine contracts for versioned entities.

use chrono::{DateTime, Utc};

use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};

/// Aggregate root marker + minimal interface.
///
/// This is intentionally small so each module can decide how it models its
/// status lifecycle without bringing in any infrastructure concerns.
pub trait AggregateRoot: Entity {
    /// Monotonically increasing version of the entity's state.
    ///
    /// Starts at 0 when the entity is created and increments by exactly one per
    /// committed transition.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for a transition request.
///
/// A request stating `ExpectedVersion(v)` may only commit against an entity
/// whose current version is exactly `v`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ExpectedVersion(pub u64);

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        self.0 == actual
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::VersionConflict {
                expected: self.0,
                actual,
            })
        }
    }

    /// The version the entity will carry once a transition commits.
    pub fn next(self) -> u64 {
        self.0 + 1
    }
}

/// Outcome of a legal transition: the next snapshot plus side effects that
/// must commit in the same atomic scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision<S, E> {
    pub next: S,
    pub effects: Vec<E>,
}

impl<S, E> Decision<S, E> {
    pub fn without_effects(next: S) -> Self {
        Self {
            next,
            effects: Vec::new(),
        }
    }
}

/// Status state machine semantics (pure, deterministic).
///
/// `decide` never mutates `self`. It returns the full next snapshot, already
/// carrying `version() + 1`, and the list of side effects. Persisting both
/// atomically under a version guard is the store's job.
pub trait StateMachine: AggregateRoot + Sized {
    type Status: Copy + Eq + core::fmt::Debug;
    type Action: Clone + core::fmt::Debug;
    type Effect: Clone + core::fmt::Debug;

    fn status(&self) -> Self::Status;

    /// Stable wire name of the current status (e.g. `"in_transit"`).
    fn status_name(&self) -> &'static str;

    /// Decide whether `action` is legal from the current status and compute
    /// the resulting snapshot. `at` is the commit timestamp.
    fn decide(
        &self,
        action: &Self::Action,
        at: DateTime<Utc>,
    ) -> DomainResult<Decision<Self, Self::Effect>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_version_matches_only_itself() {
        assert!(ExpectedVersion(3).matches(3));
        assert!(!ExpectedVersion(3).matches(4));
        assert_eq!(ExpectedVersion(3).next(), 4);
    }

    #[test]
    fn check_reports_both_versions() {
        let err = ExpectedVersion(0).check(1).unwrap_err();
        assert_eq!(
            err,
            DomainError::VersionConflict {
                expected: 0,
                actual: 1
            }
        );
    }
}
