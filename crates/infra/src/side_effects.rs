//! Stock side effects of committed transitions.
//!
//! Only called from inside a store's commit critical section. Deltas are
//! staged against the current cells first; the caller writes the entity and
//! then [`commit`](SideEffectApplier::commit)s the staged changes, so a failed
//! stage leaves both stock and entity untouched.

use tracing::{error, warn};

use resellsync_core::{DomainError, EntityKey};
use resellsync_inventory::{StockChange, StockDelta, StockLevels};

use crate::entity_store::StoreError;

#[derive(Debug, Default, Clone, Copy)]
pub struct SideEffectApplier;

impl SideEffectApplier {
    /// Stage `effects` for the transition on `key`.
    ///
    /// Underflow is a data-integrity alarm: it is logged at `error` and the
    /// whole transition fails. A cell that would exceed `u64::MAX` is refused
    /// as a `Precondition`. Quantities are never clamped.
    pub fn stage(
        &self,
        levels: &StockLevels,
        key: EntityKey,
        effects: &[StockDelta],
    ) -> Result<Vec<StockChange>, StoreError> {
        if effects.is_empty() {
            return Ok(Vec::new());
        }

        levels.stage(effects).map_err(|err| match err {
            DomainError::StockUnderflow(msg) => {
                error!(entity = %key, detail = %msg, "stock underflow; transition refused");
                StoreError::StockUnderflow(msg)
            }
            other => {
                warn!(entity = %key, error = %other, "stock staging failed");
                StoreError::Precondition(other.to_string())
            }
        })
    }

    pub fn commit(&self, levels: &mut StockLevels, changes: &[StockChange]) {
        levels.commit(changes);
    }
}
