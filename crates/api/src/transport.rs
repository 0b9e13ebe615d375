//! Bounded per-session channels feeding the SSE streams.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use resellsync_core::ConnectionId;
use resellsync_events::{DeliveryError, SessionHandle, StatusEvent, Transport};

#[derive(Debug)]
struct Slot {
    generation: u64,
    tx: mpsc::Sender<StatusEvent>,
}

/// [`Transport`] over tokio mpsc channels, one per attached connection.
///
/// Delivery uses `try_send` and never waits; a full queue is reported to the
/// broadcaster, which detaches the session.
#[derive(Debug, Default)]
pub struct ChannelTransport {
    slots: RwLock<HashMap<ConnectionId, Slot>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `tx` to the given attachment, replacing any older one for the
    /// same connection.
    pub fn register(&self, handle: &SessionHandle, tx: mpsc::Sender<StatusEvent>) {
        let mut slots = match self.slots.write() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.insert(
            handle.connection_id,
            Slot {
                generation: handle.generation,
                tx,
            },
        );
    }

    pub fn open_channels(&self) -> usize {
        match self.slots.read() {
            Ok(slots) => slots.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

impl Transport for ChannelTransport {
    fn deliver(&self, handle: &SessionHandle, event: &StatusEvent) -> Result<(), DeliveryError> {
        let slots = self.slots.read().map_err(|_| DeliveryError::Closed)?;
        let slot = slots
            .get(&handle.connection_id)
            .filter(|slot| slot.generation == handle.generation)
            .ok_or(DeliveryError::Closed)?;

        slot.tx.try_send(event.clone()).map_err(|err| match err {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    fn disconnect(&self, handle: &SessionHandle) {
        let mut slots = match self.slots.write() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };
        let current = slots
            .get(&handle.connection_id)
            .is_some_and(|slot| slot.generation == handle.generation);
        if current {
            // Dropping the sender ends the SSE stream once it has drained.
            slots.remove(&handle.connection_id);
            debug!(connection_id = %handle.connection_id, "transport channel closed");
        }
    }
}
