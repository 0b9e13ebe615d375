//! Fan-out of committed events to attached admin sessions.
//!
//! Delivery is at-least-once: a session that reconnects may ask for a replay
//! of recent events, and consumers de-duplicate on `(entity_id, seq)`. Within
//! one attachment the broadcaster itself never delivers a `seq` that is not
//! strictly greater than the last one delivered for that entity.
//!
//! A transport that cannot accept an event (queue full, peer gone) gets its
//! session detached; the client is expected to reconnect and replay.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use resellsync_core::{ConnectionId, PrincipalId};

use crate::event::StatusEvent;
use crate::session::{RegistryError, SessionHandle, SessionRegistry};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("session queue is full")]
    Full,
    #[error("session channel is closed")]
    Closed,
}

/// Push seam to connected clients.
///
/// `deliver` must not block: it is called while the broadcaster holds its
/// fan-out lock.
pub trait Transport: Send + Sync {
    fn deliver(&self, handle: &SessionHandle, event: &StatusEvent) -> Result<(), DeliveryError>;

    /// Release any per-session resources once the session is gone.
    fn disconnect(&self, _handle: &SessionHandle) {}
}

impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    fn deliver(&self, handle: &SessionHandle, event: &StatusEvent) -> Result<(), DeliveryError> {
        (**self).deliver(handle, event)
    }

    fn disconnect(&self, handle: &SessionHandle) {
        (**self).disconnect(handle)
    }
}

/// Where a reconnecting session wants its replay to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayFrom {
    /// Everything still in the replay buffer.
    Buffered,
    /// Everything published since the first buffered event committed at or
    /// after the instant.
    Since(DateTime<Utc>),
}

impl ReplayFrom {
    fn cutoff(self) -> Option<DateTime<Utc>> {
        match self {
            ReplayFrom::Buffered => None,
            ReplayFrom::Since(at) => Some(at),
        }
    }
}

/// Outcome counters for one publish or replay.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub suppressed: usize,
    pub failed: usize,
}

#[derive(Debug)]
struct ReplayBuffer {
    capacity: usize,
    events: VecDeque<StatusEvent>,
}

impl ReplayBuffer {
    fn push(&mut self, event: StatusEvent) {
        if self.capacity == 0 {
            return;
        }
        while self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Suffix of the buffer starting at the first event stamped at or after
    /// `since`, in publish order.
    ///
    /// Events published later are included even when their stamp is earlier:
    /// a client reconnecting from the last `committed_at` it saw must still
    /// get whatever followed that event.
    fn since(&self, since: Option<DateTime<Utc>>) -> Vec<StatusEvent> {
        let start = match since {
            None => 0,
            Some(t) => match self.events.iter().position(|e| e.committed_at() >= t) {
                Some(idx) => idx,
                None => return Vec::new(),
            },
        };
        self.events.iter().skip(start).cloned().collect()
    }
}

pub struct Broadcaster {
    registry: Arc<SessionRegistry>,
    transport: Arc<dyn Transport>,
    // Held for the whole fan-out so publish and replay never interleave per
    // session.
    replay: Mutex<ReplayBuffer>,
}

impl core::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Broadcaster {
    pub fn new(
        registry: Arc<SessionRegistry>,
        transport: Arc<dyn Transport>,
        replay_capacity: usize,
    ) -> Self {
        Self {
            registry,
            transport,
            replay: Mutex::new(ReplayBuffer {
                capacity: replay_capacity,
                events: VecDeque::with_capacity(replay_capacity.min(1024)),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Deliver a committed event to every attached session.
    pub fn publish(&self, event: &StatusEvent) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut buffer = match self.replay.lock() {
            Ok(buffer) => buffer,
            Err(poisoned) => poisoned.into_inner(),
        };
        buffer.push(event.clone());

        let sessions = match self.registry.list_sessions() {
            Ok(sessions) => sessions,
            Err(err) => {
                warn!(error = %err, topic = %event.topic(), "broadcast skipped");
                return report;
            }
        };
        for handle in sessions {
            self.deliver_one(&handle, event, &mut report);
        }
        drop(buffer);

        debug!(
            topic = %event.topic(),
            seq = event.seq(),
            to_state = event.to_state(),
            delivered = report.delivered,
            suppressed = report.suppressed,
            failed = report.failed,
            "event broadcast"
        );
        report
    }

    /// Re-deliver buffered events from the first one committed at or after
    /// `since` (all buffered events when `None`) to one session.
    pub fn replay(&self, handle: &SessionHandle, since: Option<DateTime<Utc>>) -> BroadcastReport {
        let buffer = match self.replay.lock() {
            Ok(buffer) => buffer,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.replay_locked(&buffer, handle, since)
    }

    /// Attach a session and optionally replay to it, atomically with respect
    /// to concurrent publishes.
    ///
    /// `on_attach` runs after the registry attach and before any replayed
    /// delivery; transports use it to open the session's channel.
    pub fn connect(
        &self,
        principal_id: PrincipalId,
        connection_id: ConnectionId,
        replay: Option<ReplayFrom>,
        on_attach: impl FnOnce(&SessionHandle),
    ) -> Result<(SessionHandle, BroadcastReport), RegistryError> {
        let buffer = match self.replay.lock() {
            Ok(buffer) => buffer,
            Err(poisoned) => poisoned.into_inner(),
        };
        let handle = self.registry.attach(principal_id, connection_id)?;
        on_attach(&handle);

        let report = if let Some(from) = replay {
            let report = self.replay_locked(&buffer, &handle, from.cutoff());
            info!(
                connection_id = %connection_id,
                replayed = report.delivered,
                "replayed buffered events"
            );
            report
        } else {
            BroadcastReport::default()
        };
        Ok((handle, report))
    }

    /// Detach a session (if still current) and release its transport.
    pub fn disconnect(&self, handle: &SessionHandle) {
        match self.registry.detach_handle(handle) {
            Ok(true) => self.transport.disconnect(handle),
            Ok(false) => {}
            Err(err) => warn!(error = %err, connection_id = %handle.connection_id, "detach failed"),
        }
    }

    /// Snapshot of the replay buffer, oldest first.
    pub fn recent(&self) -> Vec<StatusEvent> {
        match self.replay.lock() {
            Ok(buffer) => buffer.since(None),
            Err(poisoned) => poisoned.into_inner().since(None),
        }
    }

    fn replay_locked(
        &self,
        buffer: &ReplayBuffer,
        handle: &SessionHandle,
        since: Option<DateTime<Utc>>,
    ) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for event in buffer.since(since) {
            self.deliver_one(handle, &event, &mut report);
        }
        report
    }

    fn deliver_one(&self, handle: &SessionHandle, event: &StatusEvent, report: &mut BroadcastReport) {
        match self.registry.record_delivery(handle, event.topic(), event.seq()) {
            Ok(true) => {}
            Ok(false) => {
                report.suppressed += 1;
                return;
            }
            Err(err) => {
                warn!(error = %err, connection_id = %handle.connection_id, "delivery bookkeeping failed");
                report.failed += 1;
                return;
            }
        }

        match self.transport.deliver(handle, event) {
            Ok(()) => report.delivered += 1,
            Err(err) => {
                report.failed += 1;
                warn!(
                    connection_id = %handle.connection_id,
                    principal_id = %handle.principal_id,
                    topic = %event.topic(),
                    seq = event.seq(),
                    error = %err,
                    "delivery failed; dropping session"
                );
                if let Err(err) = self.registry.detach_handle(handle) {
                    warn!(error = %err, connection_id = %handle.connection_id, "detach failed");
                }
                self.transport.disconnect(handle);
            }
        }
    }
}
