//! Registry of connected admin push channels.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use resellsync_core::{ConnectionId, EntityKey, PrincipalId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("session registry lock poisoned")]
    Poisoned,
}

/// Identifies one attachment of a connection.
///
/// Re-attaching the same connection id yields a handle with a new
/// `generation`; deliveries addressed to an older handle are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionHandle {
    pub connection_id: ConnectionId,
    pub principal_id: PrincipalId,
    pub generation: u64,
    pub attached_at: DateTime<Utc>,
}

/// Registry-owned bookkeeping for one live session.
#[derive(Debug, Clone)]
pub struct AdminSession {
    handle: SessionHandle,
    last_delivered: HashMap<EntityKey, u64>,
}

impl AdminSession {
    fn new(handle: SessionHandle) -> Self {
        Self {
            handle,
            last_delivered: HashMap::new(),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle
    }

    /// Highest `seq` delivered to this session for a topic.
    pub fn last_delivered(&self, topic: &EntityKey) -> Option<u64> {
        self.last_delivered.get(topic).copied()
    }
}

/// Tracks live sessions keyed by connection id.
///
/// Concurrent attach/detach/delivery bookkeeping is serialized by a single
/// `RwLock`; reads (`list_sessions`, `get`) take the shared side.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<ConnectionId, AdminSession>>,
    generations: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach (or re-attach) a connection for a principal.
    ///
    /// Idempotent per connection id: a second attach replaces the prior handle
    /// and resets its per-topic delivery bookkeeping.
    pub fn attach(
        &self,
        principal_id: PrincipalId,
        connection_id: ConnectionId,
    ) -> Result<SessionHandle, RegistryError> {
        let handle = SessionHandle {
            connection_id,
            principal_id,
            generation: self.generations.fetch_add(1, Ordering::Relaxed) + 1,
            attached_at: Utc::now(),
        };

        let mut sessions = self.sessions.write().map_err(|_| RegistryError::Poisoned)?;
        let replaced = sessions.insert(connection_id, AdminSession::new(handle));
        drop(sessions);

        match replaced {
            Some(old) => info!(
                connection_id = %connection_id,
                principal_id = %principal_id,
                previous_generation = old.handle.generation,
                generation = handle.generation,
                "admin session re-attached"
            ),
            None => info!(
                connection_id = %connection_id,
                principal_id = %principal_id,
                generation = handle.generation,
                "admin session attached"
            ),
        }

        Ok(handle)
    }

    /// Remove a connection regardless of generation.
    pub fn detach(&self, connection_id: ConnectionId) -> Result<Option<SessionHandle>, RegistryError> {
        let mut sessions = self.sessions.write().map_err(|_| RegistryError::Poisoned)?;
        let removed = sessions.remove(&connection_id).map(|s| s.handle);
        drop(sessions);

        if let Some(handle) = removed {
            info!(
                connection_id = %connection_id,
                principal_id = %handle.principal_id,
                generation = handle.generation,
                "admin session detached"
            );
        }
        Ok(removed)
    }

    /// Remove a connection only if `handle` is still its current attachment.
    ///
    /// Used by transports tearing down a stream, so a stale stream cannot
    /// detach the session that replaced it.
    pub fn detach_handle(&self, handle: &SessionHandle) -> Result<bool, RegistryError> {
        let mut sessions = self.sessions.write().map_err(|_| RegistryError::Poisoned)?;
        let current = sessions
            .get(&handle.connection_id)
            .is_some_and(|s| s.handle.generation == handle.generation);
        if !current {
            return Ok(false);
        }
        sessions.remove(&handle.connection_id);
        drop(sessions);

        info!(
            connection_id = %handle.connection_id,
            principal_id = %handle.principal_id,
            generation = handle.generation,
            "admin session detached"
        );
        Ok(true)
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionHandle>, RegistryError> {
        let sessions = self.sessions.read().map_err(|_| RegistryError::Poisoned)?;
        let mut handles: Vec<SessionHandle> = sessions.values().map(|s| s.handle).collect();
        handles.sort_by_key(|h| h.generation);
        Ok(handles)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn get(&self, connection_id: ConnectionId) -> Result<Option<AdminSession>, RegistryError> {
        let sessions = self.sessions.read().map_err(|_| RegistryError::Poisoned)?;
        Ok(sessions.get(&connection_id).cloned())
    }

    /// Whether `handle` is the current attachment of its connection.
    pub fn is_current(&self, handle: &SessionHandle) -> bool {
        self.sessions
            .read()
            .map(|s| {
                s.get(&handle.connection_id)
                    .is_some_and(|cur| cur.handle.generation == handle.generation)
            })
            .unwrap_or(false)
    }

    /// Atomically advance the per-topic delivery cursor.
    ///
    /// Returns `true` when `seq` is new for this session and topic (and records
    /// it), `false` for duplicates, stale sequence numbers, and removed or
    /// superseded handles.
    pub fn record_delivery(
        &self,
        handle: &SessionHandle,
        topic: EntityKey,
        seq: u64,
    ) -> Result<bool, RegistryError> {
        let mut sessions = self.sessions.write().map_err(|_| RegistryError::Poisoned)?;
        let Some(session) = sessions.get_mut(&handle.connection_id) else {
            return Ok(false);
        };
        if session.handle.generation != handle.generation {
            return Ok(false);
        }

        match session.last_delivered.get(&topic) {
            Some(&last) if seq <= last => {
                debug!(
                    connection_id = %handle.connection_id,
                    topic = %topic,
                    seq,
                    last,
                    "suppressed already-delivered event"
                );
                Ok(false)
            }
            _ => {
                session.last_delivered.insert(topic, seq);
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resellsync_core::EntityType;
    use uuid::Uuid;

    fn topic() -> EntityKey {
        EntityKey::new(EntityType::Shipment, Uuid::now_v7())
    }

    #[test]
    fn attach_detach_and_list() {
        let registry = SessionRegistry::new();
        let a = registry.attach(PrincipalId::new(), ConnectionId::new()).unwrap();
        let b = registry.attach(PrincipalId::new(), ConnectionId::new()).unwrap();

        assert_eq!(registry.session_count(), 2);
        assert_eq!(registry.list_sessions().unwrap(), vec![a, b]);

        assert_eq!(registry.detach(a.connection_id).unwrap(), Some(a));
        assert_eq!(registry.detach(a.connection_id).unwrap(), None);
        assert_eq!(registry.list_sessions().unwrap(), vec![b]);
    }

    #[test]
    fn reattach_replaces_handle_and_resets_bookkeeping() {
        let registry = SessionRegistry::new();
        let principal = PrincipalId::new();
        let conn = ConnectionId::new();
        let t = topic();

        let first = registry.attach(principal, conn).unwrap();
        assert!(registry.record_delivery(&first, t, 3).unwrap());

        let second = registry.attach(principal, conn).unwrap();
        assert!(second.generation > first.generation);
        assert_eq!(registry.session_count(), 1);
        assert_eq!(registry.get(conn).unwrap().unwrap().last_delivered(&t), None);

        // The superseded handle can neither receive nor detach.
        assert!(!registry.record_delivery(&first, t, 4).unwrap());
        assert!(!registry.detach_handle(&first).unwrap());
        assert!(registry.is_current(&second));

        // The new handle may receive seq 3 again after the reset.
        assert!(registry.record_delivery(&second, t, 3).unwrap());
    }

    #[test]
    fn record_delivery_only_accepts_increasing_seq() {
        let registry = SessionRegistry::new();
        let h = registry.attach(PrincipalId::new(), ConnectionId::new()).unwrap();
        let t = topic();

        assert!(registry.record_delivery(&h, t, 0).unwrap());
        assert!(!registry.record_delivery(&h, t, 0).unwrap());
        assert!(registry.record_delivery(&h, t, 2).unwrap());
        assert!(!registry.record_delivery(&h, t, 1).unwrap());

        // Topics are independent.
        assert!(registry.record_delivery(&h, topic(), 1).unwrap());
    }

    #[test]
    fn deliveries_to_detached_sessions_are_dropped() {
        let registry = SessionRegistry::new();
        let h = registry.attach(PrincipalId::new(), ConnectionId::new()).unwrap();
        assert!(registry.detach_handle(&h).unwrap());
        assert!(!registry.record_delivery(&h, topic(), 1).unwrap());
    }

    #[test]
    fn concurrent_attach_and_detach_leave_a_consistent_registry() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(SessionRegistry::new());
        let mut joins = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            joins.push(thread::spawn(move || {
                let conn = ConnectionId::new();
                for _ in 0..50 {
                    let h = registry.attach(PrincipalId::new(), conn).unwrap();
                    registry.detach_handle(&h).unwrap();
                }
                registry.attach(PrincipalId::new(), conn).unwrap()
            }));
        }

        let survivors: Vec<SessionHandle> = joins.into_iter().map(|j| j.join().unwrap()).collect();
        assert_eq!(registry.session_count(), survivors.len());
        for h in survivors {
            assert!(registry.is_current(&h));
        }
    }
}
