use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use resellsync_core::{EntityKey, EntityType};

/// Immutable record of a committed status change.
///
/// This is the unit appended to the commit outbox and pushed to every admin
/// session. The serialized shape is stable:
///
/// ```json
/// {"entity_type":"return","entity_id":"…","from_state":"pending",
///  "to_state":"approved","committed_at":"2024-05-01T10:00:00Z","seq":1}
/// ```
///
/// Notes:
/// - `seq` is the entity version produced by the commit, so it increases with
///   commit order per entity.
/// - Creation events carry `from_state: null` and `seq: 0`.
/// - Consumers de-duplicate on `(entity_id, seq)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    entity_type: EntityType,
    entity_id: Uuid,
    from_state: Option<String>,
    to_state: String,
    committed_at: DateTime<Utc>,
    seq: u64,
}

impl StatusEvent {
    /// Event for a committed transition.
    pub fn transition(
        key: EntityKey,
        from_state: impl Into<String>,
        to_state: impl Into<String>,
        committed_at: DateTime<Utc>,
        seq: u64,
    ) -> Self {
        Self {
            entity_type: key.entity_type,
            entity_id: key.entity_id,
            from_state: Some(from_state.into()),
            to_state: to_state.into(),
            committed_at,
            seq,
        }
    }

    /// Event for a newly inserted entity.
    pub fn created(key: EntityKey, state: impl Into<String>, committed_at: DateTime<Utc>) -> Self {
        Self {
            entity_type: key.entity_type,
            entity_id: key.entity_id,
            from_state: None,
            to_state: state.into(),
            committed_at,
            seq: 0,
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn entity_id(&self) -> Uuid {
        self.entity_id
    }

    pub fn from_state(&self) -> Option<&str> {
        self.from_state.as_deref()
    }

    pub fn to_state(&self) -> &str {
        &self.to_state
    }

    pub fn committed_at(&self) -> DateTime<Utc> {
        self.committed_at
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Per-session sequencing topic.
    pub fn topic(&self) -> EntityKey {
        EntityKey {
            entity_type: self.entity_type,
            entity_id: self.entity_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resellsync_core::ReturnId;

    #[test]
    fn transition_event_has_stable_wire_shape() {
        let id = ReturnId::new();
        let at = Utc::now();
        let event = StatusEvent::transition(
            EntityKey::new(EntityType::ReturnRequest, id),
            "pending",
            "approved",
            at,
            1,
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["entity_type"], "return");
        assert_eq!(json["entity_id"], id.to_string());
        assert_eq!(json["from_state"], "pending");
        assert_eq!(json["to_state"], "approved");
        assert_eq!(json["seq"], 1);
        assert_eq!(
            json["committed_at"].as_str().unwrap().parse::<DateTime<Utc>>().unwrap(),
            at
        );
    }

    #[test]
    fn creation_event_has_no_from_state() {
        let key = EntityKey::new(EntityType::Order, Uuid::now_v7());
        let event = StatusEvent::created(key, "pending", Utc::now());

        assert_eq!(event.seq(), 0);
        assert_eq!(event.topic(), key);
        let json = serde_json::to_value(&event).unwrap();
        assert!(json["from_state"].is_null());
    }
}
