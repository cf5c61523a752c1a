//! Change records staged in the outbox.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Caller-supplied mutation data. Opaque to the store and the engine.
pub type PayloadMap = serde_json::Map<String, serde_json::Value>;

/// Store-assigned record identifier.
///
/// Ids are assigned in insertion order and are never reused, so ordering
/// by id is delivery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    /// Creates a record id from its raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A pending change waiting to be accepted by the remote endpoint.
///
/// Serialized with camelCase keys; this is both the request body sent to
/// the endpoint and the document stored in the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    /// Primary key, assigned by the store.
    pub id: RecordId,
    /// The mutation to replicate.
    pub payload: PayloadMap,
    /// Client-side correlation id, `temp_<uuid>`.
    pub client_temp_id: String,
    /// ISO-8601 UTC insertion time, millisecond precision.
    pub timestamp: String,
}

impl ChangeRecord {
    /// Stamps a payload with an id, a fresh client temp id and the current time.
    pub(crate) fn stamp(id: RecordId, payload: PayloadMap) -> Self {
        Self {
            id,
            payload,
            client_temp_id: new_client_temp_id(),
            timestamp: now_iso8601(),
        }
    }
}

fn new_client_temp_id() -> String {
    format!("temp_{}", Uuid::new_v4().simple())
}

fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> PayloadMap {
        let mut map = PayloadMap::new();
        map.insert("table".into(), json!("orders"));
        map.insert("qty".into(), json!(3));
        map
    }

    #[test]
    fn stamp_assigns_fields() {
        let record = ChangeRecord::stamp(RecordId::new(7), payload());
        assert_eq!(record.id.as_u64(), 7);
        assert!(record.client_temp_id.starts_with("temp_"));
        assert_eq!(record.client_temp_id.len(), "temp_".len() + 32);
        // 2024-05-01T10:00:00.000Z
        assert_eq!(record.timestamp.len(), 24);
        assert!(record.timestamp.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&record.timestamp).is_ok());
    }

    #[test]
    fn temp_ids_are_unique() {
        let a = ChangeRecord::stamp(RecordId::new(1), PayloadMap::new());
        let b = ChangeRecord::stamp(RecordId::new(2), PayloadMap::new());
        assert_ne!(a.client_temp_id, b.client_temp_id);
    }

    #[test]
    fn wire_form_uses_camel_case() {
        let record = ChangeRecord {
            id: RecordId::new(1),
            payload: payload(),
            client_temp_id: "temp_x".into(),
            timestamp: "2024-05-01T10:00:00.000Z".into(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 1,
                "payload": {"table": "orders", "qty": 3},
                "clientTempId": "temp_x",
                "timestamp": "2024-05-01T10:00:00.000Z"
            })
        );
    }

    #[test]
    fn record_id_ordering_and_display() {
        assert!(RecordId::new(1) < RecordId::new(2));
        assert_eq!(RecordId::from(9).to_string(), "9");
    }
}
