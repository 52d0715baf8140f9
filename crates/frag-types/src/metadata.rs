use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{FragmentId, OwnerId};

/// The stored metadata record for one fragment.
///
/// This is the exact shape persisted by every store backend and exposed to
/// callers: `{ id, ownerId, created, updated, type, size }`. No derived
/// fields are serialized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentMetadata {
    pub id: FragmentId,
    pub owner_id: OwnerId,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Full content type, parameters included (e.g. `text/plain; charset=utf-8`).
    #[serde(rename = "type")]
    pub content_type: String,
    /// Byte length of the stored payload.
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FragmentMetadata {
        let now = Utc::now();
        FragmentMetadata {
            id: FragmentId::parse("id1").unwrap(),
            owner_id: OwnerId::parse("owner").unwrap(),
            created: now,
            updated: now,
            content_type: "text/plain; charset=utf-8".into(),
            size: 17,
        }
    }

    #[test]
    fn serialized_field_set_is_stable() {
        let value = serde_json::to_value(sample()).unwrap();
        let mut keys: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort();
        assert_eq!(keys, ["created", "id", "ownerId", "size", "type", "updated"]);
        assert_eq!(value["type"], "text/plain; charset=utf-8");
        assert_eq!(value["size"], 17);
    }

    #[test]
    fn json_roundtrip_preserves_timestamps() {
        let meta = sample();
        let json = serde_json::to_string(&meta).unwrap();
        let back: FragmentMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn negative_size_is_rejected() {
        let json = r#"{"id":"a","ownerId":"o","created":"2024-01-01T00:00:00Z",
            "updated":"2024-01-01T00:00:00Z","type":"text/plain","size":-1}"#;
        assert!(serde_json::from_str::<FragmentMetadata>(json).is_err());
    }
}
