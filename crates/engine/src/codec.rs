//! Record wire codec (§4.5): `recordJson` is a canonical JSON object the
//! client parses into a typed record at the boundary only — the server never
//! looks inside it (§9 "dynamic typing of recordJson").

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// The typed shape of a decoded `recordJson` payload.
///
/// `id` MUST equal the envelope's `eventId` (§4.5); callers check this with
/// [`LocalRecord::assert_matches_event_id`] right after parsing, since a
/// mismatch is a fatal protocol error, not a recoverable one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalRecord {
    pub id: String,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub version: i64,
    /// Base64url-encoded ciphertext; opaque to the engine.
    pub payload_ciphertext: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_state_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sig_suite: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl LocalRecord {
    pub fn decode(record_json: &str) -> Result<Self, SyncError> {
        serde_json::from_str(record_json)
            .map_err(|e| SyncError::protocol(format!("malformed recordJson: {e}")))
    }

    pub fn encode(&self) -> Result<String, SyncError> {
        serde_json::to_string(self).map_err(|e| SyncError::protocol(format!("failed to encode record: {e}")))
    }

    /// §4.5 pull loop step 4: "Parse `recordJson`; assert `record.id == eventId`
    /// (fatal otherwise)."
    pub fn assert_matches_event_id(&self, event_id: &str) -> Result<(), SyncError> {
        if self.id == event_id {
            Ok(())
        } else {
            Err(SyncError::protocol(format!(
                "record.id ({}) != eventId ({event_id})",
                self.id
            )))
        }
    }
}
