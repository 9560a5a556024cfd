//! Wire and domain types shared between the sync server and the client engine.

use serde::{Deserialize, Serialize};

use crate::ids::Sequence;

/// A 32-byte hash-chain link, always serialized as hex on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainHash(pub [u8; 32]);

impl ChainHash {
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let mut out = [0u8; 32];
        if bytes.len() != 32 {
            // hex::FromHexError has no "wrong length" variant that fits generically;
            // reuse OddLength as the closest stable error shape for a length mismatch.
            return Err(hex::FromHexError::InvalidStringLength);
        }
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Serialize for ChainHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ChainHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ChainHash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Sync Event Store
// ---------------------------------------------------------------------------

/// A single admitted sync event, as persisted by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEventRecord {
    pub global_sequence: Sequence,
    pub event_id: String,
    pub record_json: String,
}

/// One event as submitted in a push request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEventInput {
    pub event_id: String,
    pub record_json: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant_id: Option<String>,
    /// Hex-encoded 32-byte ref of the `ScopeState` this event depends on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_state_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_device_id: Option<String>,
}

impl PushEventInput {
    /// True when this event carries any sharing-ledger dependency field.
    pub fn has_sharing_dependency(&self) -> bool {
        self.scope_id.is_some()
            || self.resource_id.is_some()
            || self.grant_id.is_some()
            || self.scope_state_ref.is_some()
    }
}

/// `{eventId, globalSequence}` — one assignment in a push response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assigned {
    pub event_id: String,
    pub global_sequence: Sequence,
}

/// Conflict reasons returned with a 409 push response, per §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    ServerAhead,
    ServerBehind,
    StaleScopeState,
    StaleGrant,
    MissingDeps,
}

/// Outcome of `EventStore::append` before HTTP-status shaping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    Ok {
        head: Sequence,
        assigned: Vec<Assigned>,
    },
    HeadMismatch {
        current_head: Sequence,
        expected_head: Sequence,
    },
}

/// Fully shaped result of `SyncService::push`, ready to become an HTTP response.
///
/// `ok` is carried on both variants (rather than used as an internal serde
/// tag) because the wire contract spells it out as a literal field on both
/// the 201 and 409 bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(untagged)]
pub enum PushResult {
    Ok {
        ok: bool,
        head: Sequence,
        assigned: Vec<Assigned>,
    },
    Conflict {
        ok: bool,
        head: Sequence,
        reason: ConflictReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        missing: Option<Vec<PulledEvent>>,
    },
}

impl PushResult {
    pub fn ok(head: Sequence, assigned: Vec<Assigned>) -> Self {
        Self::Ok {
            ok: true,
            head,
            assigned,
        }
    }

    pub fn conflict(head: Sequence, reason: ConflictReason, missing: Option<Vec<PulledEvent>>) -> Self {
        Self::Conflict {
            ok: false,
            head,
            reason,
            missing,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

/// One event as returned from a pull (or attached as `missing[]` on conflict).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PulledEvent {
    pub global_sequence: Sequence,
    pub event_id: String,
    pub record_json: String,
}

/// `GET /sync/pull` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponseBody {
    pub events: Vec<PulledEvent>,
    pub head: Sequence,
    pub has_more: bool,
    pub next_since: Option<Sequence>,
}

impl PullResponseBody {
    /// Builds a response honoring the `nextSince`/`hasMore` invariants in §6:
    /// `nextSince` is the last event's sequence when non-empty, `null` otherwise;
    /// `hasMore` is set only when a full page was returned and more remain.
    pub fn build(events: Vec<PulledEvent>, head: Sequence, limit: usize) -> Self {
        let next_since = events.last().map(|e| e.global_sequence);
        let has_more = events.len() == limit && head > next_since.unwrap_or(0);
        Self {
            events,
            head,
            has_more,
            next_since,
        }
    }
}

// ---------------------------------------------------------------------------
// Sharing Ledger
// ---------------------------------------------------------------------------

/// A single row in a scope's hash-chained membership stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeState {
    pub scope_id: String,
    pub seq: Sequence,
    pub prev_hash: Option<String>,
    #[serde(rename = "ref")]
    pub ref_hash: String,
    pub owner_user_id: String,
    pub scope_epoch: i64,
    pub signed_record_cbor: String,
    pub members: Vec<String>,
    pub signers: Vec<String>,
    pub sig_suite: String,
    pub signature: String,
}

/// Active-head pointer for a scope's `ScopeState` stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeStateHead {
    pub scope_id: String,
    pub owner_user_id: String,
    pub head_seq: Sequence,
    pub head_ref: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    Active,
    Revoked,
}

/// A single row in a `(scope,resource)`'s hash-chained grant stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGrant {
    pub grant_id: String,
    pub scope_id: String,
    pub resource_id: String,
    pub seq: Sequence,
    pub prev_hash: Option<String>,
    pub grant_hash: String,
    pub scope_state_ref: String,
    pub scope_epoch: i64,
    pub resource_key_id: String,
    pub wrapped_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    pub status: GrantStatus,
    pub signed_grant_cbor: String,
    pub sig_suite: String,
    pub signature: String,
}

/// Active-grant pointer for a `(scope,resource)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGrantHead {
    pub scope_id: String,
    pub resource_id: String,
    pub active_grant_id: String,
    pub head_seq: Sequence,
    pub head_hash: String,
}

/// A scope key wrapped for one recipient at one epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEnvelope {
    pub envelope_id: String,
    pub scope_id: String,
    pub recipient_user_id: String,
    pub scope_epoch: i64,
    pub recipient_uk_pub_fingerprint: String,
    pub ciphersuite: String,
    pub ciphertext: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

/// A single row in a user's hash-chained key-vault stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyVaultRecord {
    pub user_id: String,
    pub record_seq: Sequence,
    pub prev_hash: Option<String>,
    pub record_hash: String,
    pub ciphertext: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

/// Outcome of a sharing-ledger `append`, mirroring `AppendOutcome` but keyed by
/// `seq`/`hash` rather than `globalSequence`/`eventId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerAppendOutcome {
    Ok { seq: Sequence, hash: String },
    HeadMismatch {
        current_head: Sequence,
        expected_head: Sequence,
    },
    ChainViolation { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_response_sets_next_since_from_last_event() {
        let events = vec![
            PulledEvent {
                global_sequence: 1,
                event_id: "e1".into(),
                record_json: "{}".into(),
            },
            PulledEvent {
                global_sequence: 2,
                event_id: "e2".into(),
                record_json: "{}".into(),
            },
        ];
        let resp = PullResponseBody::build(events, 2, 200);
        assert_eq!(resp.next_since, Some(2));
        assert!(!resp.has_more);
    }

    #[test]
    fn pull_response_has_more_when_page_full_and_head_ahead() {
        let events = vec![PulledEvent {
            global_sequence: 1,
            event_id: "e1".into(),
            record_json: "{}".into(),
        }];
        let resp = PullResponseBody::build(events, 5, 1);
        assert!(resp.has_more);
        assert_eq!(resp.next_since, Some(1));
    }

    #[test]
    fn pull_response_empty_has_null_next_since() {
        let resp = PullResponseBody::build(vec![], 0, 200);
        assert_eq!(resp.next_since, None);
        assert!(!resp.has_more);
    }

    #[test]
    fn push_event_input_detects_sharing_dependency() {
        let mut ev = PushEventInput {
            event_id: "e1".into(),
            record_json: "{}".into(),
            scope_id: None,
            resource_id: None,
            resource_key_id: None,
            grant_id: None,
            scope_state_ref: None,
            author_device_id: None,
        };
        assert!(!ev.has_sharing_dependency());
        ev.scope_id = Some("scope-1".into());
        assert!(ev.has_sharing_dependency());
    }
}
