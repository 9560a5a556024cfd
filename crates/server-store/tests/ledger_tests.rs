//! §4.3 Sharing Ledger: hash-chain enforcement and optimistic concurrency
//! across the three ledger streams, plus §8 scenario S4.

mod common;

use eventsync_core::model::LedgerAppendOutcome;
use eventsync_server_store::error::StoreError;
use eventsync_server_store::ledger;

fn scope_state(scope_id: &str, prev_hash: Option<&str>, ref_hash: &str, epoch: i64) -> ledger::NewScopeState {
    ledger::NewScopeState {
        scope_id: scope_id.to_string(),
        prev_hash: prev_hash.map(|s| s.to_string()),
        ref_hash: ref_hash.to_string(),
        owner_user_id: "owner-1".to_string(),
        scope_epoch: epoch,
        signed_record_cbor: "cbor-bytes".to_string(),
        members: vec!["owner-1".to_string()],
        signers: vec!["owner-1".to_string()],
        sig_suite: "ed25519".to_string(),
        signature: "sig-bytes".to_string(),
    }
}

/// §8 S4: genesis (prevHash=null) succeeds; a wrong prevHash on the second
/// record is rejected and the head stays put; the correct prevHash succeeds.
#[tokio::test]
async fn scope_state_enforces_hash_chain_like_s4() {
    let db = common::setup().await;
    let mut conn = db.pool.get().unwrap();

    let genesis = ledger::append_scope_state(&mut conn, 0, scope_state("scope-1", None, "aabb", 1)).unwrap();
    match genesis {
        LedgerAppendOutcome::Ok { seq, hash } => {
            assert_eq!(seq, 1);
            assert_eq!(hash, "aabb");
        }
        other => panic!("expected Ok, got {other:?}"),
    }

    let wrong = ledger::append_scope_state(&mut conn, 1, scope_state("scope-1", Some("ddee"), "ffaa", 2)).unwrap();
    assert!(matches!(wrong, LedgerAppendOutcome::ChainViolation { .. }));

    let (head_seq, head_ref) = ledger::get_scope_state_head(&mut conn, "scope-1").unwrap().unwrap();
    assert_eq!(head_seq, 1);
    assert_eq!(head_ref, "aabb");

    let correct = ledger::append_scope_state(&mut conn, 1, scope_state("scope-1", Some("aabb"), "ccdd", 2)).unwrap();
    match correct {
        LedgerAppendOutcome::Ok { seq, hash } => {
            assert_eq!(seq, 2);
            assert_eq!(hash, "ccdd");
        }
        other => panic!("expected Ok, got {other:?}"),
    }
}

/// A non-genesis record with a null `prevHash` is rejected as a chain
/// violation, not silently treated as a new genesis.
#[tokio::test]
async fn scope_state_rejects_missing_prev_hash_on_non_genesis() {
    let db = common::setup().await;
    let mut conn = db.pool.get().unwrap();
    ledger::append_scope_state(&mut conn, 0, scope_state("scope-1", None, "aabb", 1)).unwrap();

    let outcome = ledger::append_scope_state(&mut conn, 1, scope_state("scope-1", None, "bbcc", 2)).unwrap();
    assert!(matches!(outcome, LedgerAppendOutcome::ChainViolation { .. }));
}

/// A stale `expectedHead` on the scope-state stream reports `HeadMismatch`
/// with the real current head, independent of the chain check.
#[tokio::test]
async fn scope_state_stale_expected_head_is_head_mismatch() {
    let db = common::setup().await;
    let mut conn = db.pool.get().unwrap();
    ledger::append_scope_state(&mut conn, 0, scope_state("scope-1", None, "aabb", 1)).unwrap();

    let outcome = ledger::append_scope_state(&mut conn, 0, scope_state("scope-1", None, "zzzz", 1)).unwrap();
    match outcome {
        LedgerAppendOutcome::HeadMismatch {
            current_head,
            expected_head,
        } => {
            assert_eq!(current_head, 1);
            assert_eq!(expected_head, 0);
        }
        other => panic!("expected HeadMismatch, got {other:?}"),
    }
}

fn grant(
    grant_id: &str,
    prev_hash: Option<&str>,
    grant_hash: &str,
    active: bool,
) -> ledger::NewResourceGrant {
    ledger::NewResourceGrant {
        grant_id: grant_id.to_string(),
        scope_id: "scope-1".to_string(),
        resource_id: "resource-1".to_string(),
        prev_hash: prev_hash.map(|s| s.to_string()),
        grant_hash: grant_hash.to_string(),
        scope_state_ref: "aabb".to_string(),
        scope_epoch: 1,
        resource_key_id: "key-1".to_string(),
        wrapped_key: "wrapped-bytes".to_string(),
        policy: None,
        active,
        signed_grant_cbor: "cbor-bytes".to_string(),
        sig_suite: "ed25519".to_string(),
        signature: "sig-bytes".to_string(),
    }
}

/// §4.3 step 6: the active-grant head only advances for `active=true`
/// records; a revocation is appended to the stream but does not move
/// `getActiveGrant` forward to itself.
#[tokio::test]
async fn resource_grant_head_only_advances_for_active_grants() {
    let db = common::setup().await;
    let mut conn = db.pool.get().unwrap();

    ledger::append_resource_grant(&mut conn, 0, grant("grant-1", None, "hash-1", true)).unwrap();
    let active = ledger::get_active_grant(&mut conn, "scope-1", "resource-1").unwrap().unwrap();
    assert_eq!(active.grant_id, "grant-1");
    assert_eq!(active.status, "active");

    ledger::append_resource_grant(&mut conn, 1, grant("grant-2", Some("hash-1"), "hash-2", false)).unwrap();

    // The head still points at the last *active* grant, not the revocation.
    let active = ledger::get_active_grant(&mut conn, "scope-1", "resource-1").unwrap().unwrap();
    assert_eq!(active.grant_id, "grant-1");

    let history = ledger::load_resource_grants_since(&mut conn, "scope-1", "resource-1", 0, 10).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].grant_id, "grant-2");
    assert_eq!(history[1].status, "revoked");
}

#[tokio::test]
async fn get_active_grant_is_none_before_any_grant_exists() {
    let db = common::setup().await;
    let mut conn = db.pool.get().unwrap();
    let active = ledger::get_active_grant(&mut conn, "scope-1", "resource-1").unwrap();
    assert!(active.is_none());
}

fn key_vault_record(prev_hash: Option<&str>, record_hash: &str) -> ledger::NewKeyVaultRecord {
    ledger::NewKeyVaultRecord {
        user_id: "user-1".to_string(),
        prev_hash: prev_hash.map(|s| s.to_string()),
        record_hash: record_hash.to_string(),
        ciphertext: "ciphertext-bytes".to_string(),
        metadata: None,
    }
}

/// The per-user key-vault stream follows the same genesis/chain rules as
/// scope state, keyed by `userId` rather than `scopeId`.
#[tokio::test]
async fn key_vault_record_chain_and_idempotent_load() {
    let db = common::setup().await;
    let mut conn = db.pool.get().unwrap();

    ledger::append_key_vault_record(&mut conn, 0, key_vault_record(None, "h1")).unwrap();
    ledger::append_key_vault_record(&mut conn, 1, key_vault_record(Some("h1"), "h2")).unwrap();

    let err = ledger::append_key_vault_record(&mut conn, 2, key_vault_record(Some("wrong"), "h3")).unwrap();
    assert!(matches!(err, LedgerAppendOutcome::ChainViolation { .. }));

    let history = ledger::load_key_vault_since(&mut conn, "user-1", 0, 10).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].record_hash, "h1");
    assert_eq!(history[1].record_hash, "h2");
}

/// `StoreError::kind()` marks chain violations and head mismatches as
/// conflicts, matching the push/pull error taxonomy used by the service
/// layer (§7).
#[test]
fn store_error_kinds_match_conflict_taxonomy() {
    use eventsync_core::SyncErrorKind;

    let head_mismatch = StoreError::HeadMismatch {
        current: 1,
        expected: 0,
    };
    assert_eq!(head_mismatch.kind(), SyncErrorKind::Conflict);
    assert!(!head_mismatch.is_transient());
}
