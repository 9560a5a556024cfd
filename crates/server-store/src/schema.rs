//! Hand-maintained Diesel schema for the Postgres-backed sync server.
//!
//! Kept in sync with `migrations/` by hand (no `diesel print-schema` run as
//! part of this build).

diesel::table! {
    sync_stores (store_id) {
        store_id -> Text,
        owner_id -> Text,
        head -> BigInt,
    }
}

diesel::table! {
    sync_events (id) {
        id -> BigInt,
        owner_id -> Text,
        store_id -> Text,
        global_sequence -> BigInt,
        event_id -> Text,
        record_json -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    scope_state (scope_id, seq) {
        scope_id -> Text,
        seq -> BigInt,
        prev_hash -> Nullable<Text>,
        ref_hash -> Text,
        owner_user_id -> Text,
        scope_epoch -> BigInt,
        signed_record_cbor -> Text,
        members -> Text,
        signers -> Text,
        sig_suite -> Text,
        signature -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    scope_state_head (scope_id) {
        scope_id -> Text,
        owner_user_id -> Text,
        head_seq -> BigInt,
        head_ref -> Text,
    }
}

diesel::table! {
    resource_grant (grant_id) {
        grant_id -> Text,
        scope_id -> Text,
        resource_id -> Text,
        seq -> BigInt,
        prev_hash -> Nullable<Text>,
        grant_hash -> Text,
        scope_state_ref -> Text,
        scope_epoch -> BigInt,
        resource_key_id -> Text,
        wrapped_key -> Text,
        policy -> Nullable<Text>,
        status -> Text,
        signed_grant_cbor -> Text,
        sig_suite -> Text,
        signature -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    resource_grant_head (scope_id, resource_id) {
        scope_id -> Text,
        resource_id -> Text,
        active_grant_id -> Text,
        head_seq -> BigInt,
        head_hash -> Text,
    }
}

diesel::table! {
    key_envelope (envelope_id) {
        envelope_id -> Text,
        scope_id -> Text,
        recipient_user_id -> Text,
        scope_epoch -> BigInt,
        recipient_uk_pub_fingerprint -> Text,
        ciphersuite -> Text,
        ciphertext -> Text,
        metadata -> Nullable<Text>,
    }
}

diesel::table! {
    key_vault_record (user_id, record_seq) {
        user_id -> Text,
        record_seq -> BigInt,
        prev_hash -> Nullable<Text>,
        record_hash -> Text,
        ciphertext -> Text,
        metadata -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    key_vault_head (user_id) {
        user_id -> Text,
        head_seq -> BigInt,
        head_hash -> Text,
    }
}
