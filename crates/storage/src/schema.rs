//! Hand-maintained Diesel schema for the client's local SQLite log.
//!
//! Kept in sync with `migrations/` by hand (no `diesel print-schema` run as
//! part of this build).

diesel::table! {
    events (commit_sequence) {
        commit_sequence -> BigInt,
        id -> Text,
        store_id -> Text,
        aggregate_type -> Text,
        aggregate_id -> Text,
        version -> BigInt,
        record_json -> Text,
        occurred_at -> Text,
    }
}

diesel::table! {
    sync_event_map (event_id) {
        event_id -> Text,
        global_sequence -> BigInt,
        inserted_at -> Text,
    }
}

diesel::table! {
    sync_meta (store_id) {
        store_id -> Text,
        last_pulled_global_seq -> BigInt,
        updated_at -> Text,
    }
}
