//! Domain types and pure logic shared by the sync server and the client engine:
//! branded ids, wire/ledger data model, hash-chain and rebase predicates,
//! backoff computation, and the shared error taxonomy.

pub mod backoff;
pub mod config;
pub mod error;
pub mod hash_chain;
pub mod ids;
pub mod model;
pub mod rebase;

pub use error::SyncErrorKind;
pub use ids::{DeviceId, EnvelopeId, EventId, GrantId, IdError, OwnerId, ResourceId, ScopeId, Sequence, StoreId, UserId};
