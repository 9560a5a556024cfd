//! Branded identifier types for the sync domain.
//!
//! Every id is an opaque non-empty string except `StoreId`, which the wire
//! contract requires to be a UUIDv7. Wrapping each id in its own type keeps
//! `append(owner, store, ...)`-shaped call sites from being reordered by
//! mistake.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("id must not be empty")]
    Empty,
    #[error("storeId must be a UUIDv7: {0}")]
    NotUuidV7(String),
}

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
                let raw = raw.into();
                if raw.is_empty() {
                    return Err(IdError::Empty);
                }
                Ok(Self(raw))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

opaque_id!(OwnerId);
opaque_id!(ScopeId);
opaque_id!(ResourceId);
opaque_id!(GrantId);
opaque_id!(EnvelopeId);
opaque_id!(EventId);
opaque_id!(UserId);
opaque_id!(DeviceId);

/// A store id, which the wire contract requires to be a UUIDv7.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(String);

impl StoreId {
    pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
        let raw = raw.into();
        let parsed = uuid::Uuid::parse_str(&raw).map_err(|_| IdError::NotUuidV7(raw.clone()))?;
        if parsed.get_version_num() != 7 {
            return Err(IdError::NotUuidV7(raw));
        }
        Ok(Self(raw))
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StoreId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// 64-bit monotonic sequence number. Always non-negative; `0` means "nothing appended yet".
pub type Sequence = i64;
