//! Identity types for Seedround
//!
//! All identity types are strongly typed wrappers around UUIDs to prevent
//! accidental mixing of different ID types.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to generate ID types with common implementations
macro_rules! define_id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse from a string (with or without prefix)
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                let s = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }
    };
}

// Actor identity types
define_id_type!(UserId, "user", "Unique identifier for a platform user (investor or listing owner)");

// Marketplace identity types
define_id_type!(ListingId, "listing", "Unique identifier for a crowdfunding listing");

// Negotiation identity types
define_id_type!(SessionId, "session", "Unique identifier for a negotiation session");
define_id_type!(MessageId, "msg", "Unique identifier for a negotiation message");

// Financial identity types
define_id_type!(DepositId, "deposit", "Unique identifier for an escrowed deposit");
define_id_type!(SettlementId, "settle", "Unique identifier for a settlement record");
