//! Access agreement records
//!
//! Access records are owned by the auth/agreements collaborator; the
//! negotiation engine consumes them read-only through the access gate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{ListingId, UserId};

/// Scope of a signed access agreement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessScope {
    /// Covers a single listing
    Listing(ListingId),
    /// Covers every listing on the platform
    Platform,
}

impl AccessScope {
    pub fn covers(&self, listing_id: &ListingId) -> bool {
        match self {
            Self::Listing(id) => id == listing_id,
            Self::Platform => true,
        }
    }
}

/// A signed confidentiality/terms acknowledgment gating negotiation access
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRecord {
    pub user_id: UserId,
    pub scope: AccessScope,
    pub signed_at: DateTime<Utc>,
    /// Agreements may be time-limited; `None` never expires
    pub expires_at: Option<DateTime<Utc>>,
    /// Revocation flag maintained by the agreements collaborator
    pub valid: bool,
}

impl AccessRecord {
    /// Whether this record grants access to the listing right now
    pub fn grants(&self, listing_id: &ListingId, now: DateTime<Utc>) -> bool {
        self.valid
            && self.scope.covers(listing_id)
            && self.expires_at.map_or(true, |exp| now <= exp)
    }
}
