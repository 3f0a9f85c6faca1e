//! Access gate
//!
//! Decides whether an actor may open a negotiation on a listing. The
//! "no existing live session" check deliberately does NOT live here: it is
//! fused with session creation inside the store so that check and insert are
//! one atomic step (see `store::SessionStore::create`).

use std::sync::Arc;

use chrono::Utc;

use seedround_types::{
    AccessDeniedReason, ListingSummary, NegotiationConfig, NegotiationError, Result, UserId,
};

use crate::directory::AccessDirectory;

/// Gate applied before any session is created
pub struct AccessGate {
    access: Arc<dyn AccessDirectory>,
}

impl AccessGate {
    pub fn new(access: Arc<dyn AccessDirectory>) -> Self {
        Self { access }
    }

    /// Check whether the actor may open a negotiation on the listing
    ///
    /// Checks, in order: the actor is not the listing owner, the listing has
    /// negotiation enabled, and a valid non-expired access agreement covers
    /// the listing (listing-scoped or platform-wide).
    pub async fn can_open(
        &self,
        actor: &UserId,
        listing: &ListingSummary,
        config: &NegotiationConfig,
    ) -> Result<()> {
        if actor == &listing.owner_id {
            return Err(NegotiationError::denied(AccessDeniedReason::SelfNegotiation));
        }

        if !config.enabled {
            return Err(NegotiationError::denied(
                AccessDeniedReason::NegotiationDisabled,
            ));
        }

        let now = Utc::now();
        let granted = self
            .access
            .records_for(actor)
            .await
            .iter()
            .any(|record| record.grants(&listing.id, now));
        if !granted {
            return Err(NegotiationError::denied(AccessDeniedReason::AccessNotGranted));
        }

        Ok(())
    }
}
