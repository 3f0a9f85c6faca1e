//! Error types for the Seedround negotiation engine
//!
//! Every failure is explicit and carries enough detail to render a
//! user-facing message. Notification delivery is the only concern allowed to
//! swallow its own failures, and it does so at the call site, not here.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::SessionStatus;

/// Result type for negotiation engine operations
pub type Result<T> = std::result::Result<T, NegotiationError>;

/// Why the access gate refused to open a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDeniedReason {
    /// The actor owns the listing they tried to negotiate on
    SelfNegotiation,
    /// Negotiation is disabled for this listing
    NegotiationDisabled,
    /// No valid, non-expired access agreement covers this listing
    AccessNotGranted,
    /// A pending or active session already exists for this (listing, actor) pair
    AlreadyActive,
}

impl fmt::Display for AccessDeniedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfNegotiation => write!(f, "cannot negotiate on your own listing"),
            Self::NegotiationDisabled => write!(f, "negotiation is disabled for this listing"),
            Self::AccessNotGranted => write!(f, "no valid access agreement for this listing"),
            Self::AlreadyActive => write!(f, "a negotiation for this listing is already open"),
        }
    }
}

/// Negotiation engine error taxonomy
#[derive(Debug, Clone, Error)]
pub enum NegotiationError {
    // ========================================================================
    // Gate Errors
    // ========================================================================

    /// Access gate refused the operation
    #[error("Access denied: {reason}")]
    AccessDenied { reason: AccessDeniedReason },

    // ========================================================================
    // State Machine Errors
    // ========================================================================

    /// Operation requires a state the entity is not in
    #[error("Invalid state: {entity} is {actual}, expected {expected}")]
    InvalidState {
        entity: String,
        expected: String,
        actual: String,
    },

    /// Requested transition is not part of the state machine
    #[error("Invalid transition: cannot {action} a session in status {from}")]
    InvalidTransition {
        from: SessionStatus,
        action: &'static str,
    },

    /// The negotiation window has elapsed
    #[error("Negotiation {session_id} has expired")]
    NegotiationExpired { session_id: String },

    // ========================================================================
    // Policy Errors
    // ========================================================================

    /// Proposed terms fell outside the configured bounds
    #[error("Policy violation: {message}")]
    PolicyViolation { message: String },

    /// Actor is not a participant of the session
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    // ========================================================================
    // Collaborator Errors
    // ========================================================================

    /// An external collaborator timed out or was unavailable
    #[error("Upstream {collaborator} unavailable: {message}")]
    UpstreamTimeout {
        collaborator: &'static str,
        message: String,
    },

    /// Wallet ledger rejected a debit
    #[error("Insufficient funds for {user_id}: requested {requested}, available {available}")]
    InsufficientFunds {
        user_id: String,
        requested: String,
        available: String,
    },

    // ========================================================================
    // Lookup Errors
    // ========================================================================

    /// Session not found
    #[error("Negotiation session {session_id} not found")]
    SessionNotFound { session_id: String },

    /// Listing not found
    #[error("Listing {listing_id} not found")]
    ListingNotFound { listing_id: String },

    /// Deposit not found
    #[error("Deposit for session {session_id} not found")]
    DepositNotFound { session_id: String },

    // ========================================================================
    // General Errors
    // ========================================================================

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl NegotiationError {
    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Create an access-denied error
    pub fn denied(reason: AccessDeniedReason) -> Self {
        Self::AccessDenied { reason }
    }

    /// Check if the caller may retry the same request unchanged
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamTimeout { .. } | Self::Internal { .. }
        )
    }

    /// Get an error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AccessDenied { .. } => "ACCESS_DENIED",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::NegotiationExpired { .. } => "NEGOTIATION_EXPIRED",
            Self::PolicyViolation { .. } => "POLICY_VIOLATION",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::UpstreamTimeout { .. } => "UPSTREAM_TIMEOUT",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            Self::ListingNotFound { .. } => "LISTING_NOT_FOUND",
            Self::DepositNotFound { .. } => "DEPOSIT_NOT_FOUND",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = NegotiationError::denied(AccessDeniedReason::AlreadyActive);
        assert_eq!(err.error_code(), "ACCESS_DENIED");

        let err = NegotiationError::NegotiationExpired {
            session_id: "session_x".to_string(),
        };
        assert_eq!(err.error_code(), "NEGOTIATION_EXPIRED");
    }

    #[test]
    fn test_retriable_errors() {
        let timeout = NegotiationError::UpstreamTimeout {
            collaborator: "text-generation",
            message: "deadline elapsed".to_string(),
        };
        assert!(timeout.is_retriable());

        let expired = NegotiationError::NegotiationExpired {
            session_id: "session_x".to_string(),
        };
        assert!(!expired.is_retriable());
    }
}
