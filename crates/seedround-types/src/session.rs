//! Negotiation session aggregate and state machine
//!
//! The session is the aggregate root of the negotiation engine: it owns the
//! status, the timing window, the deposit mirror, and the agreed terms. Every
//! transition is an explicit method returning `InvalidTransition` on misuse;
//! illegal transitions never silently no-op.
//!
//! ```text
//! pending --confirm_deposit--> active --agreement--> agreement_reached --finalize--> completed
//!                                 |--window elapsed--> expired
//!                                 |--cancel----------> cancelled
//! pending --cancel------------> cancelled
//! ```

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{NegotiationError, Result};
use crate::identity::{ListingId, SessionId, UserId};

/// Status of a negotiation session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created, waiting for the deposit to be confirmed
    Pending,
    /// Deposit held, negotiation window open
    Active,
    /// The counterparty agent signalled agreement within policy bounds
    AgreementReached,
    /// Agreement finalized and settled
    Completed,
    /// Negotiation window elapsed without agreement
    Expired,
    /// Explicitly cancelled by a participant
    Cancelled,
}

impl SessionStatus {
    /// A live session blocks further opens for the same (listing, initiator) pair
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Pending | Self::Active)
    }

    /// Terminal states never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Expired | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::AgreementReached => "agreement_reached",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of the escrowed deposit tied to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    /// Requested but not yet paid
    Pending,
    /// Debited from the investor and held in escrow
    Held,
    /// Returned to the investor
    Released,
    /// Captured by the platform (dispute/abuse path)
    Forfeited,
}

impl DepositStatus {
    /// Deposit status is monotonic: pending → held → {released | forfeited}
    pub fn can_transition_to(&self, next: DepositStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Held)
                | (Self::Held, Self::Released)
                | (Self::Held, Self::Forfeited)
        )
    }

    /// Released and forfeited are final
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Released | Self::Forfeited)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Held => "held",
            Self::Released => "released",
            Self::Forfeited => "forfeited",
        }
    }
}

impl fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured terms exchanged during a negotiation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationTerms {
    /// Committed investment amount
    pub investment_amount: Decimal,
    /// Equity share offered in return, in percent
    pub equity_percent: Decimal,
    /// Payout/vesting timeline in months
    pub timeline_months: u32,
}

/// The negotiation session aggregate
///
/// Sessions are retained for audit: terminal transitions change the status,
/// they never remove the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationSession {
    pub id: SessionId,
    pub listing_id: ListingId,
    /// The investor who opened the negotiation
    pub initiator: UserId,
    /// The listing owner (represented by the counterparty agent)
    pub owner: UserId,
    pub status: SessionStatus,
    /// Set when the deposit is confirmed and the window opens
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub deposit_amount: Decimal,
    /// Mirror of the deposit ledger state, kept monotonic
    pub deposit_status: DepositStatus,
    /// Latest in-bounds terms proposed by the counterparty agent
    pub proposed_terms: Option<NegotiationTerms>,
    pub agreement_reached: bool,
    /// Finalized copy of the proposed terms, set on agreement
    pub agreed_terms: Option<NegotiationTerms>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl NegotiationSession {
    /// Create a new session in `pending` with a pending deposit
    pub fn open(
        listing_id: ListingId,
        initiator: UserId,
        owner: UserId,
        deposit_amount: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            listing_id,
            initiator,
            owner,
            status: SessionStatus::Pending,
            window_start: None,
            window_end: None,
            deposit_amount,
            deposit_status: DepositStatus::Pending,
            proposed_terms: None,
            agreement_reached: false,
            agreed_terms: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Whether the actor participates in this session
    pub fn is_participant(&self, actor: &UserId) -> bool {
        &self.initiator == actor || &self.owner == actor
    }

    /// Whether the negotiation window has elapsed
    pub fn window_elapsed(&self, now: DateTime<Utc>) -> bool {
        matches!(self.window_end, Some(end) if now > end)
    }

    /// pending → active: deposit confirmed, window opens
    pub fn activate(&mut self, window: Duration, now: DateTime<Utc>) -> Result<()> {
        if self.status != SessionStatus::Pending {
            return Err(NegotiationError::InvalidTransition {
                from: self.status,
                action: "activate",
            });
        }
        self.mark_deposit(DepositStatus::Held)?;
        self.status = SessionStatus::Active;
        self.window_start = Some(now);
        self.window_end = Some(now + window);
        self.updated_at = now;
        Ok(())
    }

    /// active → agreement_reached: the agent signalled agreement with
    /// in-bounds terms
    pub fn record_agreement(&mut self, terms: NegotiationTerms) -> Result<()> {
        if self.status != SessionStatus::Active {
            return Err(NegotiationError::InvalidTransition {
                from: self.status,
                action: "record agreement on",
            });
        }
        self.proposed_terms = Some(terms.clone());
        self.agreed_terms = Some(terms);
        self.agreement_reached = true;
        self.status = SessionStatus::AgreementReached;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// active → expired: the window elapsed
    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != SessionStatus::Active {
            return Err(NegotiationError::InvalidTransition {
                from: self.status,
                action: "expire",
            });
        }
        self.status = SessionStatus::Expired;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// pending | active → cancelled
    pub fn cancel(&mut self) -> Result<()> {
        if !self.status.is_live() {
            return Err(NegotiationError::InvalidTransition {
                from: self.status,
                action: "cancel",
            });
        }
        let now = Utc::now();
        self.status = SessionStatus::Cancelled;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// agreement_reached → completed: settlement has run
    pub fn finalize(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != SessionStatus::AgreementReached {
            return Err(NegotiationError::InvalidTransition {
                from: self.status,
                action: "finalize",
            });
        }
        self.status = SessionStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Advance the deposit mirror, enforcing monotonicity
    pub fn mark_deposit(&mut self, next: DepositStatus) -> Result<()> {
        if !self.deposit_status.can_transition_to(next) {
            return Err(NegotiationError::InvalidState {
                entity: format!("deposit for session {}", self.id),
                expected: match next {
                    DepositStatus::Held => DepositStatus::Pending.to_string(),
                    _ => DepositStatus::Held.to_string(),
                },
                actual: self.deposit_status.to_string(),
            });
        }
        self.deposit_status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}
