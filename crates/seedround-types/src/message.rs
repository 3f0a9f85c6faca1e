//! Negotiation message records
//!
//! Messages are exclusively owned by their session and append-only: they are
//! never edited or deleted after the fact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identity::{MessageId, SessionId};

/// Which side of the negotiation produced a message
///
/// Owner-role messages may be generated by the counterparty agent acting for
/// the listing owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderRole {
    Investor,
    Owner,
}

impl SenderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Investor => "investor",
            Self::Owner => "owner",
        }
    }
}

impl fmt::Display for SenderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One message in a negotiation transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageId,
    pub session_id: SessionId,
    pub sender: SenderRole,
    pub content: String,
    /// Set by the content moderator; flagging never blocks delivery
    pub flagged: bool,
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    pub fn new(
        session_id: SessionId,
        sender: SenderRole,
        content: impl Into<String>,
        flagged: bool,
    ) -> Self {
        Self {
            id: MessageId::new(),
            session_id,
            sender,
            content: content.into(),
            flagged,
            created_at: Utc::now(),
        }
    }

    /// An investor message, pre-moderation verdict applied by the caller
    pub fn investor(session_id: SessionId, content: impl Into<String>, flagged: bool) -> Self {
        Self::new(session_id, SenderRole::Investor, content, flagged)
    }

    /// An owner-side (agent-generated) message; agent output is not moderated
    pub fn owner(session_id: SessionId, content: impl Into<String>) -> Self {
        Self::new(session_id, SenderRole::Owner, content, false)
    }
}
