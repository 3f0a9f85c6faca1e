//! Escrowed deposit records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::identity::{DepositId, SessionId, UserId};
use crate::session::DepositStatus;

/// The escrow deposit tied to one negotiation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRecord {
    pub id: DepositId,
    pub session_id: SessionId,
    /// The investor whose wallet funds the deposit
    pub investor: UserId,
    pub amount: Decimal,
    pub status: DepositStatus,
    pub created_at: DateTime<Utc>,
    /// Set when the deposit reaches `released` or `forfeited`
    pub settled_at: Option<DateTime<Utc>>,
}

impl DepositRecord {
    pub fn new(session_id: SessionId, investor: UserId, amount: Decimal) -> Self {
        Self {
            id: DepositId::new(),
            session_id,
            investor,
            amount,
            status: DepositStatus::Pending,
            created_at: Utc::now(),
            settled_at: None,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.status.is_settled()
    }
}
