//! Settlement records
//!
//! Settlement records are created exactly once per (session, kind) when a
//! session completes, and retained for audit alongside the session.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identity::{SessionId, SettlementId, UserId};

/// What a settlement record pays out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementKind {
    /// Platform commission on the agreed investment
    PlatformCommission,
    /// Referral reward for the referrer of a participant
    Referral,
}

impl SettlementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlatformCommission => "platform_commission",
            Self::Referral => "referral",
        }
    }
}

impl fmt::Display for SettlementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payout workflow status of a settlement record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Pending,
    Approved,
    Paid,
}

/// One computed payout resulting from a completed negotiation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub id: SettlementId,
    pub session_id: SessionId,
    pub beneficiary: UserId,
    pub kind: SettlementKind,
    /// `base_amount * rate`
    pub amount: Decimal,
    pub rate: Decimal,
    pub base_amount: Decimal,
    pub status: SettlementStatus,
    pub created_at: DateTime<Utc>,
}

impl SettlementRecord {
    pub fn new(
        session_id: SessionId,
        beneficiary: UserId,
        kind: SettlementKind,
        rate: Decimal,
        base_amount: Decimal,
    ) -> Self {
        Self {
            id: SettlementId::new(),
            session_id,
            beneficiary,
            kind,
            amount: base_amount * rate,
            rate,
            base_amount,
            status: SettlementStatus::Pending,
            created_at: Utc::now(),
        }
    }
}
