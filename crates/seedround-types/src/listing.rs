//! Listing summary and per-listing negotiation configuration
//!
//! The listing collaborator owns the full project record; the negotiation
//! engine only consumes this summary plus the listing-level configuration
//! that drives deposits and commissions.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::identity::{ListingId, UserId};

/// Category of a crowdfunding listing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListingCategory {
    Fintech,
    Health,
    CleanEnergy,
    Consumer,
    DeepTech,
    Custom(String),
}

impl ListingCategory {
    pub fn display_name(&self) -> &str {
        match self {
            Self::Fintech => "Fintech",
            Self::Health => "Health",
            Self::CleanEnergy => "Clean Energy",
            Self::Consumer => "Consumer",
            Self::DeepTech => "Deep Tech",
            Self::Custom(name) => name,
        }
    }
}

/// The slice of a listing the negotiation engine and the counterparty agent
/// actually see
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSummary {
    pub id: ListingId,
    pub title: String,
    pub description: String,
    pub category: ListingCategory,
    pub funding_goal: Decimal,
    pub current_funding: Decimal,
    pub owner_id: UserId,
    /// Planned execution timeline in months
    pub timeline_months: u32,
    pub team_size: u32,
    /// Free-form traction summary shown to the agent
    pub traction: String,
}

/// Commission tier assigned to a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionTier {
    Standard,
    Growth,
    Premium,
}

impl CommissionTier {
    /// Platform commission rate applied to the agreed investment amount
    pub fn rate(&self) -> Decimal {
        match self {
            Self::Standard => dec!(0.07), // 7%
            Self::Growth => dec!(0.05),   // 5%
            Self::Premium => dec!(0.04),  // 4%
        }
    }
}

impl Default for CommissionTier {
    fn default() -> Self {
        Self::Standard
    }
}

/// Referrer tier, supplied by the referral directory collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralTier {
    Starter,
    Partner,
    Ambassador,
}

impl ReferralTier {
    /// Referral reward rate applied to the settlement base amount
    pub fn reward_rate(&self) -> Decimal {
        match self {
            Self::Starter => dec!(0.005),    // 0.5%
            Self::Partner => dec!(0.01),     // 1%
            Self::Ambassador => dec!(0.015), // 1.5%
        }
    }
}

/// A referral relationship resolved for a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralProfile {
    pub referrer: UserId,
    pub tier: ReferralTier,
}

/// Deposit formula inputs, configured per listing
///
/// The resulting amount is a pure function of listing data so it can be
/// recomputed for audit: `clamp(flat_fee + rate * funding_goal, min, max)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositSchedule {
    pub flat_fee: Decimal,
    /// Fraction of the funding goal added on top of the flat fee
    pub rate: Decimal,
    pub min: Decimal,
    pub max: Decimal,
}

impl DepositSchedule {
    /// Compute the deposit for a listing with the given funding goal
    pub fn amount_for(&self, funding_goal: Decimal) -> Decimal {
        (self.flat_fee + self.rate * funding_goal).clamp(self.min, self.max)
    }
}

impl Default for DepositSchedule {
    fn default() -> Self {
        Self {
            flat_fee: dec!(100),
            rate: dec!(0.001), // 0.1% of the funding goal
            min: dec!(100),
            max: dec!(2_500),
        }
    }
}

/// Listing-level negotiation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationConfig {
    /// Whether the listing accepts negotiation requests at all
    pub enabled: bool,
    pub deposit: DepositSchedule,
    pub commission_tier: CommissionTier,
    /// Negotiation window length in days, measured from deposit confirmation
    pub window_days: i64,
}

impl NegotiationConfig {
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::days(self.window_days)
    }
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            deposit: DepositSchedule::default(),
            commission_tier: CommissionTier::Standard,
            window_days: 3,
        }
    }
}
