//! Seedround Guard - Agent output validator
//!
//! This crate validates the counterparty agent's JSON output before any of it
//! is used. The agent negotiates on behalf of the listing owner, but its
//! output is untrusted text from a generation model.
//!
//! # Key Principle
//!
//! **The agent may PROPOSE terms, it can NEVER commit them.**
//!
//! Proposed terms are checked against the listing's policy bounds:
//! - Equity share within the configured window
//! - Investment no smaller than the configured fraction of the funding goal
//! - Sane, positive numbers throughout
//!
//! An out-of-bounds proposal is rejected and the orchestrator refuses to mark
//! agreement as reached, even when the agent claims it.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use seedround_types::NegotiationTerms;

/// Errors that can occur during validation
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Equity {proposed}% outside allowed range [{min}%, {max}%]")]
    EquityOutOfBounds {
        proposed: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("Investment {proposed} below minimum {minimum} ({fraction} of funding goal)")]
    InvestmentTooSmall {
        proposed: Decimal,
        minimum: Decimal,
        fraction: Decimal,
    },

    #[error("Timeline of {months} months outside allowed range [{min}, {max}]")]
    TimelineOutOfBounds { months: u32, min: u32, max: u32 },

    #[error("Proposed amount must be positive, got {amount}")]
    NonPositiveAmount { amount: Decimal },

    #[error("Reply text rejected: {reason}")]
    ReplyRejected { reason: String },

    #[error("Invalid JSON structure: {message}")]
    InvalidJson { message: String },
}

pub type Result<T> = std::result::Result<T, GuardError>;

/// Policy bounds applied to agent-proposed terms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermsPolicy {
    /// Minimum equity share the owner side may offer, in percent
    pub min_equity_percent: Decimal,
    /// Maximum equity share the owner side may offer, in percent
    pub max_equity_percent: Decimal,
    /// Investment must be at least this fraction of the funding goal
    pub min_investment_fraction: Decimal,
    /// Timeline bounds in months
    pub min_timeline_months: u32,
    pub max_timeline_months: u32,
    /// Hard cap on reply text length
    pub max_reply_chars: usize,
}

impl Default for TermsPolicy {
    fn default() -> Self {
        Self {
            min_equity_percent: dec!(5),
            max_equity_percent: dec!(30),
            min_investment_fraction: dec!(0.05), // 5% of the funding goal
            min_timeline_months: 1,
            max_timeline_months: 120,
            max_reply_chars: 4_000,
        }
    }
}

/// The agent's parsed JSON output: a reply, optional terms, and an agreement
/// claim that is only honored if the terms survive validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedReply {
    pub reply: String,
    #[serde(default)]
    pub terms: Option<ProposedTerms>,
    #[serde(default)]
    pub agreement_reached: bool,
}

/// Terms as proposed in the agent's JSON, prior to validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedTerms {
    pub investment_amount: Decimal,
    pub equity_percent: Decimal,
    pub timeline_months: u32,
}

impl From<ProposedTerms> for NegotiationTerms {
    fn from(p: ProposedTerms) -> Self {
        Self {
            investment_amount: p.investment_amount,
            equity_percent: p.equity_percent,
            timeline_months: p.timeline_months,
        }
    }
}

impl From<&NegotiationTerms> for ProposedTerms {
    fn from(t: &NegotiationTerms) -> Self {
        Self {
            investment_amount: t.investment_amount,
            equity_percent: t.equity_percent,
            timeline_months: t.timeline_months,
        }
    }
}

/// The Seedround Guard
///
/// Validates all agent output before it can influence a session.
pub struct TermsGuard {
    policy: TermsPolicy,
}

impl TermsGuard {
    /// Create a guard with default policy
    pub fn new() -> Self {
        Self {
            policy: TermsPolicy::default(),
        }
    }

    /// Create a guard with custom policy
    pub fn with_policy(policy: TermsPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &TermsPolicy {
        &self.policy
    }

    /// Parse the agent's JSON output
    ///
    /// Generation models occasionally wrap JSON in code fences or prose;
    /// a failed direct parse retries on the outermost brace span.
    pub fn parse_reply(&self, raw: &str) -> Result<ProposedReply> {
        let direct: std::result::Result<ProposedReply, _> = serde_json::from_str(raw);
        let reply = match direct {
            Ok(reply) => reply,
            Err(first_err) => {
                let span = raw.find('{').and_then(|start| {
                    raw.rfind('}')
                        .filter(|&end| end > start)
                        .map(|end| &raw[start..=end])
                });
                match span {
                    Some(inner) => {
                        serde_json::from_str(inner).map_err(|e| GuardError::InvalidJson {
                            message: e.to_string(),
                        })?
                    }
                    None => {
                        return Err(GuardError::InvalidJson {
                            message: first_err.to_string(),
                        })
                    }
                }
            }
        };

        self.validate_reply_text(&reply.reply)?;
        Ok(reply)
    }

    /// Validate reply text independent of terms
    pub fn validate_reply_text(&self, reply: &str) -> Result<()> {
        if reply.trim().is_empty() {
            return Err(GuardError::ReplyRejected {
                reason: "empty reply".to_string(),
            });
        }
        if reply.chars().count() > self.policy.max_reply_chars {
            return Err(GuardError::ReplyRejected {
                reason: format!("reply exceeds {} characters", self.policy.max_reply_chars),
            });
        }
        Ok(())
    }

    /// Validate proposed terms against the policy bounds for a given listing
    pub fn validate_terms(&self, terms: &ProposedTerms, funding_goal: Decimal) -> Result<()> {
        if terms.investment_amount <= Decimal::ZERO {
            return Err(GuardError::NonPositiveAmount {
                amount: terms.investment_amount,
            });
        }

        if terms.equity_percent < self.policy.min_equity_percent
            || terms.equity_percent > self.policy.max_equity_percent
        {
            return Err(GuardError::EquityOutOfBounds {
                proposed: terms.equity_percent,
                min: self.policy.min_equity_percent,
                max: self.policy.max_equity_percent,
            });
        }

        let minimum = funding_goal * self.policy.min_investment_fraction;
        if terms.investment_amount < minimum {
            return Err(GuardError::InvestmentTooSmall {
                proposed: terms.investment_amount,
                minimum,
                fraction: self.policy.min_investment_fraction,
            });
        }

        if terms.timeline_months < self.policy.min_timeline_months
            || terms.timeline_months > self.policy.max_timeline_months
        {
            return Err(GuardError::TimelineOutOfBounds {
                months: terms.timeline_months,
                min: self.policy.min_timeline_months,
                max: self.policy.max_timeline_months,
            });
        }

        Ok(())
    }
}

impl Default for TermsGuard {
    fn default() -> Self {
        Self::new()
    }
}
