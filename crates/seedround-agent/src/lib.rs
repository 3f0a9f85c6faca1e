//! Seedround Agent - The counterparty side of a negotiation
//!
//! The counterparty agent produces the next owner-side message and,
//! optionally, proposed terms, given the full transcript and the listing
//! summary. It is a pure function of its inputs: no session state lives in
//! the agent, which keeps it swappable and unit-testable with a
//! deterministic stub.
//!
//! The orchestrator never trusts agent output blindly: proposed terms are
//! policy-checked by `seedround-guard` at the call site, and an agreement
//! claim without surviving terms is ignored.

mod llm_agent;
mod scripted;

pub use llm_agent::LlmCounterpartyAgent;
pub use scripted::ScriptedCounterpartyAgent;

use async_trait::async_trait;

use seedround_types::{ListingSummary, MessageRecord, NegotiationTerms, Result};

/// Fixed reply returned when text generation is unavailable; the session
/// stays active and the investor may retry
pub const FALLBACK_REPLY: &str =
    "Thanks for your message. I need a moment before I can respond properly. \
     Please check back shortly.";

/// What the counterparty agent produced for one negotiation round
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub reply_text: String,
    /// Terms as proposed; policy validation happens in the orchestrator
    pub proposed_terms: Option<NegotiationTerms>,
    /// The agent's claim that a deal was reached; only honored when the
    /// accompanying terms survive policy validation
    pub agreement_reached: bool,
}

impl AgentReply {
    pub fn text(reply_text: impl Into<String>) -> Self {
        Self {
            reply_text: reply_text.into(),
            proposed_terms: None,
            agreement_reached: false,
        }
    }

    pub fn with_terms(mut self, terms: NegotiationTerms) -> Self {
        self.proposed_terms = Some(terms);
        self
    }

    pub fn agreeing(mut self) -> Self {
        self.agreement_reached = true;
        self
    }
}

/// Produces the owner's side of the conversation
#[async_trait]
pub trait CounterpartyAgent: Send + Sync {
    /// Generate the next reply given the listing context, the transcript so
    /// far, and the investor message that triggered this round
    ///
    /// Errors mean the generation backend failed or timed out; the caller
    /// degrades to [`FALLBACK_REPLY`] without advancing session state.
    async fn respond(
        &self,
        listing: &ListingSummary,
        transcript: &[MessageRecord],
        latest_investor_message: &str,
    ) -> Result<AgentReply>;
}
