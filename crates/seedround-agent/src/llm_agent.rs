//! LLM-backed counterparty agent

use async_trait::async_trait;
use tracing::warn;

use seedround_guard::{TermsGuard, TermsPolicy};
use seedround_llm::{CompletionRequest, LlmRouter, Message};
use seedround_types::{
    ListingSummary, MessageRecord, NegotiationError, Result, SenderRole,
};

use crate::{AgentReply, CounterpartyAgent};

/// Counterparty agent backed by a text-generation provider
///
/// Stateless: every call rebuilds the conversation from the transcript, so
/// the generation backend needs no memory of the session.
pub struct LlmCounterpartyAgent {
    router: LlmRouter,
    guard: TermsGuard,
}

impl LlmCounterpartyAgent {
    pub fn new(router: LlmRouter) -> Self {
        Self {
            router,
            guard: TermsGuard::new(),
        }
    }

    pub fn with_policy(router: LlmRouter, policy: TermsPolicy) -> Self {
        Self {
            router,
            guard: TermsGuard::with_policy(policy),
        }
    }

    /// Create from environment (provider selection + deadline)
    pub fn from_env() -> Self {
        Self::new(LlmRouter::from_env())
    }

    fn system_context(&self, listing: &ListingSummary) -> String {
        let policy = self.guard.policy();
        format!(
            r#"You negotiate investment terms on behalf of the founder of "{title}".

Listing facts:
- Category: {category}
- Funding goal: {goal}
- Raised so far: {raised}
- Execution timeline: {timeline} months
- Team size: {team}
- Traction: {traction}

Negotiation rules:
- Equity offers must stay between {min_eq}% and {max_eq}%
- Do not accept investments below {min_frac} of the funding goal
- Keep replies professional and on-platform; never share contact details

Output valid JSON only, matching this schema:
{{
  "reply": "your message to the investor",
  "terms": {{"investment_amount": 50000, "equity_percent": 12, "timeline_months": 24}},
  "agreement_reached": false
}}

Omit "terms" when you are not making a concrete offer. Set
"agreement_reached" to true only when both sides have converged on the same
numbers."#,
            title = listing.title,
            category = listing.category.display_name(),
            goal = listing.funding_goal,
            raised = listing.current_funding,
            timeline = listing.timeline_months,
            team = listing.team_size,
            traction = listing.traction,
            min_eq = policy.min_equity_percent,
            max_eq = policy.max_equity_percent,
            min_frac = policy.min_investment_fraction,
        )
    }

    fn conversation(
        &self,
        transcript: &[MessageRecord],
        latest_investor_message: &str,
    ) -> Vec<Message> {
        let mut messages: Vec<Message> = transcript
            .iter()
            .map(|m| match m.sender {
                SenderRole::Investor => Message::user(m.content.clone()),
                SenderRole::Owner => Message::assistant(m.content.clone()),
            })
            .collect();
        messages.push(Message::user(latest_investor_message));
        messages
    }
}

#[async_trait]
impl CounterpartyAgent for LlmCounterpartyAgent {
    async fn respond(
        &self,
        listing: &ListingSummary,
        transcript: &[MessageRecord],
        latest_investor_message: &str,
    ) -> Result<AgentReply> {
        let request = CompletionRequest::new(self.conversation(transcript, latest_investor_message))
            .with_system(self.system_context(listing))
            .with_json_mode()
            .with_max_tokens(512);

        let response = self.router.complete_bounded(request).await.map_err(|e| {
            NegotiationError::UpstreamTimeout {
                collaborator: "text-generation",
                message: e.to_string(),
            }
        })?;

        match self.guard.parse_reply(&response.content) {
            Ok(parsed) => Ok(AgentReply {
                reply_text: parsed.reply,
                proposed_terms: parsed.terms.map(Into::into),
                agreement_reached: parsed.agreement_reached,
            }),
            Err(e) => {
                // Not valid JSON: deliver the raw text as a plain reply with
                // no structured terms rather than dropping the round.
                warn!("Agent output failed to parse as JSON: {}", e);
                self.guard
                    .validate_reply_text(&response.content)
                    .map_err(|e| NegotiationError::UpstreamTimeout {
                        collaborator: "text-generation",
                        message: format!("unusable agent output: {e}"),
                    })?;
                Ok(AgentReply::text(response.content))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use seedround_llm::ProviderKind;
    use seedround_types::{ListingCategory, ListingId, UserId};

    fn test_listing() -> ListingSummary {
        ListingSummary {
            id: ListingId::new(),
            title: "Solar micro-grids".to_string(),
            description: "Community-owned solar".to_string(),
            category: ListingCategory::CleanEnergy,
            funding_goal: dec!(500_000),
            current_funding: dec!(120_000),
            owner_id: UserId::new(),
            timeline_months: 18,
            team_size: 6,
            traction: "Two pilot sites".to_string(),
        }
    }

    #[tokio::test]
    async fn test_deterministic_backend_produces_reply() {
        let agent =
            LlmCounterpartyAgent::new(LlmRouter::from_kind(ProviderKind::Deterministic));

        let reply = agent
            .respond(&test_listing(), &[], "What terms would you consider?")
            .await
            .unwrap();

        assert!(!reply.reply_text.is_empty());
        assert!(!reply.agreement_reached);
    }

    #[test]
    fn test_system_context_includes_listing_facts() {
        let agent =
            LlmCounterpartyAgent::new(LlmRouter::from_kind(ProviderKind::Deterministic));
        let context = agent.system_context(&test_listing());

        assert!(context.contains("Solar micro-grids"));
        assert!(context.contains("500000"));
        assert!(context.contains("Two pilot sites"));
    }

    #[test]
    fn test_conversation_maps_roles() {
        let agent =
            LlmCounterpartyAgent::new(LlmRouter::from_kind(ProviderKind::Deterministic));
        let session_id = seedround_types::SessionId::new();
        let transcript = vec![
            MessageRecord::investor(session_id.clone(), "Opening offer", false),
            MessageRecord::owner(session_id, "Counter-offer"),
        ];

        let messages = agent.conversation(&transcript, "Follow-up");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, seedround_llm::MessageRole::User);
        assert_eq!(messages[1].role, seedround_llm::MessageRole::Assistant);
        assert_eq!(messages[2].content, "Follow-up");
    }
}
