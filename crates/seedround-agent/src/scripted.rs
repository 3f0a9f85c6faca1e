//! Scripted counterparty agent for tests and the demo

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use seedround_types::{
    ListingSummary, MessageRecord, NegotiationError, Result,
};

use crate::{AgentReply, CounterpartyAgent};

/// One scripted step: a canned reply or an injected backend failure
enum ScriptStep {
    Reply(AgentReply),
    Fail,
}

/// Deterministic counterparty agent
///
/// Pops one scripted step per round; once the script runs dry it answers
/// with a neutral holding reply. Failures can be scripted to exercise the
/// engine's fallback path.
pub struct ScriptedCounterpartyAgent {
    script: Mutex<VecDeque<ScriptStep>>,
}

impl ScriptedCounterpartyAgent {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue a reply for the next round
    pub async fn push_reply(&self, reply: AgentReply) {
        self.script.lock().await.push_back(ScriptStep::Reply(reply));
    }

    /// Queue a backend failure for the next round
    pub async fn push_failure(&self) {
        self.script.lock().await.push_back(ScriptStep::Fail);
    }
}

impl Default for ScriptedCounterpartyAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterpartyAgent for ScriptedCounterpartyAgent {
    async fn respond(
        &self,
        listing: &ListingSummary,
        _transcript: &[MessageRecord],
        _latest_investor_message: &str,
    ) -> Result<AgentReply> {
        match self.script.lock().await.pop_front() {
            Some(ScriptStep::Reply(reply)) => Ok(reply),
            Some(ScriptStep::Fail) => Err(NegotiationError::UpstreamTimeout {
                collaborator: "text-generation",
                message: "scripted failure".to_string(),
            }),
            None => Ok(AgentReply::text(format!(
                "Thanks for your interest in {}. Could you share more about \
                 the size of investment you have in mind?",
                listing.title
            ))),
        }
    }
}
