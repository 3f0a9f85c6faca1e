//! Negotiation orchestrator
//!
//! The façade coordinating gate, deposit ledger, moderator, counterparty
//! agent, and settlement on each inbound request. Every state-mutating
//! operation runs under a per-session async mutex, so two concurrent calls
//! against the same session serialize while different sessions proceed fully
//! in parallel.
//!
//! Expiry is lazy: every operation first checks the window against the clock
//! and, if elapsed, transitions the session to `expired` (releasing the
//! deposit) before rejecting the triggering request.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};

use seedround_agent::{CounterpartyAgent, FALLBACK_REPLY};
use seedround_deposit::{required_deposit, DepositLedger};
use seedround_guard::{ProposedTerms, TermsGuard, TermsPolicy};
use seedround_moderation::ContentModerator;
use seedround_settlement::SettlementEngine;
use seedround_types::{
    DepositRecord, DepositStatus, ListingId, ListingSummary, MessageRecord, NegotiationError,
    NegotiationSession, NegotiationTerms, Result, SenderRole, SessionId, SessionStatus,
    SettlementRecord, UserId,
};

use crate::access::AccessGate;
use crate::directory::{AccessDirectory, ListingDirectory};
use crate::notify::{NotificationEvent, Notifier};
use crate::store::{MessageStore, SessionStore};

/// Result of posting a message into a negotiation
#[derive(Debug, Clone)]
pub struct PostMessageOutcome {
    /// The persisted inbound message (flag set by the moderator)
    pub message: MessageRecord,
    /// The persisted agent reply; `None` for owner-side posts and for
    /// generation failures
    pub reply: Option<MessageRecord>,
    /// Fixed reply returned when the generation backend failed; the caller
    /// may retry, session state is unchanged
    pub fallback_reply: Option<String>,
    /// Whether this round moved the session to `agreement_reached`
    pub agreement_reached: bool,
}

impl PostMessageOutcome {
    /// The text shown to the investor for this round, if any
    pub fn reply_text(&self) -> Option<&str> {
        self.reply
            .as_ref()
            .map(|m| m.content.as_str())
            .or(self.fallback_reply.as_deref())
    }
}

/// Coordinates the negotiation components on each inbound request
pub struct NegotiationOrchestrator {
    sessions: Arc<dyn SessionStore>,
    messages: Arc<dyn MessageStore>,
    listings: Arc<dyn ListingDirectory>,
    gate: AccessGate,
    deposits: Arc<DepositLedger>,
    settlement: Arc<SettlementEngine>,
    agent: Arc<dyn CounterpartyAgent>,
    moderator: ContentModerator,
    guard: TermsGuard,
    notifier: Arc<dyn Notifier>,
    /// Per-session mutual exclusion for state-mutating operations
    locks: DashMap<SessionId, Arc<Mutex<()>>>,
}

impl NegotiationOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        messages: Arc<dyn MessageStore>,
        listings: Arc<dyn ListingDirectory>,
        access: Arc<dyn AccessDirectory>,
        deposits: Arc<DepositLedger>,
        settlement: Arc<SettlementEngine>,
        agent: Arc<dyn CounterpartyAgent>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            sessions,
            messages,
            listings,
            gate: AccessGate::new(access),
            deposits,
            settlement,
            agent,
            moderator: ContentModerator::new(),
            guard: TermsGuard::new(),
            notifier,
            locks: DashMap::new(),
        }
    }

    /// Override the terms policy applied to agent proposals
    pub fn with_terms_policy(mut self, policy: TermsPolicy) -> Self {
        self.guard = TermsGuard::with_policy(policy);
        self
    }

    // ========================================================================
    // Public operations
    // ========================================================================

    /// Open a negotiation: gate check, deposit amount computation, session
    /// creation in `pending`
    pub async fn open(&self, actor: &UserId, listing_id: &ListingId) -> Result<SessionId> {
        let listing = self.listings.summary(listing_id).await?;
        let config = self.listings.negotiation_config(listing_id).await?;

        self.gate.can_open(actor, &listing, &config).await?;

        let amount = required_deposit(&config, &listing);
        let session = NegotiationSession::open(
            listing_id.clone(),
            actor.clone(),
            listing.owner_id.clone(),
            amount,
        );
        let session_id = session.id.clone();

        // The store enforces the one-live-session rule atomically with the
        // insert; a losing concurrent open fails here.
        self.sessions.create(session).await?;
        self.deposits
            .request_deposit(session_id.clone(), actor.clone(), amount)
            .await?;

        info!(
            "Negotiation {} opened by {} on listing {} (deposit {})",
            session_id, actor, listing_id, amount
        );
        Ok(session_id)
    }

    /// Confirm the deposit payment: hold the funds and activate the session
    pub async fn confirm_deposit(&self, session_id: &SessionId, actor: &UserId) -> Result<()> {
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;

        let mut session = self.sessions.get(session_id).await?;
        self.reject_if_expired(&mut session).await?;

        if actor != &session.initiator {
            return Err(NegotiationError::unauthorized(
                "only the initiator can confirm the deposit",
            ));
        }
        if session.status != SessionStatus::Pending {
            return Err(NegotiationError::InvalidTransition {
                from: session.status,
                action: "confirm the deposit of",
            });
        }

        let config = self.listings.negotiation_config(&session.listing_id).await?;

        // Wallet first: a failed debit leaves the session pending.
        self.deposits.confirm_hold(session_id).await?;

        session.activate(config.window(), Utc::now())?;
        self.sessions.update(session.clone()).await?;

        self.emit(NotificationEvent::DepositHeld {
            session_id: session_id.clone(),
            amount: session.deposit_amount,
        })
        .await;
        info!("Negotiation {} activated, window ends {:?}", session_id, session.window_end);
        Ok(())
    }

    /// Post a message into an active negotiation and collect the agent reply
    pub async fn post_message(
        &self,
        session_id: &SessionId,
        actor: &UserId,
        text: &str,
    ) -> Result<PostMessageOutcome> {
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;

        let mut session = self.sessions.get(session_id).await?;
        self.reject_if_expired(&mut session).await?;

        if !session.is_participant(actor) {
            return Err(NegotiationError::unauthorized(
                "only session participants can post messages",
            ));
        }
        if session.status != SessionStatus::Active {
            return Err(NegotiationError::InvalidTransition {
                from: session.status,
                action: "post a message to",
            });
        }

        let sender = if actor == &session.initiator {
            SenderRole::Investor
        } else {
            SenderRole::Owner
        };

        // Moderation flags, it never blocks.
        let verdict = self.moderator.scan(text);
        if verdict.flagged {
            warn!(
                "Message in session {} flagged by moderation: {:?}",
                session_id, verdict.matched_rules
            );
        }

        let transcript = self.messages.transcript(session_id).await;
        let message = MessageRecord::new(session_id.clone(), sender, text, verdict.flagged);
        self.messages.append(message.clone()).await?;

        // The counterparty agent only answers the investor; a (rare) manual
        // owner-side post is persisted without generating a reply.
        if sender == SenderRole::Owner {
            return Ok(PostMessageOutcome {
                message,
                reply: None,
                fallback_reply: None,
                agreement_reached: false,
            });
        }

        let listing = self.listings.summary(&session.listing_id).await?;
        let agent_reply = match self.agent.respond(&listing, &transcript, text).await {
            Ok(reply) => reply,
            Err(e) => {
                // Generation failed or timed out: fixed fallback reply, no
                // state advance beyond the persisted investor message.
                warn!(
                    "Counterparty agent failed for session {}: {}, returning fallback",
                    session_id, e
                );
                return Ok(PostMessageOutcome {
                    message,
                    reply: None,
                    fallback_reply: Some(FALLBACK_REPLY.to_string()),
                    agreement_reached: false,
                });
            }
        };

        let (terms, agreement) = self.apply_terms_policy(
            session_id,
            &listing,
            agent_reply.proposed_terms,
            agent_reply.agreement_reached,
        );

        let reply = MessageRecord::owner(session_id.clone(), agent_reply.reply_text);
        self.messages.append(reply.clone()).await?;

        match (terms, agreement) {
            (Some(agreed), true) => {
                session.record_agreement(agreed.clone())?;
                self.sessions.update(session.clone()).await?;
                self.emit(NotificationEvent::AgreementReached {
                    session_id: session_id.clone(),
                    terms: agreed,
                })
                .await;
                info!("Negotiation {} reached agreement", session_id);
            }
            (Some(proposal), false) => {
                session.proposed_terms = Some(proposal);
                self.sessions.update(session.clone()).await?;
            }
            (None, _) => {}
        }

        Ok(PostMessageOutcome {
            message,
            reply: Some(reply),
            fallback_reply: None,
            agreement_reached: agreement,
        })
    }

    /// Cancel a pending or active negotiation; either participant may cancel
    pub async fn cancel(&self, session_id: &SessionId, actor: &UserId) -> Result<()> {
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;

        let mut session = self.sessions.get(session_id).await?;
        self.reject_if_expired(&mut session).await?;

        if !session.is_participant(actor) {
            return Err(NegotiationError::unauthorized(
                "only session participants can cancel",
            ));
        }
        if !session.status.is_live() {
            return Err(NegotiationError::InvalidTransition {
                from: session.status,
                action: "cancel",
            });
        }

        // Held funds go back to the investor before the status flips.
        if session.deposit_status == DepositStatus::Held {
            self.deposits.release(session_id).await?;
            session.mark_deposit(DepositStatus::Released)?;
        }

        session.cancel()?;
        self.sessions.update(session).await?;

        self.emit(NotificationEvent::SessionCancelled {
            session_id: session_id.clone(),
            by: actor.clone(),
        })
        .await;
        info!("Negotiation {} cancelled by {}", session_id, actor);
        Ok(())
    }

    /// Finalize an agreed session: run settlement, release the deposit, and
    /// complete the session
    ///
    /// Idempotent: finalizing an already-completed session returns the
    /// existing settlement records without side effects.
    pub async fn finalize(&self, session_id: &SessionId) -> Result<Vec<SettlementRecord>> {
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;

        let mut session = self.sessions.get(session_id).await?;

        if session.status == SessionStatus::Completed {
            return Ok(self.settlement.records_for(session_id).await);
        }
        if session.status != SessionStatus::AgreementReached {
            return Err(NegotiationError::InvalidTransition {
                from: session.status,
                action: "finalize",
            });
        }

        let config = self.listings.negotiation_config(&session.listing_id).await?;

        // Settlement is keyed by (session, kind) and therefore safe to rerun
        // if a later step fails and the caller retries.
        let records = self.settlement.settle(&session, &config).await?;

        if session.deposit_status == DepositStatus::Held {
            self.deposits.release(session_id).await?;
            session.mark_deposit(DepositStatus::Released)?;
        }

        session.finalize(Utc::now())?;
        self.sessions.update(session).await?;

        self.emit(NotificationEvent::SessionCompleted {
            session_id: session_id.clone(),
        })
        .await;
        info!(
            "Negotiation {} completed with {} settlement record(s)",
            session_id,
            records.len()
        );
        Ok(records)
    }

    /// Background sweep: expire every active session past its window
    ///
    /// Safe to run concurrently with live `post_message` calls; both paths
    /// take the per-session lock, so a session either replies or expires for
    /// a given request, never both.
    pub async fn expire_due_sessions(&self) -> Result<usize> {
        let mut expired = 0;
        for session_id in self.sessions.active_session_ids().await {
            let lock = self.lock_for(&session_id);
            let _guard = lock.lock().await;

            let mut session = match self.sessions.get(&session_id).await {
                Ok(session) => session,
                Err(_) => continue,
            };
            if self.expire_if_elapsed(&mut session).await? {
                expired += 1;
            }
        }
        Ok(expired)
    }

    // ========================================================================
    // Read access
    // ========================================================================

    pub async fn session(&self, session_id: &SessionId) -> Result<NegotiationSession> {
        self.sessions.get(session_id).await
    }

    pub async fn transcript(&self, session_id: &SessionId) -> Vec<MessageRecord> {
        self.messages.transcript(session_id).await
    }

    pub async fn deposit(&self, session_id: &SessionId) -> Option<DepositRecord> {
        self.deposits.get(session_id).await
    }

    pub async fn settlements(&self, session_id: &SessionId) -> Vec<SettlementRecord> {
        self.settlement.records_for(session_id).await
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn lock_for(&self, session_id: &SessionId) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Lazy expiry: transition an over-window active session to `expired`
    /// (releasing the deposit) and report whether it fired
    ///
    /// Must be called with the per-session lock held.
    async fn expire_if_elapsed(&self, session: &mut NegotiationSession) -> Result<bool> {
        let now = Utc::now();
        if session.status != SessionStatus::Active || !session.window_elapsed(now) {
            return Ok(false);
        }

        // Wallet first: a failed release keeps the session active so the
        // next access retries the whole expiry atomically.
        self.deposits.release(&session.id).await?;
        session.mark_deposit(DepositStatus::Released)?;
        session.expire(now)?;
        self.sessions.update(session.clone()).await?;

        self.emit(NotificationEvent::SessionExpired {
            session_id: session.id.clone(),
        })
        .await;
        info!("Negotiation {} expired", session.id);
        Ok(true)
    }

    /// Expire if due, then reject the triggering request
    async fn reject_if_expired(&self, session: &mut NegotiationSession) -> Result<()> {
        if self.expire_if_elapsed(session).await? || session.status == SessionStatus::Expired {
            return Err(NegotiationError::NegotiationExpired {
                session_id: session.id.to_string(),
            });
        }
        Ok(())
    }

    /// Enforce the terms policy on agent output
    ///
    /// Out-of-bounds proposals are dropped and the agreement claim with
    /// them; an agreement claim without terms is ignored. The agent is never
    /// trusted to advance state on its own say-so.
    fn apply_terms_policy(
        &self,
        session_id: &SessionId,
        listing: &ListingSummary,
        proposed: Option<NegotiationTerms>,
        claimed_agreement: bool,
    ) -> (Option<NegotiationTerms>, bool) {
        let terms = match proposed {
            Some(terms) => {
                let check = self
                    .guard
                    .validate_terms(&ProposedTerms::from(&terms), listing.funding_goal);
                match check {
                    Ok(()) => Some(terms),
                    Err(e) => {
                        warn!(
                            "Policy violation in session {}: {}, proposal dropped",
                            session_id, e
                        );
                        None
                    }
                }
            }
            None => None,
        };

        let agreement = match (&terms, claimed_agreement) {
            (Some(_), true) => true,
            (None, true) => {
                warn!(
                    "Agent claimed agreement without valid terms in session {}, ignored",
                    session_id
                );
                false
            }
            (_, false) => false,
        };

        (terms, agreement)
    }

    async fn emit(&self, event: NotificationEvent) {
        // Fire-and-forget: a failed delivery never rolls back state.
        if let Err(e) = self.notifier.notify(event).await {
            warn!("Notification delivery failed: {}", e);
        }
    }
}
