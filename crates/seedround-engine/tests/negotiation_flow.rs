//! End-to-end negotiation flows against in-memory collaborators

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use seedround_agent::{AgentReply, ScriptedCounterpartyAgent};
use seedround_deposit::DepositLedger;
use seedround_engine::{
    InMemoryAccessDirectory, InMemoryListings, InMemoryMessages, InMemorySessions,
    NegotiationOrchestrator, NotificationEvent, RecordingNotifier,
};
use seedround_ledger::{InMemoryWallets, WalletLedger};
use seedround_settlement::{InMemoryReferrals, SettlementEngine};
use seedround_types::{
    AccessDeniedReason, AccessRecord, AccessScope, DepositStatus, ListingCategory, ListingId,
    ListingSummary, NegotiationConfig, NegotiationError, NegotiationTerms, ReferralProfile,
    ReferralTier, SenderRole, SessionStatus, SettlementKind, UserId,
};

struct Harness {
    orchestrator: Arc<NegotiationOrchestrator>,
    wallets: Arc<InMemoryWallets>,
    referrals: Arc<InMemoryReferrals>,
    agent: Arc<ScriptedCounterpartyAgent>,
    notifier: Arc<RecordingNotifier>,
    treasury: UserId,
    investor: UserId,
    owner: UserId,
    listing_id: ListingId,
}

async fn harness_with_config(config: NegotiationConfig) -> Harness {
    let investor = UserId::new();
    let owner = UserId::new();
    let treasury = UserId::new();

    let listing = ListingSummary {
        id: ListingId::new(),
        title: "Solar micro-grids".to_string(),
        description: "Community-owned solar for rural towns".to_string(),
        category: ListingCategory::CleanEnergy,
        funding_goal: dec!(500_000),
        current_funding: dec!(120_000),
        owner_id: owner.clone(),
        timeline_months: 18,
        team_size: 6,
        traction: "Two pilot sites, 400 subscribers".to_string(),
    };
    let listing_id = listing.id.clone();

    let listings = Arc::new(InMemoryListings::new());
    listings.insert(listing, config).await;

    let access = Arc::new(InMemoryAccessDirectory::new());
    access
        .grant(AccessRecord {
            user_id: investor.clone(),
            scope: AccessScope::Platform,
            signed_at: chrono::Utc::now(),
            expires_at: None,
            valid: true,
        })
        .await;

    let wallets = Arc::new(InMemoryWallets::new());
    wallets.set_balance(investor.clone(), dec!(10_000)).await;

    let referrals = Arc::new(InMemoryReferrals::new());
    let deposits = Arc::new(DepositLedger::new(wallets.clone(), treasury.clone()));
    let settlement = Arc::new(SettlementEngine::new(
        wallets.clone(),
        referrals.clone(),
        treasury.clone(),
    ));
    let agent = Arc::new(ScriptedCounterpartyAgent::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let orchestrator = Arc::new(NegotiationOrchestrator::new(
        Arc::new(InMemorySessions::new()),
        Arc::new(InMemoryMessages::new()),
        listings,
        access,
        deposits,
        settlement,
        agent.clone(),
        notifier.clone(),
    ));

    Harness {
        orchestrator,
        wallets,
        referrals,
        agent,
        notifier,
        treasury,
        investor,
        owner,
        listing_id,
    }
}

async fn harness() -> Harness {
    harness_with_config(NegotiationConfig::default()).await
}

/// Config whose window has already elapsed the moment the session activates
fn instant_expiry_config() -> NegotiationConfig {
    NegotiationConfig {
        window_days: 0,
        ..NegotiationConfig::default()
    }
}

fn in_bounds_terms() -> NegotiationTerms {
    NegotiationTerms {
        investment_amount: dec!(50_000),
        equity_percent: dec!(12),
        timeline_months: 24,
    }
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn full_negotiation_reaches_settlement() {
    let h = harness().await;

    let session_id = h
        .orchestrator
        .open(&h.investor, &h.listing_id)
        .await
        .unwrap();

    let session = h.orchestrator.session(&session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Pending);
    // 100 flat + 0.1% of 500_000
    assert_eq!(session.deposit_amount, dec!(600));

    h.orchestrator
        .confirm_deposit(&session_id, &h.investor)
        .await
        .unwrap();
    assert_eq!(h.wallets.balance(&h.investor).await, dec!(9_400));

    h.agent
        .push_reply(
            AgentReply::text("Happy to accept: 50000 for 12% over 24 months.")
                .with_terms(in_bounds_terms())
                .agreeing(),
        )
        .await;

    let outcome = h
        .orchestrator
        .post_message(&session_id, &h.investor, "I can offer 50000 for 12%.")
        .await
        .unwrap();
    assert!(outcome.agreement_reached);
    assert!(outcome.reply.is_some());

    let session = h.orchestrator.session(&session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::AgreementReached);
    assert!(session.agreement_reached);
    assert_eq!(session.agreed_terms, Some(in_bounds_terms()));

    let records = h.orchestrator.finalize(&session_id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, SettlementKind::PlatformCommission);
    // 7% of the agreed 50_000 investment
    assert_eq!(records[0].amount, dec!(3_500.00));
    assert_eq!(h.wallets.balance(&h.treasury).await, dec!(3_500.00));

    let session = h.orchestrator.session(&session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    // Deposit returned to the investor on completion
    assert_eq!(session.deposit_status, DepositStatus::Released);
    assert_eq!(h.wallets.balance(&h.investor).await, dec!(10_000));

    let events = h.notifier.events().await;
    assert!(events
        .iter()
        .any(|e| matches!(e, NotificationEvent::DepositHeld { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, NotificationEvent::AgreementReached { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, NotificationEvent::SessionCompleted { .. })));
}

#[tokio::test]
async fn finalize_is_idempotent() {
    let h = harness().await;

    let session_id = h
        .orchestrator
        .open(&h.investor, &h.listing_id)
        .await
        .unwrap();
    h.orchestrator
        .confirm_deposit(&session_id, &h.investor)
        .await
        .unwrap();
    h.agent
        .push_reply(AgentReply::text("Deal.").with_terms(in_bounds_terms()).agreeing())
        .await;
    h.orchestrator
        .post_message(&session_id, &h.investor, "Final offer: 50000 for 12%.")
        .await
        .unwrap();

    let first = h.orchestrator.finalize(&session_id).await.unwrap();
    let second = h.orchestrator.finalize(&session_id).await.unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(h.orchestrator.settlements(&session_id).await.len(), 1);
    // Treasury credited exactly once
    assert_eq!(h.wallets.balance(&h.treasury).await, dec!(3_500.00));
}

#[tokio::test]
async fn referred_investor_yields_referral_record() {
    let h = harness().await;
    let referrer = UserId::new();
    h.referrals.set_referrer(
        h.investor.clone(),
        ReferralProfile {
            referrer: referrer.clone(),
            tier: ReferralTier::Ambassador,
        },
    );

    let session_id = h
        .orchestrator
        .open(&h.investor, &h.listing_id)
        .await
        .unwrap();
    h.orchestrator
        .confirm_deposit(&session_id, &h.investor)
        .await
        .unwrap();
    h.agent
        .push_reply(AgentReply::text("Deal.").with_terms(in_bounds_terms()).agreeing())
        .await;
    h.orchestrator
        .post_message(&session_id, &h.investor, "50000 for 12%?")
        .await
        .unwrap();

    let records = h.orchestrator.finalize(&session_id).await.unwrap();
    assert_eq!(records.len(), 2);

    let reward = records
        .iter()
        .find(|r| r.kind == SettlementKind::Referral)
        .unwrap();
    // 1.5% of 50_000
    assert_eq!(reward.amount, dec!(750.00));
    assert_eq!(h.wallets.balance(&referrer).await, dec!(750.00));
}

// ============================================================================
// Access gating
// ============================================================================

#[tokio::test]
async fn owner_cannot_open_own_listing() {
    let h = harness().await;
    let err = h
        .orchestrator
        .open(&h.owner, &h.listing_id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        NegotiationError::AccessDenied {
            reason: AccessDeniedReason::SelfNegotiation
        }
    ));
}

#[tokio::test]
async fn unsigned_investor_cannot_open() {
    let h = harness().await;
    let stranger = UserId::new();
    let err = h
        .orchestrator
        .open(&stranger, &h.listing_id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        NegotiationError::AccessDenied {
            reason: AccessDeniedReason::AccessNotGranted
        }
    ));
}

#[tokio::test]
async fn concurrent_opens_admit_exactly_one() {
    let h = harness().await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let orchestrator = h.orchestrator.clone();
            let investor = h.investor.clone();
            let listing_id = h.listing_id.clone();
            tokio::spawn(async move { orchestrator.open(&investor, &listing_id).await })
        })
        .collect();

    let mut successes = 0;
    let mut already_active = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(NegotiationError::AccessDenied {
                reason: AccessDeniedReason::AlreadyActive,
            }) => already_active += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(already_active, 7);
}

#[tokio::test]
async fn terminal_session_allows_reopening() {
    let h = harness().await;

    let first = h
        .orchestrator
        .open(&h.investor, &h.listing_id)
        .await
        .unwrap();
    h.orchestrator.cancel(&first, &h.investor).await.unwrap();

    // The live-pair slot is free again
    h.orchestrator
        .open(&h.investor, &h.listing_id)
        .await
        .unwrap();
}

// ============================================================================
// Deposit lifecycle
// ============================================================================

#[tokio::test]
async fn only_initiator_confirms_deposit() {
    let h = harness().await;
    let session_id = h
        .orchestrator
        .open(&h.investor, &h.listing_id)
        .await
        .unwrap();

    let err = h
        .orchestrator
        .confirm_deposit(&session_id, &h.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, NegotiationError::Unauthorized { .. }));
}

#[tokio::test]
async fn failed_debit_leaves_session_pending() {
    let h = harness().await;
    // Drain the investor wallet below the deposit amount
    h.wallets.set_balance(h.investor.clone(), dec!(10)).await;

    let session_id = h
        .orchestrator
        .open(&h.investor, &h.listing_id)
        .await
        .unwrap();
    let err = h
        .orchestrator
        .confirm_deposit(&session_id, &h.investor)
        .await
        .unwrap_err();
    assert!(matches!(err, NegotiationError::InsufficientFunds { .. }));

    let session = h.orchestrator.session(&session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Pending);
    assert_eq!(session.deposit_status, DepositStatus::Pending);
}

#[tokio::test]
async fn cancel_releases_held_deposit() {
    let h = harness().await;
    let session_id = h
        .orchestrator
        .open(&h.investor, &h.listing_id)
        .await
        .unwrap();
    h.orchestrator
        .confirm_deposit(&session_id, &h.investor)
        .await
        .unwrap();
    assert_eq!(h.wallets.balance(&h.investor).await, dec!(9_400));

    h.orchestrator.cancel(&session_id, &h.investor).await.unwrap();

    let session = h.orchestrator.session(&session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Cancelled);
    assert_eq!(session.deposit_status, DepositStatus::Released);
    assert_eq!(h.wallets.balance(&h.investor).await, dec!(10_000));
}

// ============================================================================
// Messaging & moderation
// ============================================================================

#[tokio::test]
async fn flagged_message_still_gets_a_reply() {
    let h = harness().await;
    let session_id = h
        .orchestrator
        .open(&h.investor, &h.listing_id)
        .await
        .unwrap();
    h.orchestrator
        .confirm_deposit(&session_id, &h.investor)
        .await
        .unwrap();

    h.agent
        .push_reply(AgentReply::text("Let's keep everything on the platform."))
        .await;

    let outcome = h
        .orchestrator
        .post_message(
            &session_id,
            &h.investor,
            "Sounds good, email me at deal.maker@example.com",
        )
        .await
        .unwrap();

    // Flagged for review, but delivery was not blocked
    assert!(outcome.message.flagged);
    assert!(outcome.reply.is_some());

    let transcript = h.orchestrator.transcript(&session_id).await;
    assert_eq!(transcript.len(), 2);
    assert!(transcript[0].flagged);
    assert_eq!(transcript[1].sender, SenderRole::Owner);
}

#[tokio::test]
async fn message_requires_active_session() {
    let h = harness().await;
    let session_id = h
        .orchestrator
        .open(&h.investor, &h.listing_id)
        .await
        .unwrap();

    // Still pending: deposit not confirmed
    let err = h
        .orchestrator
        .post_message(&session_id, &h.investor, "hello?")
        .await
        .unwrap_err();
    assert!(matches!(err, NegotiationError::InvalidTransition { .. }));
}

#[tokio::test]
async fn stranger_cannot_post() {
    let h = harness().await;
    let session_id = h
        .orchestrator
        .open(&h.investor, &h.listing_id)
        .await
        .unwrap();
    h.orchestrator
        .confirm_deposit(&session_id, &h.investor)
        .await
        .unwrap();

    let err = h
        .orchestrator
        .post_message(&session_id, &UserId::new(), "let me in")
        .await
        .unwrap_err();
    assert!(matches!(err, NegotiationError::Unauthorized { .. }));
}

// ============================================================================
// Policy clamp on agent output
// ============================================================================

#[tokio::test]
async fn out_of_bounds_terms_never_persist_agreement() {
    let h = harness().await;
    let session_id = h
        .orchestrator
        .open(&h.investor, &h.listing_id)
        .await
        .unwrap();
    h.orchestrator
        .confirm_deposit(&session_id, &h.investor)
        .await
        .unwrap();

    // 45% equity is far above the 30% bound; the agent still claims a deal
    h.agent
        .push_reply(
            AgentReply::text("Deal! 45% equity for 50000.")
                .with_terms(NegotiationTerms {
                    investment_amount: dec!(50_000),
                    equity_percent: dec!(45),
                    timeline_months: 24,
                })
                .agreeing(),
        )
        .await;

    let outcome = h
        .orchestrator
        .post_message(&session_id, &h.investor, "What about 45%?")
        .await
        .unwrap();

    // Reply delivered, agreement claim rejected
    assert!(outcome.reply.is_some());
    assert!(!outcome.agreement_reached);

    let session = h.orchestrator.session(&session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Active);
    assert!(!session.agreement_reached);
    assert!(session.agreed_terms.is_none());
}

#[tokio::test]
async fn agreement_claim_without_terms_is_ignored() {
    let h = harness().await;
    let session_id = h
        .orchestrator
        .open(&h.investor, &h.listing_id)
        .await
        .unwrap();
    h.orchestrator
        .confirm_deposit(&session_id, &h.investor)
        .await
        .unwrap();

    h.agent
        .push_reply(AgentReply::text("We have a deal!").agreeing())
        .await;

    let outcome = h
        .orchestrator
        .post_message(&session_id, &h.investor, "Deal?")
        .await
        .unwrap();
    assert!(!outcome.agreement_reached);

    let session = h.orchestrator.session(&session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Active);
}

#[tokio::test]
async fn in_bounds_proposal_without_agreement_is_recorded() {
    let h = harness().await;
    let session_id = h
        .orchestrator
        .open(&h.investor, &h.listing_id)
        .await
        .unwrap();
    h.orchestrator
        .confirm_deposit(&session_id, &h.investor)
        .await
        .unwrap();

    h.agent
        .push_reply(AgentReply::text("How about 60000 for 15%?").with_terms(NegotiationTerms {
            investment_amount: dec!(60_000),
            equity_percent: dec!(15),
            timeline_months: 24,
        }))
        .await;

    h.orchestrator
        .post_message(&session_id, &h.investor, "Open to counter-offers.")
        .await
        .unwrap();

    let session = h.orchestrator.session(&session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Active);
    assert!(session.proposed_terms.is_some());
    assert!(session.agreed_terms.is_none());
}

// ============================================================================
// Agent failure handling
// ============================================================================

#[tokio::test]
async fn agent_failure_returns_fallback_without_advancing_state() {
    let h = harness().await;
    let session_id = h
        .orchestrator
        .open(&h.investor, &h.listing_id)
        .await
        .unwrap();
    h.orchestrator
        .confirm_deposit(&session_id, &h.investor)
        .await
        .unwrap();

    h.agent.push_failure().await;

    let outcome = h
        .orchestrator
        .post_message(&session_id, &h.investor, "Anyone there?")
        .await
        .unwrap();

    assert!(outcome.reply.is_none());
    assert!(outcome.fallback_reply.is_some());
    assert!(!outcome.agreement_reached);

    // Investor message persisted, nothing else changed; retry works
    let transcript = h.orchestrator.transcript(&session_id).await;
    assert_eq!(transcript.len(), 1);
    let session = h.orchestrator.session(&session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Active);

    h.agent.push_reply(AgentReply::text("Back online.")).await;
    let retry = h
        .orchestrator
        .post_message(&session_id, &h.investor, "Retrying.")
        .await
        .unwrap();
    assert!(retry.reply.is_some());
}

// ============================================================================
// Expiry
// ============================================================================

#[tokio::test]
async fn message_after_window_expires_and_rejects() {
    let h = harness_with_config(instant_expiry_config()).await;
    let session_id = h
        .orchestrator
        .open(&h.investor, &h.listing_id)
        .await
        .unwrap();
    h.orchestrator
        .confirm_deposit(&session_id, &h.investor)
        .await
        .unwrap();
    assert_eq!(h.wallets.balance(&h.investor).await, dec!(9_400));

    // The zero-day window is already over; the next access expires the
    // session and rejects the request itself.
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let err = h
        .orchestrator
        .post_message(&session_id, &h.investor, "Too late?")
        .await
        .unwrap_err();
    assert!(matches!(err, NegotiationError::NegotiationExpired { .. }));

    let session = h.orchestrator.session(&session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Expired);
    assert_eq!(session.deposit_status, DepositStatus::Released);
    assert_eq!(h.wallets.balance(&h.investor).await, dec!(10_000));

    // No reply was ever generated
    assert!(h.orchestrator.transcript(&session_id).await.is_empty());
}

#[tokio::test]
async fn background_sweep_expires_due_sessions() {
    let h = harness_with_config(instant_expiry_config()).await;
    let session_id = h
        .orchestrator
        .open(&h.investor, &h.listing_id)
        .await
        .unwrap();
    h.orchestrator
        .confirm_deposit(&session_id, &h.investor)
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let expired = h.orchestrator.expire_due_sessions().await.unwrap();
    assert_eq!(expired, 1);

    let session = h.orchestrator.session(&session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Expired);
    assert_eq!(session.deposit_status, DepositStatus::Released);

    // A second sweep finds nothing to do
    assert_eq!(h.orchestrator.expire_due_sessions().await.unwrap(), 0);
}

#[tokio::test]
async fn concurrent_sweep_and_message_never_double_expire() {
    let h = harness_with_config(instant_expiry_config()).await;
    let session_id = h
        .orchestrator
        .open(&h.investor, &h.listing_id)
        .await
        .unwrap();
    h.orchestrator
        .confirm_deposit(&session_id, &h.investor)
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let sweep = {
        let orchestrator = h.orchestrator.clone();
        tokio::spawn(async move { orchestrator.expire_due_sessions().await })
    };
    let post = {
        let orchestrator = h.orchestrator.clone();
        let investor = h.investor.clone();
        let session_id = session_id.clone();
        tokio::spawn(async move {
            orchestrator
                .post_message(&session_id, &investor, "racing the sweep")
                .await
        })
    };

    sweep.await.unwrap().unwrap();
    let post_result = post.await.unwrap();

    // Whichever side won, the request was rejected and no reply exists
    assert!(matches!(
        post_result.unwrap_err(),
        NegotiationError::NegotiationExpired { .. }
    ));
    assert!(h.orchestrator.transcript(&session_id).await.is_empty());

    // Expiry fired exactly once
    let expiries = h
        .notifier
        .events()
        .await
        .into_iter()
        .filter(|e| matches!(e, NotificationEvent::SessionExpired { .. }))
        .count();
    assert_eq!(expiries, 1);

    // And the deposit came back exactly once
    assert_eq!(h.wallets.balance(&h.investor).await, dec!(10_000));
}

#[tokio::test]
async fn deposit_basis_settlement_when_terms_missing() {
    // Settlement falls back to the deposit amount if a session somehow
    // reaches agreement without structured terms; exercised directly through
    // the settlement engine since the orchestrator always records terms.
    let h = harness().await;

    let mut session = seedround_types::NegotiationSession::open(
        h.listing_id.clone(),
        h.investor.clone(),
        h.owner.clone(),
        dec!(600),
    );
    session
        .activate(chrono::Duration::days(3), chrono::Utc::now())
        .unwrap();
    session.record_agreement(in_bounds_terms()).unwrap();
    session.agreed_terms = None;

    let settlement = SettlementEngine::new(
        h.wallets.clone(),
        Arc::new(InMemoryReferrals::new()),
        h.treasury.clone(),
    );
    let records = settlement
        .settle(&session, &NegotiationConfig::default())
        .await
        .unwrap();

    // 7% of the 600 deposit basis
    assert_eq!(records[0].base_amount, dec!(600));
    assert_eq!(records[0].amount, Decimal::from(42));
}
