//! Seedround Demo - One-command negotiation walkthrough
//!
//! Runs a complete negotiation against in-memory collaborators: an investor
//! opens a deposit-backed session on a listing, exchanges messages with the
//! counterparty agent, reaches terms, and the engine settles commission and
//! referral rewards.
//!
//! # Quick Start
//!
//! ```bash
//! # Scripted agent (fully offline, deterministic)
//! seedround-demo
//!
//! # Against a live LLM backend
//! seedround-demo --live-agent
//! SEEDROUND_LLM_PROVIDER=ollama seedround-demo --live-agent
//! ```

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seedround_agent::{
    AgentReply, CounterpartyAgent, LlmCounterpartyAgent, ScriptedCounterpartyAgent,
};
use seedround_deposit::DepositLedger;
use seedround_engine::{
    InMemoryAccessDirectory, InMemoryListings, InMemoryMessages, InMemorySessions,
    NegotiationOrchestrator, TracingNotifier,
};
use seedround_ledger::{InMemoryWallets, WalletLedger};
use seedround_settlement::{InMemoryReferrals, SettlementEngine};
use seedround_types::{
    AccessRecord, AccessScope, ListingCategory, ListingId, ListingSummary, NegotiationConfig,
    NegotiationTerms, ReferralProfile, ReferralTier, UserId,
};

/// Seedround negotiation engine demo
#[derive(Parser, Debug)]
#[command(
    name = "seedround-demo",
    about = "Run a scripted Seedround negotiation end to end",
    version
)]
struct Args {
    /// Use the LLM-backed counterparty agent instead of the scripted one
    /// (configure via SEEDROUND_LLM_PROVIDER)
    #[arg(long, default_value = "false")]
    live_agent: bool,

    /// Investor wallet starting balance
    #[arg(long, default_value = "10000")]
    balance: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    print_banner();

    // Actors
    let investor = UserId::new();
    let owner = UserId::new();
    let treasury = UserId::new();
    let referrer = UserId::new();

    // Listing under negotiation
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
    listings
        .insert(listing, NegotiationConfig::default())
        .await;

    // Investor signed a platform-wide access agreement
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
    wallets
        .set_balance(investor.clone(), Decimal::from(args.balance))
        .await;

    let referrals = Arc::new(InMemoryReferrals::new());
    referrals.set_referrer(
        investor.clone(),
        ReferralProfile {
            referrer: referrer.clone(),
            tier: ReferralTier::Partner,
        },
    );

    let deposits = Arc::new(DepositLedger::new(wallets.clone(), treasury.clone()));
    let settlement = Arc::new(SettlementEngine::new(
        wallets.clone(),
        referrals,
        treasury.clone(),
    ));

    let agent: Arc<dyn CounterpartyAgent> = if args.live_agent {
        tracing::info!("Using LLM counterparty agent (SEEDROUND_LLM_PROVIDER)");
        Arc::new(LlmCounterpartyAgent::from_env())
    } else {
        let scripted = ScriptedCounterpartyAgent::new();
        scripted
            .push_reply(AgentReply::text(
                "Thanks for your interest. We are raising 500k for 18 months of \
                 runway; what size of investment do you have in mind?",
            ))
            .await;
        scripted
            .push_reply(
                AgentReply::text(
                    "We can work with that. 50000 for a 12% stake over 24 months, \
                     agreed.",
                )
                .with_terms(NegotiationTerms {
                    investment_amount: dec!(50_000),
                    equity_percent: dec!(12),
                    timeline_months: 24,
                })
                .agreeing(),
            )
            .await;
        Arc::new(scripted)
    };

    let orchestrator = NegotiationOrchestrator::new(
        Arc::new(InMemorySessions::new()),
        Arc::new(InMemoryMessages::new()),
        listings,
        access,
        deposits,
        settlement,
        agent,
        Arc::new(TracingNotifier),
    );

    // 1. Open
    let session_id = orchestrator.open(&investor, &listing_id).await?;
    let session = orchestrator.session(&session_id).await?;
    println!("Opened negotiation {session_id}");
    println!("  required deposit: {}", session.deposit_amount);

    // 2. Confirm the deposit
    orchestrator.confirm_deposit(&session_id, &investor).await?;
    println!("Deposit held; window ends {:?}", orchestrator.session(&session_id).await?.window_end);

    // 3. Exchange messages
    for text in [
        "Hi! I reviewed the listing and I'm interested in backing the project.",
        "I can commit 50000 for a 12% stake over 24 months.",
    ] {
        let outcome = orchestrator.post_message(&session_id, &investor, text).await?;
        println!("investor: {text}");
        if let Some(reply) = outcome.reply_text() {
            println!("owner:    {reply}");
        }
        if outcome.agreement_reached {
            println!("-- agreement reached --");
            break;
        }
    }

    // 4. Finalize and settle
    let session = orchestrator.session(&session_id).await?;
    if session.agreement_reached {
        let records = orchestrator.finalize(&session_id).await?;
        println!("Settlement:");
        for record in &records {
            println!(
                "  {}: {} ({} x {}) -> {}",
                record.kind, record.amount, record.base_amount, record.rate, record.beneficiary
            );
        }
    } else {
        println!("No agreement reached; session left {}", session.status);
    }

    println!("Final balances:");
    println!("  investor: {}", wallets.balance(&investor).await);
    println!("  treasury: {}", wallets.balance(&treasury).await);
    println!("  referrer: {}", wallets.balance(&referrer).await);

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  ____                _                           _
 / ___|  ___  ___  __| |_ __ ___  _   _ _ __   __| |
 \___ \ / _ \/ _ \/ _` | '__/ _ \| | | | '_ \ / _` |
  ___) |  __/  __/ (_| | | | (_) | |_| | | | | (_| |
 |____/ \___|\___|\__,_|_|  \___/ \__,_|_| |_|\__,_|

 Negotiation engine demo
"#
    );
}
