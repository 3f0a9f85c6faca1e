//! Seedround Settlement - Financial consequences of a completed negotiation
//!
//! When a session finalizes, the settlement engine computes the platform
//! commission (rate from the listing's commission tier) and, when a referrer
//! is on record for the investor or the listing owner, a referral reward
//! (rate from the referrer's tier). Both are based on the agreed investment
//! amount, falling back to the deposit amount when structured terms are
//! absent.
//!
//! Settlement is idempotent: records are keyed by (session, kind), an
//! existence check guards every write, and re-invocation for an
//! already-settled session returns the existing records without moving money
//! again.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock as SyncRwLock;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::info;

use seedround_ledger::WalletLedger;
use seedround_types::{
    NegotiationConfig, NegotiationError, NegotiationSession, ReferralProfile, Result, SessionId,
    SessionStatus, SettlementKind, SettlementRecord, SettlementStatus, UserId,
};

/// Read-only referral relationships, owned by an external collaborator
#[async_trait]
pub trait ReferralDirectory: Send + Sync {
    async fn referrer_of(&self, user_id: &UserId) -> Option<ReferralProfile>;
}

/// In-memory referral directory for tests and the demo
pub struct InMemoryReferrals {
    referrers: SyncRwLock<HashMap<UserId, ReferralProfile>>,
}

impl InMemoryReferrals {
    pub fn new() -> Self {
        Self {
            referrers: SyncRwLock::new(HashMap::new()),
        }
    }

    pub fn set_referrer(&self, referred: UserId, profile: ReferralProfile) {
        self.referrers.write().insert(referred, profile);
    }
}

impl Default for InMemoryReferrals {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReferralDirectory for InMemoryReferrals {
    async fn referrer_of(&self, user_id: &UserId) -> Option<ReferralProfile> {
        self.referrers.read().get(user_id).cloned()
    }
}

/// Computes and issues settlement records for terminal sessions
pub struct SettlementEngine {
    records: Arc<RwLock<HashMap<(SessionId, SettlementKind), SettlementRecord>>>,
    wallets: Arc<dyn WalletLedger>,
    referrals: Arc<dyn ReferralDirectory>,
    /// Platform account that collects commissions
    treasury: UserId,
}

impl SettlementEngine {
    pub fn new(
        wallets: Arc<dyn WalletLedger>,
        referrals: Arc<dyn ReferralDirectory>,
        treasury: UserId,
    ) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            wallets,
            referrals,
            treasury,
        }
    }

    /// Settle a session that reached agreement
    ///
    /// Returns every settlement record for the session, newly created or
    /// pre-existing. Wallet credits happen only for records created by this
    /// call.
    pub async fn settle(
        &self,
        session: &NegotiationSession,
        config: &NegotiationConfig,
    ) -> Result<Vec<SettlementRecord>> {
        if !session.agreement_reached
            || !matches!(
                session.status,
                SessionStatus::AgreementReached | SessionStatus::Completed
            )
        {
            return Err(NegotiationError::InvalidState {
                entity: format!("session {}", session.id),
                expected: SessionStatus::AgreementReached.to_string(),
                actual: session.status.to_string(),
            });
        }

        let base_amount = session
            .agreed_terms
            .as_ref()
            .map(|t| t.investment_amount)
            .unwrap_or(session.deposit_amount);

        let mut results = Vec::new();

        let commission = self
            .issue(
                session,
                SettlementKind::PlatformCommission,
                self.treasury.clone(),
                config.commission_tier.rate(),
                base_amount,
            )
            .await?;
        results.push(commission);

        // Investor referral takes precedence; owner referral is the fallback.
        let referral = match self.referrals.referrer_of(&session.initiator).await {
            Some(profile) => Some(profile),
            None => self.referrals.referrer_of(&session.owner).await,
        };
        if let Some(profile) = referral {
            let reward = self
                .issue(
                    session,
                    SettlementKind::Referral,
                    profile.referrer,
                    profile.tier.reward_rate(),
                    base_amount,
                )
                .await?;
            results.push(reward);
        }

        Ok(results)
    }

    /// All settlement records for a session
    pub async fn records_for(&self, session_id: &SessionId) -> Vec<SettlementRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|((sid, _), _)| sid == session_id)
            .map(|(_, record)| record.clone())
            .collect()
    }

    async fn issue(
        &self,
        session: &NegotiationSession,
        kind: SettlementKind,
        beneficiary: UserId,
        rate: Decimal,
        base_amount: Decimal,
    ) -> Result<SettlementRecord> {
        let key = (session.id.clone(), kind);

        let mut records = self.records.write().await;
        if let Some(existing) = records.get(&key) {
            return Ok(existing.clone());
        }

        let mut record =
            SettlementRecord::new(session.id.clone(), beneficiary.clone(), kind, rate, base_amount);

        // Credit before the record exists: a wallet failure leaves no record,
        // so a retry recomputes and credits cleanly.
        self.wallets.credit(&beneficiary, record.amount).await?;
        record.status = SettlementStatus::Paid;

        info!(
            "Settled {} of {} ({} x {}) to {} for session {}",
            kind, record.amount, base_amount, rate, beneficiary, session.id
        );
        records.insert(key, record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use seedround_ledger::InMemoryWallets;
    use seedround_types::{CommissionTier, ListingId, NegotiationTerms, ReferralTier};

    fn agreed_session(investment: Decimal) -> NegotiationSession {
        let mut session = NegotiationSession::open(
            ListingId::new(),
            UserId::new(),
            UserId::new(),
            dec!(600),
        );
        session.activate(Duration::days(3), Utc::now()).unwrap();
        session
            .record_agreement(NegotiationTerms {
                investment_amount: investment,
                equity_percent: dec!(12),
                timeline_months: 24,
            })
            .unwrap();
        session
    }

    fn engine_with(
        referrals: Arc<InMemoryReferrals>,
    ) -> (SettlementEngine, Arc<InMemoryWallets>, UserId) {
        let wallets = Arc::new(InMemoryWallets::new());
        let treasury = UserId::new();
        let engine = SettlementEngine::new(wallets.clone(), referrals, treasury.clone());
        (engine, wallets, treasury)
    }

    #[tokio::test]
    async fn test_commission_is_rate_times_investment() {
        let (engine, wallets, treasury) = engine_with(Arc::new(InMemoryReferrals::new()));
        let session = agreed_session(dec!(50_000));
        let config = NegotiationConfig::default(); // Standard tier, 7%

        let records = engine.settle(&session, &config).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, SettlementKind::PlatformCommission);
        assert_eq!(records[0].amount, dec!(3_500.00));
        assert_eq!(records[0].status, SettlementStatus::Paid);
        assert_eq!(wallets.balance(&treasury).await, dec!(3_500.00));
    }

    #[tokio::test]
    async fn test_referral_reward_for_referred_investor() {
        let referrals = Arc::new(InMemoryReferrals::new());
        let referrer = UserId::new();
        let session = agreed_session(dec!(100_000));
        referrals.set_referrer(
            session.initiator.clone(),
            ReferralProfile {
                referrer: referrer.clone(),
                tier: ReferralTier::Partner,
            },
        );

        let (engine, wallets, _) = engine_with(referrals);
        let config = NegotiationConfig::default();

        let records = engine.settle(&session, &config).await.unwrap();

        assert_eq!(records.len(), 2);
        let reward = records
            .iter()
            .find(|r| r.kind == SettlementKind::Referral)
            .unwrap();
        assert_eq!(reward.amount, dec!(1_000.00)); // 1% of 100_000
        assert_eq!(wallets.balance(&referrer).await, dec!(1_000.00));
    }

    #[tokio::test]
    async fn test_settle_is_idempotent() {
        let (engine, wallets, treasury) = engine_with(Arc::new(InMemoryReferrals::new()));
        let session = agreed_session(dec!(50_000));
        let config = NegotiationConfig::default();

        engine.settle(&session, &config).await.unwrap();
        let second = engine.settle(&session, &config).await.unwrap();

        // Still exactly one commission record, no double credit
        assert_eq!(second.len(), 1);
        assert_eq!(engine.records_for(&session.id).await.len(), 1);
        assert_eq!(wallets.balance(&treasury).await, dec!(3_500.00));
    }

    #[tokio::test]
    async fn test_settle_requires_agreement() {
        let (engine, _wallets, _) = engine_with(Arc::new(InMemoryReferrals::new()));
        let session = NegotiationSession::open(
            ListingId::new(),
            UserId::new(),
            UserId::new(),
            dec!(600),
        );

        let err = engine
            .settle(&session, &NegotiationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, NegotiationError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_commission_tier_drives_rate() {
        let (engine, _wallets, _) = engine_with(Arc::new(InMemoryReferrals::new()));
        let session = agreed_session(dec!(50_000));
        let config = NegotiationConfig {
            commission_tier: CommissionTier::Premium,
            ..NegotiationConfig::default()
        };

        let records = engine.settle(&session, &config).await.unwrap();
        assert_eq!(records[0].amount, dec!(2_000.00)); // 4% of 50_000
    }
}
