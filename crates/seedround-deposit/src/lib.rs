//! Seedround Deposit - Escrowed deposit lifecycle
//!
//! Every negotiation session is backed by a refundable deposit that gates
//! frivolous requests. The ledger tracks one deposit per session through the
//! monotonic lifecycle pending → held → {released | forfeited} and moves the
//! actual funds through the external wallet collaborator.
//!
//! Wallet movement and state change are ordered so a failure cannot leave
//! them disagreeing: the wallet is charged (or refunded) first, and the state
//! flips only after the wallet call succeeded. Settle operations are
//! idempotent: the second call returns the already-settled record without
//! repeating the wallet movement.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::info;

use seedround_ledger::WalletLedger;
use seedround_types::{
    DepositRecord, DepositStatus, ListingSummary, NegotiationConfig, NegotiationError, Result,
    SessionId, UserId,
};

/// Compute the deposit required to open a negotiation on a listing
///
/// Pure function of listing data: `clamp(flat_fee + rate * funding_goal,
/// min, max)`. Deterministic and replayable for audit: recomputing with the
/// same configuration always yields the recorded amount.
pub fn required_deposit(config: &NegotiationConfig, listing: &ListingSummary) -> Decimal {
    config.deposit.amount_for(listing.funding_goal)
}

/// Tracks the escrow deposit tied to each negotiation session
pub struct DepositLedger {
    records: Arc<RwLock<HashMap<SessionId, DepositRecord>>>,
    wallets: Arc<dyn WalletLedger>,
    /// Platform account credited by forfeitures
    treasury: UserId,
}

impl DepositLedger {
    pub fn new(wallets: Arc<dyn WalletLedger>, treasury: UserId) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            wallets,
            treasury,
        }
    }

    /// Create the pending deposit for a freshly opened session
    ///
    /// No funds move yet; the investor confirms payment separately.
    pub async fn request_deposit(
        &self,
        session_id: SessionId,
        investor: UserId,
        amount: Decimal,
    ) -> Result<DepositRecord> {
        let mut records = self.records.write().await;
        if records.contains_key(&session_id) {
            return Err(NegotiationError::InvalidState {
                entity: format!("deposit for session {session_id}"),
                expected: "absent".to_string(),
                actual: "already requested".to_string(),
            });
        }

        let record = DepositRecord::new(session_id.clone(), investor, amount);
        records.insert(session_id, record.clone());
        Ok(record)
    }

    /// pending → held: debit the investor and lock the funds
    pub async fn confirm_hold(&self, session_id: &SessionId) -> Result<DepositRecord> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(session_id)
            .ok_or_else(|| NegotiationError::DepositNotFound {
                session_id: session_id.to_string(),
            })?;

        if record.status != DepositStatus::Pending {
            return Err(NegotiationError::InvalidState {
                entity: format!("deposit for session {session_id}"),
                expected: DepositStatus::Pending.to_string(),
                actual: record.status.to_string(),
            });
        }

        // Wallet first: if the debit fails the deposit stays pending.
        self.wallets.debit(&record.investor, record.amount).await?;

        record.status = DepositStatus::Held;
        info!("Deposit of {} held for session {}", record.amount, session_id);
        Ok(record.clone())
    }

    /// held → released: return the funds to the investor
    ///
    /// Idempotent: releasing an already-released deposit returns the record
    /// without a second credit.
    pub async fn release(&self, session_id: &SessionId) -> Result<DepositRecord> {
        self.settle(session_id, DepositStatus::Released).await
    }

    /// held → forfeited: capture the funds for the platform treasury
    ///
    /// Reserved for the dispute/abuse path; nothing in the ordinary
    /// negotiation flow forfeits. Idempotent like [`Self::release`].
    pub async fn forfeit(&self, session_id: &SessionId) -> Result<DepositRecord> {
        self.settle(session_id, DepositStatus::Forfeited).await
    }

    /// Get the deposit record for a session
    pub async fn get(&self, session_id: &SessionId) -> Option<DepositRecord> {
        self.records.read().await.get(session_id).cloned()
    }

    async fn settle(&self, session_id: &SessionId, target: DepositStatus) -> Result<DepositRecord> {
        debug_assert!(target.is_settled());

        let mut records = self.records.write().await;
        let record = records
            .get_mut(session_id)
            .ok_or_else(|| NegotiationError::DepositNotFound {
                session_id: session_id.to_string(),
            })?;

        // Idempotent re-settle to the same target; conflicting settle is an error.
        if record.status == target {
            return Ok(record.clone());
        }
        if record.status != DepositStatus::Held {
            return Err(NegotiationError::InvalidState {
                entity: format!("deposit for session {session_id}"),
                expected: DepositStatus::Held.to_string(),
                actual: record.status.to_string(),
            });
        }

        let beneficiary = match target {
            DepositStatus::Released => record.investor.clone(),
            DepositStatus::Forfeited => self.treasury.clone(),
            _ => unreachable!("settle targets are released or forfeited"),
        };
        self.wallets.credit(&beneficiary, record.amount).await?;

        record.status = target;
        record.settled_at = Some(Utc::now());
        info!(
            "Deposit for session {} settled as {} to {}",
            session_id, target, beneficiary
        );
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use seedround_ledger::InMemoryWallets;
    use seedround_types::{ListingCategory, ListingId};

    fn test_listing(goal: Decimal) -> ListingSummary {
        ListingSummary {
            id: ListingId::new(),
            title: "Solar micro-grids".to_string(),
            description: "Community-owned solar".to_string(),
            category: ListingCategory::CleanEnergy,
            funding_goal: goal,
            current_funding: Decimal::ZERO,
            owner_id: UserId::new(),
            timeline_months: 18,
            team_size: 6,
            traction: "Two pilot sites".to_string(),
        }
    }

    async fn funded_ledger(balance: Decimal) -> (DepositLedger, Arc<InMemoryWallets>, UserId) {
        let wallets = Arc::new(InMemoryWallets::new());
        let investor = UserId::new();
        wallets.set_balance(investor.clone(), balance).await;
        let ledger = DepositLedger::new(wallets.clone(), UserId::new());
        (ledger, wallets, investor)
    }

    #[test]
    fn test_required_deposit_uses_listing_config() {
        let config = NegotiationConfig::default();
        let listing = test_listing(dec!(500_000));
        // 100 flat + 0.1% of 500_000 = 600
        assert_eq!(required_deposit(&config, &listing), dec!(600));
    }

    #[tokio::test]
    async fn test_hold_debits_investor() {
        let (ledger, wallets, investor) = funded_ledger(dec!(1_000)).await;
        let session = SessionId::new();

        ledger
            .request_deposit(session.clone(), investor.clone(), dec!(600))
            .await
            .unwrap();
        let record = ledger.confirm_hold(&session).await.unwrap();

        assert_eq!(record.status, DepositStatus::Held);
        assert_eq!(wallets.balance(&investor).await, dec!(400));
    }

    #[tokio::test]
    async fn test_hold_fails_without_funds_and_stays_pending() {
        let (ledger, _wallets, investor) = funded_ledger(dec!(100)).await;
        let session = SessionId::new();

        ledger
            .request_deposit(session.clone(), investor, dec!(600))
            .await
            .unwrap();
        let err = ledger.confirm_hold(&session).await.unwrap_err();
        assert!(matches!(err, NegotiationError::InsufficientFunds { .. }));

        let record = ledger.get(&session).await.unwrap();
        assert_eq!(record.status, DepositStatus::Pending);
    }

    #[tokio::test]
    async fn test_release_refunds_investor_once() {
        let (ledger, wallets, investor) = funded_ledger(dec!(1_000)).await;
        let session = SessionId::new();

        ledger
            .request_deposit(session.clone(), investor.clone(), dec!(600))
            .await
            .unwrap();
        ledger.confirm_hold(&session).await.unwrap();
        ledger.release(&session).await.unwrap();
        assert_eq!(wallets.balance(&investor).await, dec!(1_000));

        // Second release is a no-op returning the settled record
        let again = ledger.release(&session).await.unwrap();
        assert_eq!(again.status, DepositStatus::Released);
        assert_eq!(wallets.balance(&investor).await, dec!(1_000));
    }

    #[tokio::test]
    async fn test_forfeit_credits_treasury() {
        let wallets = Arc::new(InMemoryWallets::new());
        let investor = UserId::new();
        let treasury = UserId::new();
        wallets.set_balance(investor.clone(), dec!(1_000)).await;
        let ledger = DepositLedger::new(wallets.clone(), treasury.clone());

        let session = SessionId::new();
        ledger
            .request_deposit(session.clone(), investor, dec!(600))
            .await
            .unwrap();
        ledger.confirm_hold(&session).await.unwrap();
        ledger.forfeit(&session).await.unwrap();

        assert_eq!(wallets.balance(&treasury).await, dec!(600));
    }

    #[tokio::test]
    async fn test_release_after_forfeit_is_conflict() {
        let (ledger, _wallets, investor) = funded_ledger(dec!(1_000)).await;
        let session = SessionId::new();

        ledger
            .request_deposit(session.clone(), investor, dec!(600))
            .await
            .unwrap();
        ledger.confirm_hold(&session).await.unwrap();
        ledger.forfeit(&session).await.unwrap();

        let err = ledger.release(&session).await.unwrap_err();
        assert!(matches!(err, NegotiationError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_release_requires_held() {
        let (ledger, _wallets, investor) = funded_ledger(dec!(1_000)).await;
        let session = SessionId::new();

        ledger
            .request_deposit(session.clone(), investor, dec!(600))
            .await
            .unwrap();

        // Still pending: nothing to release
        let err = ledger.release(&session).await.unwrap_err();
        assert!(matches!(err, NegotiationError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_request_rejected() {
        let (ledger, _wallets, investor) = funded_ledger(dec!(1_000)).await;
        let session = SessionId::new();

        ledger
            .request_deposit(session.clone(), investor.clone(), dec!(600))
            .await
            .unwrap();
        let err = ledger
            .request_deposit(session, investor, dec!(600))
            .await
            .unwrap_err();
        assert!(matches!(err, NegotiationError::InvalidState { .. }));
    }
}
