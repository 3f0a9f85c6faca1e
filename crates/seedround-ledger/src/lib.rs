//! Seedround Ledger - Wallet collaborator boundary
//!
//! The wallet balance store and generic transaction ledger live outside the
//! negotiation engine. This crate defines the `WalletLedger` trait the engine
//! calls through, plus an in-memory reference implementation used by tests
//! and the demo.
//!
//! Failures from this collaborator propagate: a debit/credit error aborts the
//! surrounding session transition, so the deposit never shows `held` while
//! the wallet was never charged.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::info;

use seedround_types::{NegotiationError, Result, UserId};

/// External wallet/ledger collaborator
#[async_trait]
pub trait WalletLedger: Send + Sync {
    /// Withdraw funds from a user wallet; fails on insufficient balance
    async fn debit(&self, user_id: &UserId, amount: Decimal) -> Result<()>;

    /// Deposit funds into a user wallet
    async fn credit(&self, user_id: &UserId, amount: Decimal) -> Result<()>;

    /// Current balance, for assertions and display
    async fn balance(&self, user_id: &UserId) -> Decimal;
}

/// In-memory wallet ledger
///
/// Balances live behind one RwLock so a debit observes and updates the
/// balance in a single critical section.
pub struct InMemoryWallets {
    balances: Arc<RwLock<HashMap<UserId, Decimal>>>,
}

impl InMemoryWallets {
    pub fn new() -> Self {
        Self {
            balances: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Seed a balance (test/demo setup)
    pub async fn set_balance(&self, user_id: UserId, balance: Decimal) {
        self.balances.write().await.insert(user_id, balance);
    }
}

impl Default for InMemoryWallets {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletLedger for InMemoryWallets {
    async fn debit(&self, user_id: &UserId, amount: Decimal) -> Result<()> {
        let mut balances = self.balances.write().await;
        let balance = balances.entry(user_id.clone()).or_insert(Decimal::ZERO);

        if *balance < amount {
            return Err(NegotiationError::InsufficientFunds {
                user_id: user_id.to_string(),
                requested: amount.to_string(),
                available: balance.to_string(),
            });
        }

        *balance -= amount;
        info!("Debited {} from {}", amount, user_id);
        Ok(())
    }

    async fn credit(&self, user_id: &UserId, amount: Decimal) -> Result<()> {
        let mut balances = self.balances.write().await;
        *balances.entry(user_id.clone()).or_insert(Decimal::ZERO) += amount;
        info!("Credited {} to {}", amount, user_id);
        Ok(())
    }

    async fn balance(&self, user_id: &UserId) -> Decimal {
        self.balances
            .read()
            .await
            .get(user_id)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}
