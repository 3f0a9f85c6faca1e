//! Notification events emitted on state transitions
//!
//! Delivery is fire-and-forget: the orchestrator logs a failed delivery and
//! moves on. A notification failure must never roll back session, deposit,
//! or settlement state.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use seedround_types::{NegotiationTerms, Result, SessionId, UserId};

/// State transitions surfaced to the notification collaborator
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    DepositHeld {
        session_id: SessionId,
        amount: rust_decimal::Decimal,
    },
    AgreementReached {
        session_id: SessionId,
        terms: NegotiationTerms,
    },
    SessionExpired {
        session_id: SessionId,
    },
    SessionCancelled {
        session_id: SessionId,
        by: UserId,
    },
    SessionCompleted {
        session_id: SessionId,
    },
}

/// External notification collaborator
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: NotificationEvent) -> Result<()>;
}

/// Notifier that logs every event through tracing
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, event: NotificationEvent) -> Result<()> {
        info!("Notification: {:?}", event);
        Ok(())
    }
}

/// Notifier that records events for test assertions
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().await.clone()
    }
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: NotificationEvent) -> Result<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}
