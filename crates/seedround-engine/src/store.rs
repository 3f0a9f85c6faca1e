//! Session and message persistence
//!
//! The store layer is the second line of defense for the engine's
//! invariants: the in-memory implementations enforce the one-live-session
//! rule inside a single write-lock critical section, the way a SQL deployment
//! would use a partial unique index on (listing_id, initiator_id) over live
//! statuses.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use seedround_types::{
    AccessDeniedReason, ListingId, MessageRecord, NegotiationError, NegotiationSession, Result,
    SessionId, SessionStatus, UserId,
};

/// Persistence boundary for negotiation sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new session
    ///
    /// The "no existing pending/active session for this (listing, initiator)
    /// pair" check and the insert are one atomic step; a losing concurrent
    /// open observes `AccessDenied(AlreadyActive)`.
    async fn create(&self, session: NegotiationSession) -> Result<()>;

    async fn get(&self, session_id: &SessionId) -> Result<NegotiationSession>;

    /// Persist a mutated session aggregate
    async fn update(&self, session: NegotiationSession) -> Result<()>;

    /// IDs of sessions currently in `active`, for the expiry sweep
    async fn active_session_ids(&self) -> Vec<SessionId>;
}

/// Append-only message persistence
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(&self, message: MessageRecord) -> Result<()>;

    /// Full transcript of a session in insertion order
    async fn transcript(&self, session_id: &SessionId) -> Vec<MessageRecord>;
}

#[derive(Default)]
struct SessionStoreInner {
    sessions: HashMap<SessionId, NegotiationSession>,
    /// Pairs with a session in `pending` or `active`
    live_pairs: HashSet<(ListingId, UserId)>,
}

/// In-memory session store
pub struct InMemorySessions {
    inner: Arc<RwLock<SessionStoreInner>>,
}

impl InMemorySessions {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionStoreInner::default())),
        }
    }
}

impl Default for InMemorySessions {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessions {
    async fn create(&self, session: NegotiationSession) -> Result<()> {
        let mut inner = self.inner.write().await;

        let pair = (session.listing_id.clone(), session.initiator.clone());
        if inner.live_pairs.contains(&pair) {
            return Err(NegotiationError::denied(AccessDeniedReason::AlreadyActive));
        }

        if session.status.is_live() {
            inner.live_pairs.insert(pair);
        }
        inner.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, session_id: &SessionId) -> Result<NegotiationSession> {
        self.inner
            .read()
            .await
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| NegotiationError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    async fn update(&self, session: NegotiationSession) -> Result<()> {
        let mut inner = self.inner.write().await;

        if !inner.sessions.contains_key(&session.id) {
            return Err(NegotiationError::SessionNotFound {
                session_id: session.id.to_string(),
            });
        }

        if !session.status.is_live() {
            inner
                .live_pairs
                .remove(&(session.listing_id.clone(), session.initiator.clone()));
        }
        inner.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn active_session_ids(&self) -> Vec<SessionId> {
        self.inner
            .read()
            .await
            .sessions
            .values()
            .filter(|s| s.status == SessionStatus::Active)
            .map(|s| s.id.clone())
            .collect()
    }
}

/// In-memory message store
pub struct InMemoryMessages {
    messages: Arc<RwLock<Vec<MessageRecord>>>,
}

impl InMemoryMessages {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryMessages {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessages {
    async fn append(&self, message: MessageRecord) -> Result<()> {
        self.messages.write().await.push(message);
        Ok(())
    }

    async fn transcript(&self, session_id: &SessionId) -> Vec<MessageRecord> {
        self.messages
            .read()
            .await
            .iter()
            .filter(|m| &m.session_id == session_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_session(listing: ListingId, initiator: UserId) -> NegotiationSession {
        NegotiationSession::open(listing, initiator, UserId::new(), dec!(600))
    }

    #[tokio::test]
    async fn test_second_live_session_for_pair_rejected() {
        let store = InMemorySessions::new();
        let listing = ListingId::new();
        let investor = UserId::new();

        store
            .create(test_session(listing.clone(), investor.clone()))
            .await
            .unwrap();
        let err = store
            .create(test_session(listing, investor))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NegotiationError::AccessDenied {
                reason: AccessDeniedReason::AlreadyActive
            }
        ));
    }

    #[tokio::test]
    async fn test_terminal_session_frees_the_pair() {
        let store = InMemorySessions::new();
        let listing = ListingId::new();
        let investor = UserId::new();

        let mut session = test_session(listing.clone(), investor.clone());
        store.create(session.clone()).await.unwrap();

        session.cancel().unwrap();
        store.update(session).await.unwrap();

        // Pair is free again
        store
            .create(test_session(listing, investor))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_same_investor_different_listing_is_fine() {
        let store = InMemorySessions::new();
        let investor = UserId::new();

        store
            .create(test_session(ListingId::new(), investor.clone()))
            .await
            .unwrap();
        store
            .create(test_session(ListingId::new(), investor))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_transcript_keeps_order_per_session() {
        let store = InMemoryMessages::new();
        let session_a = SessionId::new();
        let session_b = SessionId::new();

        store
            .append(MessageRecord::investor(session_a.clone(), "one", false))
            .await
            .unwrap();
        store
            .append(MessageRecord::investor(session_b.clone(), "other", false))
            .await
            .unwrap();
        store
            .append(MessageRecord::owner(session_a.clone(), "two"))
            .await
            .unwrap();

        let transcript = store.transcript(&session_a).await;
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].content, "one");
        assert_eq!(transcript[1].content, "two");
    }
}
