//! Read-only collaborator directories
//!
//! Access agreements and listing data are owned by other parts of the
//! platform; the engine consumes them through these traits. The in-memory
//! implementations back tests and the demo.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use seedround_types::{
    AccessRecord, ListingId, ListingSummary, NegotiationConfig, NegotiationError, Result, UserId,
};

/// Lookup of signed access agreements
#[async_trait]
pub trait AccessDirectory: Send + Sync {
    /// All access records on file for a user
    async fn records_for(&self, user_id: &UserId) -> Vec<AccessRecord>;
}

/// Lookup of listing summaries and their negotiation configuration
#[async_trait]
pub trait ListingDirectory: Send + Sync {
    async fn summary(&self, listing_id: &ListingId) -> Result<ListingSummary>;
    async fn negotiation_config(&self, listing_id: &ListingId) -> Result<NegotiationConfig>;
}

/// In-memory access directory
pub struct InMemoryAccessDirectory {
    records: Arc<RwLock<Vec<AccessRecord>>>,
}

impl InMemoryAccessDirectory {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn grant(&self, record: AccessRecord) {
        self.records.write().await.push(record);
    }
}

impl Default for InMemoryAccessDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccessDirectory for InMemoryAccessDirectory {
    async fn records_for(&self, user_id: &UserId) -> Vec<AccessRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect()
    }
}

/// In-memory listing directory
pub struct InMemoryListings {
    listings: Arc<RwLock<HashMap<ListingId, (ListingSummary, NegotiationConfig)>>>,
}

impl InMemoryListings {
    pub fn new() -> Self {
        Self {
            listings: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn insert(&self, summary: ListingSummary, config: NegotiationConfig) {
        self.listings
            .write()
            .await
            .insert(summary.id.clone(), (summary, config));
    }
}

impl Default for InMemoryListings {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ListingDirectory for InMemoryListings {
    async fn summary(&self, listing_id: &ListingId) -> Result<ListingSummary> {
        self.listings
            .read()
            .await
            .get(listing_id)
            .map(|(summary, _)| summary.clone())
            .ok_or_else(|| NegotiationError::ListingNotFound {
                listing_id: listing_id.to_string(),
            })
    }

    async fn negotiation_config(&self, listing_id: &ListingId) -> Result<NegotiationConfig> {
        self.listings
            .read()
            .await
            .get(listing_id)
            .map(|(_, config)| config.clone())
            .ok_or_else(|| NegotiationError::ListingNotFound {
                listing_id: listing_id.to_string(),
            })
    }
}
