//! Entity store adapter.
//!
//! All state lives in a durable document store with single-document atomic
//! put/get/delete; these traits are the filtered-query contract the lifecycle
//! managers and the reward engine consume. `PgStore` is the production
//! implementation, `MemoryStore` backs tests and embedded use.

pub mod memory;
pub mod postgres;

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{HubReport, Lease, Offer, TransactionStatus, UemReward};

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub trait OfferStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<Offer>, StoreError>;
    fn save(&self, offer: &Offer) -> Result<(), StoreError>;
    fn delete(&self, id: &str) -> Result<(), StoreError>;
    /// Rows in the given transaction status, canonical and change-log alike,
    /// oldest first.
    fn find_by_status(&self, status: TransactionStatus) -> Result<Vec<Offer>, StoreError>;
    fn find_by_nft_id(&self, nft_id: i64) -> Result<Vec<Offer>, StoreError>;
    fn find_by_owner(&self, owner: &str) -> Result<Vec<Offer>, StoreError>;
    fn find_by_transaction_hash(&self, transaction_hash: &str)
        -> Result<Option<Offer>, StoreError>;
    fn find_canonical_by_offer_id(&self, offer_id: i64) -> Result<Option<Offer>, StoreError>;
    fn delete_by_parent_id(&self, parent_id: &str) -> Result<(), StoreError>;
}

pub trait LeaseStore: Send + Sync {
    fn get(&self, id: i64) -> Result<Option<Lease>, StoreError>;
    fn save(&self, lease: &Lease) -> Result<(), StoreError>;
    /// Leases with at least one outstanding transaction hash, oldest first.
    fn find_pending(&self) -> Result<Vec<Lease>, StoreError>;
    fn find_by_nft_id(&self, nft_id: i64) -> Result<Vec<Lease>, StoreError>;
}

pub trait ReportStore: Send + Sync {
    fn get(&self, hash: &str) -> Result<Option<HubReport>, StoreError>;
    fn save(&self, report: &HubReport) -> Result<(), StoreError>;
    /// Reports whose sent date falls inside `[from, to)`.
    fn find_by_period(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<HubReport>, StoreError>;
}

pub trait RewardStore: Send + Sync {
    fn save(&self, reward: &UemReward) -> Result<(), StoreError>;
    fn find_by_period(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<UemReward>, StoreError>;
    /// Rewards not yet sealed by a content hash, i.e. still recomputable.
    fn find_unsealed(&self) -> Result<Vec<UemReward>, StoreError>;
}
