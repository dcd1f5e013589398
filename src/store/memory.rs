//! In-memory store used by tests and embedded deployments.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{HubReport, Lease, Offer, TransactionStatus, UemReward};

use super::{LeaseStore, OfferStore, ReportStore, RewardStore};

#[derive(Default)]
pub struct MemoryStore {
    offers: Mutex<HashMap<String, Offer>>,
    leases: Mutex<HashMap<i64, Lease>>,
    reports: Mutex<HashMap<String, HubReport>>,
    rewards: Mutex<HashMap<String, UemReward>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OfferStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<Offer>, StoreError> {
        Ok(self.offers.lock().unwrap().get(id).cloned())
    }

    fn save(&self, offer: &Offer) -> Result<(), StoreError> {
        self.offers
            .lock()
            .unwrap()
            .insert(offer.id.clone(), offer.clone());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.offers.lock().unwrap().remove(id);
        Ok(())
    }

    fn find_by_status(&self, status: TransactionStatus) -> Result<Vec<Offer>, StoreError> {
        let mut offers: Vec<Offer> = self
            .offers
            .lock()
            .unwrap()
            .values()
            .filter(|offer| offer.offer_transaction_status == status)
            .cloned()
            .collect();
        offers.sort_by_key(|offer| offer.created_date);
        Ok(offers)
    }

    fn find_by_nft_id(&self, nft_id: i64) -> Result<Vec<Offer>, StoreError> {
        let mut offers: Vec<Offer> = self
            .offers
            .lock()
            .unwrap()
            .values()
            .filter(|offer| offer.nft_id == nft_id)
            .cloned()
            .collect();
        offers.sort_by_key(|offer| offer.created_date);
        Ok(offers)
    }

    fn find_by_owner(&self, owner: &str) -> Result<Vec<Offer>, StoreError> {
        let mut offers: Vec<Offer> = self
            .offers
            .lock()
            .unwrap()
            .values()
            .filter(|offer| offer.owner == owner)
            .cloned()
            .collect();
        offers.sort_by_key(|offer| offer.created_date);
        Ok(offers)
    }

    fn find_by_transaction_hash(
        &self,
        transaction_hash: &str,
    ) -> Result<Option<Offer>, StoreError> {
        Ok(self
            .offers
            .lock()
            .unwrap()
            .values()
            .find(|offer| offer.offer_transaction_hash == transaction_hash)
            .cloned())
    }

    fn find_canonical_by_offer_id(&self, offer_id: i64) -> Result<Option<Offer>, StoreError> {
        Ok(self
            .offers
            .lock()
            .unwrap()
            .values()
            .find(|offer| offer.offer_id == offer_id && offer.parent_id.is_none())
            .cloned())
    }

    fn delete_by_parent_id(&self, parent_id: &str) -> Result<(), StoreError> {
        self.offers
            .lock()
            .unwrap()
            .retain(|_, offer| offer.parent_id.as_deref() != Some(parent_id));
        Ok(())
    }
}

impl LeaseStore for MemoryStore {
    fn get(&self, id: i64) -> Result<Option<Lease>, StoreError> {
        Ok(self.leases.lock().unwrap().get(&id).cloned())
    }

    fn save(&self, lease: &Lease) -> Result<(), StoreError> {
        self.leases.lock().unwrap().insert(lease.id, lease.clone());
        Ok(())
    }

    fn find_pending(&self) -> Result<Vec<Lease>, StoreError> {
        let mut leases: Vec<Lease> = self
            .leases
            .lock()
            .unwrap()
            .values()
            .filter(|lease| !lease.pending_transactions.is_empty())
            .cloned()
            .collect();
        leases.sort_by_key(|lease| lease.created_date);
        Ok(leases)
    }

    fn find_by_nft_id(&self, nft_id: i64) -> Result<Vec<Lease>, StoreError> {
        let mut leases: Vec<Lease> = self
            .leases
            .lock()
            .unwrap()
            .values()
            .filter(|lease| lease.nft_id == nft_id)
            .cloned()
            .collect();
        leases.sort_by_key(|lease| lease.created_date);
        Ok(leases)
    }
}

impl ReportStore for MemoryStore {
    fn get(&self, hash: &str) -> Result<Option<HubReport>, StoreError> {
        Ok(self.reports.lock().unwrap().get(hash).cloned())
    }

    fn save(&self, report: &HubReport) -> Result<(), StoreError> {
        self.reports
            .lock()
            .unwrap()
            .insert(report.hash.clone(), report.clone());
        Ok(())
    }

    fn find_by_period(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<HubReport>, StoreError> {
        let mut reports: Vec<HubReport> = self
            .reports
            .lock()
            .unwrap()
            .values()
            .filter(|report| report.sent_date >= from && report.sent_date < to)
            .cloned()
            .collect();
        reports.sort_by(|a, b| a.hash.cmp(&b.hash));
        Ok(reports)
    }
}

impl RewardStore for MemoryStore {
    fn save(&self, reward: &UemReward) -> Result<(), StoreError> {
        self.rewards
            .lock()
            .unwrap()
            .insert(reward.id.clone(), reward.clone());
        Ok(())
    }

    fn find_by_period(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<UemReward>, StoreError> {
        Ok(self
            .rewards
            .lock()
            .unwrap()
            .values()
            .find(|reward| reward.from_date == from && reward.to_date == to)
            .cloned())
    }

    fn find_unsealed(&self) -> Result<Vec<UemReward>, StoreError> {
        let mut rewards: Vec<UemReward> = self
            .rewards
            .lock()
            .unwrap()
            .values()
            .filter(|reward| reward.hash.is_none())
            .cloned()
            .collect();
        rewards.sort_by_key(|reward| reward.from_date);
        Ok(rewards)
    }
}
