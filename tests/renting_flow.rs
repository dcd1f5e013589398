//! End-to-end pass over the renting flow: an offer is listed and confirmed,
//! a manager acquires it, the lease confirms, ownership changes hands and a
//! Hub report feeds the weekly reward computation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use deed_renting_backend::bootstrap::{ServiceRegistry, Stores};
use deed_renting_backend::chain::{
    BlockchainReader, ChainError, LeaseEventKind, LeaseEventState, OfferEventKind, OfferEventState,
};
use deed_renting_backend::config::AppConfig;
use deed_renting_backend::events::Event;
use deed_renting_backend::models::{
    HubReport, HubReportStatusType, OfferTerms, TransactionStatus, EVERYONE,
};
use deed_renting_backend::store::{MemoryStore, ReportStore};

#[derive(Default)]
struct FakeChain {
    mined: Mutex<HashSet<String>>,
    offer_events: Mutex<HashMap<String, (OfferEventKind, OfferEventState)>>,
    lease_events: Mutex<HashMap<String, (LeaseEventKind, LeaseEventState)>>,
}

impl FakeChain {
    fn mine_offer(&self, hash: &str, kind: OfferEventKind, state: OfferEventState) {
        self.mined.lock().unwrap().insert(hash.into());
        self.offer_events
            .lock()
            .unwrap()
            .insert(hash.into(), (kind, state));
    }

    fn mine_lease(&self, hash: &str, kind: LeaseEventKind, state: LeaseEventState) {
        self.mined.lock().unwrap().insert(hash.into());
        self.lease_events
            .lock()
            .unwrap()
            .insert(hash.into(), (kind, state));
    }
}

impl BlockchainReader for FakeChain {
    fn is_transaction_mined(&self, transaction_hash: &str) -> Result<bool, ChainError> {
        Ok(self.mined.lock().unwrap().contains(transaction_hash))
    }

    fn offer_transaction_events(
        &self,
        transaction_hash: &str,
    ) -> Result<HashMap<OfferEventKind, OfferEventState>, ChainError> {
        Ok(self
            .offer_events
            .lock()
            .unwrap()
            .get(transaction_hash)
            .cloned()
            .map(|(kind, state)| HashMap::from([(kind, state)]))
            .unwrap_or_default())
    }

    fn lease_transaction_events(
        &self,
        transaction_hash: &str,
    ) -> Result<HashMap<LeaseEventKind, LeaseEventState>, ChainError> {
        Ok(self
            .lease_events
            .lock()
            .unwrap()
            .get(transaction_hash)
            .cloned()
            .map(|(kind, state)| HashMap::from([(kind, state)]))
            .unwrap_or_default())
    }
}

fn registry() -> (Arc<MemoryStore>, Arc<FakeChain>, ServiceRegistry) {
    let store = Arc::new(MemoryStore::new());
    let chain = Arc::new(FakeChain::default());
    let stores = Stores {
        offers: store.clone(),
        leases: store.clone(),
        reports: store.clone(),
        rewards: store.clone(),
    };
    let config = AppConfig {
        database_url: "unused".into(),
        offer_check_interval: Duration::from_secs(60),
        lease_check_interval: Duration::from_secs(60),
        uem_reward_amount: 5000.0,
    };
    let registry = ServiceRegistry::with_stores(config, stores, chain.clone());
    (store, chain, registry)
}

fn terms(nft_id: i64, owner: &str) -> OfferTerms {
    OfferTerms {
        nft_id,
        owner: owner.into(),
        amount: 100.0,
        all_duration_amount: 1200.0,
        duration_months: 12,
        notice_period_months: 1,
        expiration_days: 7,
        owner_minting_percentage: 40,
        ..OfferTerms::default()
    }
}

#[test]
fn offer_to_lease_to_reward_flow() {
    let (store, chain, registry) = registry();

    // the owner lists deed 7 for rent; the record is optimistic
    let offer = registry
        .offers
        .create_offer(terms(7, "0xAAA"), "0xoffer-tx")
        .unwrap();
    assert_eq!(
        offer.offer_transaction_status,
        TransactionStatus::InProgress
    );

    // the creation transaction is mined, the sweep adopts the on-chain id
    chain.mine_offer(
        "0xoffer-tx",
        OfferEventKind::Created,
        OfferEventState {
            offer_id: 42,
            nft_id: 7,
            creator: "0xaaa".into(),
            block_number: 10,
        },
    );
    registry.poller.check_pending_offers();
    let offer = registry.offers.get_offer(&offer.id).unwrap();
    assert_eq!(offer.offer_id, 42);
    assert_eq!(offer.view_addresses, vec![EVERYONE.to_string()]);

    // a manager acquires the offer; the lease starts unconfirmed
    let lease_end = Utc::now() + chrono::Duration::days(365);
    registry
        .offers
        .mark_acquisition_in_progress(7, "0xlease-tx", lease_end)
        .unwrap();
    let lease = registry
        .leases
        .create_from_offer(&offer, "0xMMM", Some("manager@hub.io"), Some("0xlease-tx"))
        .unwrap();
    assert!(!lease.confirmed);

    // acquisition mined: the lease confirms and the offer is consumed
    chain.mine_lease(
        "0xlease-tx",
        LeaseEventKind::Acquired,
        LeaseEventState {
            lease_id: 42,
            nft_id: 7,
            tenant: "0xmmm".into(),
            paid_months: 1,
            block_number: 12,
            ..LeaseEventState::default()
        },
    );
    chain.mine_offer(
        "0xlease-tx",
        OfferEventKind::Acquired,
        OfferEventState {
            offer_id: 42,
            nft_id: 7,
            creator: "0xaaa".into(),
            block_number: 12,
        },
    );
    registry.poller.check_pending_leases();
    registry.poller.check_pending_offers();

    let lease = registry.leases.get_lease(42, None).unwrap();
    assert!(lease.confirmed);
    assert!(lease.pending_transactions.is_empty());
    let offer = registry.offers.get_offer(&offer.id).unwrap();
    assert!(offer.acquired);
    assert!(!offer.enabled);
    assert!(offer.acquisition_ids.is_empty());

    // the deed changes hands: leases re-point, remaining offers disable
    registry.events.publish(Event::OwnershipTransferred {
        previous_owner: "0xAAA".into(),
        new_owner: "0xBBB".into(),
        nft_id: 7,
    });
    let lease = registry.leases.get_lease(42, None).unwrap();
    assert_eq!(lease.owner, "0xbbb");

    // the hub submits its weekly report; the engine decorates it with the
    // lease snapshot and computes the period reward
    let report = HubReport {
        hash: "0xreport".into(),
        nft_id: 7,
        hub_address: "0xhub".into(),
        sent_date: Utc::now(),
        achievements_count: 25,
        hub_reward_amount: 100.0,
        engagement_rate: 2.0,
        owner_address: None,
        deed_manager_address: None,
        owner_minting_percentage: None,
        status: HubReportStatusType::Sent,
        error: None,
        reward_payment: None,
    };
    ReportStore::save(store.as_ref(), &report).unwrap();
    registry.events.publish(Event::HubReportReceived {
        hash: "0xreport".into(),
    });

    let decorated = registry.rewards.get_report("0xreport").unwrap();
    assert_eq!(decorated.owner_address.as_deref(), Some("0xbbb"));
    assert_eq!(decorated.deed_manager_address.as_deref(), Some("0xmmm"));
    assert_eq!(decorated.owner_minting_percentage, Some(40));
    assert_eq!(decorated.status, HubReportStatusType::PendingReward);
    assert_eq!(decorated.reward_payment, Some(5000.0));

    // replaying the event converges to the same state
    registry.events.publish(Event::HubReportReceived {
        hash: "0xreport".into(),
    });
    let replayed = registry.rewards.get_report("0xreport").unwrap();
    assert_eq!(replayed.reward_payment, Some(5000.0));
    assert_eq!(replayed.status, HubReportStatusType::PendingReward);
}

#[test]
fn failed_offer_update_leaves_the_listing_intact() {
    let (_store, chain, registry) = registry();

    let offer = registry
        .offers
        .create_offer(terms(9, "0xAAA"), "0xcreate")
        .unwrap();
    chain.mine_offer(
        "0xcreate",
        OfferEventKind::Created,
        OfferEventState {
            offer_id: 51,
            nft_id: 9,
            creator: "0xaaa".into(),
            block_number: 5,
        },
    );
    registry.poller.check_pending_offers();

    registry
        .offers
        .request_update(&offer.id, terms(9, "0xAAA"), "0xupdate")
        .unwrap();

    // the update transaction mines but decodes to nothing
    chain.mined.lock().unwrap().insert("0xupdate".into());
    registry.poller.check_pending_offers();

    let canonical = registry.offers.get_offer(&offer.id).unwrap();
    assert!(canonical.enabled);
    assert!(canonical.update_id.is_none());
    assert_eq!(
        canonical.offer_transaction_status,
        TransactionStatus::Validated
    );
}
