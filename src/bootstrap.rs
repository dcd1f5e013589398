//! Service wiring.
//!
//! The web layer owns the process; it builds a [`ServiceRegistry`] once at
//! startup with its blockchain reader and calls into the services from its
//! request handlers. `spawn_reconciliation_tasks` starts the periodic sweeps.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::chain::BlockchainReader;
use crate::config::AppConfig;
use crate::events::EventBus;
use crate::leases::LeaseService;
use crate::listeners::OwnershipTransferListener;
use crate::offers::OfferService;
use crate::poller::ReconciliationPoller;
use crate::rewards::RewardStatusEngine;
use crate::store::{LeaseStore, OfferStore, PgStore, ReportStore, RewardStore};

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

pub struct Stores {
    pub offers: Arc<dyn OfferStore>,
    pub leases: Arc<dyn LeaseStore>,
    pub reports: Arc<dyn ReportStore>,
    pub rewards: Arc<dyn RewardStore>,
}

impl Stores {
    pub fn postgres(database_url: &str) -> Self {
        let store = Arc::new(PgStore::new(database_url));
        Self {
            offers: store.clone(),
            leases: store.clone(),
            reports: store.clone(),
            rewards: store,
        }
    }
}

pub struct ServiceRegistry {
    pub events: EventBus,
    pub offers: Arc<OfferService>,
    pub leases: Arc<LeaseService>,
    pub rewards: Arc<RewardStatusEngine>,
    pub poller: Arc<ReconciliationPoller>,
    config: AppConfig,
}

impl ServiceRegistry {
    pub fn build(config: AppConfig, chain: Arc<dyn BlockchainReader>) -> Self {
        let stores = Stores::postgres(&config.database_url);
        Self::with_stores(config, stores, chain)
    }

    pub fn with_stores(
        config: AppConfig,
        stores: Stores,
        chain: Arc<dyn BlockchainReader>,
    ) -> Self {
        let events = EventBus::new();
        let offers = Arc::new(OfferService::new(stores.offers, events.clone()));
        let leases = Arc::new(LeaseService::new(stores.leases, events.clone()));
        let rewards = Arc::new(RewardStatusEngine::new(
            stores.reports,
            stores.rewards,
            leases.clone(),
            events.clone(),
            config.uem_reward_amount,
        ));
        let poller = Arc::new(ReconciliationPoller::new(
            offers.clone(),
            leases.clone(),
            chain,
        ));

        events.subscribe(Arc::new(OwnershipTransferListener::new(
            offers.clone(),
            leases.clone(),
        )));
        events.subscribe(rewards.clone());

        info!("deed renting services wired");
        Self {
            events,
            offers,
            leases,
            rewards,
            poller,
            config,
        }
    }

    /// Starts the two periodic reconciliation sweeps on the current tokio
    /// runtime.
    pub fn spawn_reconciliation_tasks(&self) -> Vec<JoinHandle<()>> {
        info!(
            offer_interval_secs = self.config.offer_check_interval.as_secs(),
            lease_interval_secs = self.config.lease_check_interval.as_secs(),
            "starting blockchain reconciliation tasks"
        );
        Arc::clone(&self.poller).spawn(
            self.config.offer_check_interval,
            self.config.lease_check_interval,
        )
    }
}
