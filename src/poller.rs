//! Blockchain reconciliation poller.
//!
//! On a fixed tick, sweeps every record with a transaction awaiting
//! confirmation, asks the chain reader whether the transaction is mined, and
//! commits the decoded outcome through the lifecycle managers. A transaction
//! that is not yet mined is simply retried next tick, with no timeout:
//! transactions may legitimately wait for block confirmations. Each sweep
//! type is single-flight: a tick that fires while the previous sweep of the
//! same type is still running is skipped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::chain::BlockchainReader;
use crate::leases::{LeaseOutcome, LeaseService};
use crate::models::{Lease, Offer};
use crate::offers::{OfferOutcome, OfferService};

pub struct ReconciliationPoller {
    offers: Arc<OfferService>,
    leases: Arc<LeaseService>,
    chain: Arc<dyn BlockchainReader>,
    offer_sweep_running: AtomicBool,
    lease_sweep_running: AtomicBool,
}

/// Resets the single-flight flag when a sweep exits, panics included.
struct SweepGuard<'a>(&'a AtomicBool);

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ReconciliationPoller {
    pub fn new(
        offers: Arc<OfferService>,
        leases: Arc<LeaseService>,
        chain: Arc<dyn BlockchainReader>,
    ) -> Self {
        Self {
            offers,
            leases,
            chain,
            offer_sweep_running: AtomicBool::new(false),
            lease_sweep_running: AtomicBool::new(false),
        }
    }

    /// One sweep over pending offer transactions. A single record's failure
    /// never aborts the rest of the sweep.
    pub fn check_pending_offers(&self) {
        if self.offer_sweep_running.swap(true, Ordering::Acquire) {
            debug!("offer sweep still running, skipping tick");
            return;
        }
        let _guard = SweepGuard(&self.offer_sweep_running);

        let pending = match self.offers.get_pending_transactions() {
            Ok(pending) => pending,
            Err(error) => {
                warn!(%error, "could not list pending offer transactions");
                return;
            }
        };
        if pending.is_empty() {
            return;
        }
        let started = Instant::now();
        info!(count = pending.len(), "checking pending offer transactions");
        for offer in &pending {
            if let Err(error) = self.reconcile_offer(offer) {
                warn!(
                    offer = %offer.id,
                    tx = %offer.offer_transaction_hash,
                    %error,
                    "offer reconciliation failed, will retry next tick"
                );
            }
        }
        info!(
            count = pending.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "finished pending offer sweep"
        );
    }

    /// One sweep over pending lease transactions.
    pub fn check_pending_leases(&self) {
        if self.lease_sweep_running.swap(true, Ordering::Acquire) {
            debug!("lease sweep still running, skipping tick");
            return;
        }
        let _guard = SweepGuard(&self.lease_sweep_running);

        let pending = match self.leases.get_pending_transactions() {
            Ok(pending) => pending,
            Err(error) => {
                warn!(%error, "could not list pending lease transactions");
                return;
            }
        };
        if pending.is_empty() {
            return;
        }
        let started = Instant::now();
        info!(count = pending.len(), "checking pending lease transactions");
        for lease in &pending {
            for transaction_hash in lease.pending_transactions.clone() {
                if let Err(error) = self.reconcile_lease(lease, &transaction_hash) {
                    warn!(
                        lease = lease.id,
                        tx = %transaction_hash,
                        %error,
                        "lease reconciliation failed, will retry next tick"
                    );
                }
            }
        }
        info!(
            count = pending.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "finished pending lease sweep"
        );
    }

    fn reconcile_offer(&self, offer: &Offer) -> Result<(), crate::error::ServiceError> {
        let transaction_hash = offer.offer_transaction_hash.trim();
        if transaction_hash.is_empty() {
            // a blank hash can never be mined
            return self
                .offers
                .commit_pending_change(&offer.id, OfferOutcome::Failed);
        }
        match self.chain.is_transaction_mined(transaction_hash) {
            Err(error) => {
                debug!(tx = transaction_hash, %error, "chain unavailable, retrying later");
                Ok(())
            }
            Ok(false) => Ok(()),
            Ok(true) => {
                let events = match self.chain.offer_transaction_events(transaction_hash) {
                    Err(error) => {
                        debug!(tx = transaction_hash, %error, "chain unavailable, retrying later");
                        return Ok(());
                    }
                    Ok(events) => events,
                };
                if events.len() > 1 {
                    warn!(
                        tx = transaction_hash,
                        "transaction holds more than one offer event, using the first one"
                    );
                }
                let outcome = match events.into_iter().next() {
                    None => {
                        let error =
                            crate::error::ServiceError::DecodeFailure(transaction_hash.into());
                        warn!(offer = %offer.id, %error, "rolling back pending change");
                        OfferOutcome::Failed
                    }
                    Some((kind, state)) => OfferOutcome::Confirmed { kind, state },
                };
                self.offers.commit_pending_change(&offer.id, outcome)
            }
        }
    }

    fn reconcile_lease(
        &self,
        lease: &Lease,
        transaction_hash: &str,
    ) -> Result<(), crate::error::ServiceError> {
        if transaction_hash.trim().is_empty() {
            return self
                .leases
                .commit_pending_transaction(lease.id, transaction_hash, LeaseOutcome::Failed);
        }
        match self.chain.is_transaction_mined(transaction_hash) {
            Err(error) => {
                debug!(tx = transaction_hash, %error, "chain unavailable, retrying later");
                Ok(())
            }
            Ok(false) => Ok(()),
            Ok(true) => {
                let events = match self.chain.lease_transaction_events(transaction_hash) {
                    Err(error) => {
                        debug!(tx = transaction_hash, %error, "chain unavailable, retrying later");
                        return Ok(());
                    }
                    Ok(events) => events,
                };
                if events.len() > 1 {
                    warn!(
                        tx = transaction_hash,
                        "transaction holds more than one lease event, using the first one"
                    );
                }
                let outcome = match events.into_iter().next() {
                    None => {
                        let error =
                            crate::error::ServiceError::DecodeFailure(transaction_hash.into());
                        warn!(lease = lease.id, %error, "rolling back pending transaction");
                        LeaseOutcome::Failed
                    }
                    Some((kind, state)) => LeaseOutcome::Confirmed { kind, state },
                };
                self.leases
                    .commit_pending_transaction(lease.id, transaction_hash, outcome)
            }
        }
    }

    /// Spawns the two periodic sweep tasks. Sweeps run on the blocking pool
    /// since the store and the chain reader are blocking collaborators.
    pub fn spawn(
        self: Arc<Self>,
        offer_interval: std::time::Duration,
        lease_interval: std::time::Duration,
    ) -> Vec<JoinHandle<()>> {
        let offer_task = {
            let poller = Arc::clone(&self);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(offer_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let sweep = Arc::clone(&poller);
                    if let Err(error) =
                        tokio::task::spawn_blocking(move || sweep.check_pending_offers()).await
                    {
                        error!(%error, "offer sweep task failed");
                    }
                }
            })
        };
        let lease_task = {
            let poller = Arc::clone(&self);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(lease_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let sweep = Arc::clone(&poller);
                    if let Err(error) =
                        tokio::task::spawn_blocking(move || sweep.check_pending_leases()).await
                    {
                        error!(%error, "lease sweep task failed");
                    }
                }
            })
        };
        vec![offer_task, lease_task]
    }
}
