//! Lease lifecycle manager.
//!
//! A lease is born from an accepted offer, unconfirmed, with the acquisition
//! transaction queued in `pending_transactions`. Later rent payments and the
//! end-of-lease notice queue further hashes on the same record; the
//! reconciliation poller settles them one by one.

use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use tracing::{debug, warn};

use crate::chain::{LeaseEventKind, LeaseEventState};
use crate::error::ServiceError;
use crate::events::{Event, EventBus};
use crate::models::{normalize_address, open_end_date, Lease, Offer, TransactionStatus, EVERYONE};
use crate::store::LeaseStore;

/// Outcome of one pending lease transaction, decided by the poller.
#[derive(Debug, Clone)]
pub enum LeaseOutcome {
    Confirmed {
        kind: LeaseEventKind,
        state: LeaseEventState,
    },
    Failed,
}

pub struct LeaseService {
    store: Arc<dyn LeaseStore>,
    events: EventBus,
}

impl LeaseService {
    pub fn new(store: Arc<dyn LeaseStore>, events: EventBus) -> Self {
        Self { store, events }
    }

    /// Creates the optimistic lease record for an accepted offer. The lease
    /// takes the offer's on-chain id as its identity; the end date stays open
    /// until the acquisition is confirmed.
    pub fn create_from_offer(
        &self,
        offer: &Offer,
        manager_address: &str,
        manager_email: Option<&str>,
        transaction_hash: Option<&str>,
    ) -> Result<Lease, ServiceError> {
        if manager_address.trim().is_empty() {
            return Err(ServiceError::Validation(
                "hub manager address is mandatory".into(),
            ));
        }
        if offer.offer_id <= 0 {
            return Err(ServiceError::Validation(
                "offer has no on-chain identifier yet".into(),
            ));
        }
        if let Some(existing) = self.store.get(offer.offer_id)? {
            debug!(lease = existing.id, "lease already indexed for this offer");
            return Ok(existing);
        }

        let pending_transactions = match transaction_hash {
            Some(hash) if !hash.trim().is_empty() => vec![normalize_address(hash)],
            _ => Vec::new(),
        };
        let transaction_status = if pending_transactions.is_empty() {
            TransactionStatus::Validated
        } else {
            TransactionStatus::InProgress
        };
        let now = Utc::now();
        let lease = Lease {
            id: offer.offer_id,
            nft_id: offer.nft_id,
            city: offer.city,
            card_type: offer.card_type,
            months: offer.duration_months,
            paid_months: 0,
            month_payment_in_progress: 0,
            notice_period_months: offer.notice_period_months,
            owner: normalize_address(&offer.owner),
            manager: normalize_address(manager_address),
            manager_email: manager_email.map(str::to_string),
            view_addresses: Vec::new(),
            payment_periodicity: offer.payment_periodicity,
            amount: offer.amount,
            all_duration_amount: offer.all_duration_amount,
            owner_minting_percentage: offer.owner_minting_percentage,
            minting_power: offer.minting_power,
            pending_transactions,
            transaction_status,
            start_date: now,
            end_date: open_end_date(),
            notice_date: None,
            paid_rents_date: None,
            created_date: now,
            confirmed: false,
            enabled: true,
            ending_lease: false,
            ending_lease_address: None,
            last_checked_block: 0,
        };
        let lease = self.persist(lease)?;
        self.events.publish(Event::LeaseAcquired { lease_id: lease.id });
        Ok(lease)
    }

    /// Queues a rent payment transaction on the lease.
    pub fn pay_rents(
        &self,
        manager_address: &str,
        lease_id: i64,
        months: i32,
        transaction_hash: &str,
    ) -> Result<Lease, ServiceError> {
        let mut lease = self.require_lease(lease_id)?;
        self.ensure_manager(&lease, manager_address)?;
        let transaction_hash = require_transaction_hash(transaction_hash)?;
        if months <= 0 {
            return Err(ServiceError::Validation(
                "paid months must be positive".into(),
            ));
        }
        push_pending(&mut lease, &transaction_hash);
        lease.month_payment_in_progress = months;
        let lease = self.persist(lease)?;
        self.events.publish(Event::LeaseRentPaid { lease_id: lease.id });
        Ok(lease)
    }

    /// Queues the end-of-lease notice transaction.
    pub fn end_lease(
        &self,
        requester_address: &str,
        lease_id: i64,
        transaction_hash: &str,
    ) -> Result<Lease, ServiceError> {
        let mut lease = self.require_lease(lease_id)?;
        let requester = normalize_address(requester_address);
        if requester != lease.manager && requester != lease.owner {
            return Err(ServiceError::Unauthorized(format!(
                "lease {lease_id} does not involve {requester_address}"
            )));
        }
        let transaction_hash = require_transaction_hash(transaction_hash)?;
        push_pending(&mut lease, &transaction_hash);
        lease.ending_lease = true;
        lease.ending_lease_address = Some(requester);
        let lease = self.persist(lease)?;
        self.events.publish(Event::LeaseEnded { lease_id: lease.id });
        Ok(lease)
    }

    /// Settles one pending lease transaction with the outcome the poller
    /// decided.
    pub fn commit_pending_transaction(
        &self,
        lease_id: i64,
        transaction_hash: &str,
        outcome: LeaseOutcome,
    ) -> Result<(), ServiceError> {
        match outcome {
            LeaseOutcome::Failed => self.mark_transaction_error(lease_id, transaction_hash),
            LeaseOutcome::Confirmed { kind, state } => match kind {
                LeaseEventKind::Acquired => {
                    self.confirm_acquisition(lease_id, transaction_hash, &state)
                }
                LeaseEventKind::RentPaid => {
                    self.confirm_rent_payment(lease_id, transaction_hash, &state)
                }
                LeaseEventKind::Ended => self.confirm_end(lease_id, transaction_hash, &state),
            },
        }
    }

    /// Confirms the acquisition once its transaction is mined and decoded.
    /// Duplicate confirmations are absorbed with a warning, not an error:
    /// event delivery is at-least-once.
    pub fn confirm_acquisition(
        &self,
        lease_id: i64,
        transaction_hash: &str,
        state: &LeaseEventState,
    ) -> Result<(), ServiceError> {
        let mut lease = self.require_lease(lease_id)?;
        if lease.confirmed {
            warn!(
                lease = lease_id,
                tx = transaction_hash,
                "acquisition already confirmed, ignoring duplicate event"
            );
            return Ok(());
        }
        remove_pending(&mut lease, transaction_hash);
        lease.confirmed = true;
        if !state.tenant.trim().is_empty() {
            lease.manager = normalize_address(&state.tenant);
        }
        if state.nft_id > 0 && state.nft_id != lease.nft_id {
            warn!(
                lease = lease_id,
                expected = lease.nft_id,
                decoded = state.nft_id,
                "acquisition transaction targets another deed"
            );
        }
        lease.paid_months = state.paid_months.max(lease.paid_months);
        lease.start_date = lease.created_date;
        lease.end_date = lease
            .created_date
            .checked_add_months(Months::new(lease.months.max(0) as u32))
            .unwrap_or_else(open_end_date);
        lease.last_checked_block = state.block_number.max(lease.last_checked_block);
        let lease = self.persist(lease)?;
        self.events.publish(Event::LeaseAcquisitionConfirmed {
            lease_id: lease.id,
        });
        Ok(())
    }

    fn confirm_rent_payment(
        &self,
        lease_id: i64,
        transaction_hash: &str,
        state: &LeaseEventState,
    ) -> Result<(), ServiceError> {
        let mut lease = self.require_lease(lease_id)?;
        if !has_pending(&lease, transaction_hash) {
            debug!(lease = lease_id, tx = transaction_hash, "payment already settled");
            return Ok(());
        }
        remove_pending(&mut lease, transaction_hash);
        if lease.month_payment_in_progress > 0 {
            let newly_paid = state.paid_months - lease.paid_months;
            lease.month_payment_in_progress =
                (lease.month_payment_in_progress - newly_paid).max(0);
        }
        lease.paid_months = state.paid_months;
        lease.paid_rents_date = timestamp(state.paid_rents_date_seconds);
        lease.last_checked_block = state.block_number.max(lease.last_checked_block);
        let lease = self.persist(lease)?;
        self.events.publish(Event::LeaseRentPaymentConfirmed {
            lease_id: lease.id,
        });
        Ok(())
    }

    fn confirm_end(
        &self,
        lease_id: i64,
        transaction_hash: &str,
        state: &LeaseEventState,
    ) -> Result<(), ServiceError> {
        let mut lease = self.require_lease(lease_id)?;
        if !has_pending(&lease, transaction_hash) {
            debug!(lease = lease_id, tx = transaction_hash, "notice already settled");
            return Ok(());
        }
        remove_pending(&mut lease, transaction_hash);
        if let Some(end_date) = timestamp(state.lease_end_date_seconds) {
            if lease.ending_lease && end_date < lease.end_date {
                lease.end_date = end_date;
            }
        }
        lease.notice_date = timestamp(state.notice_date_seconds);
        lease.ending_lease = false;
        lease.last_checked_block = state.block_number.max(lease.last_checked_block);
        let lease = self.persist(lease)?;
        self.events.publish(Event::LeaseEndConfirmed { lease_id: lease.id });
        Ok(())
    }

    /// Failure path for a pending lease transaction. An unconfirmed lease
    /// whose acquisition failed never really existed and is disabled; a
    /// failed payment or notice just drops its in-progress flags.
    pub fn mark_transaction_error(
        &self,
        lease_id: i64,
        transaction_hash: &str,
    ) -> Result<(), ServiceError> {
        let mut lease = self.require_lease(lease_id)?;
        if lease.paid_months <= 0 && !lease.confirmed && has_pending(&lease, transaction_hash) {
            warn!(lease = lease_id, tx = transaction_hash, "acquisition failed, disabling lease");
            lease.enabled = false;
        }
        lease.ending_lease = false;
        lease.ending_lease_address = None;
        lease.month_payment_in_progress = 0;
        remove_pending(&mut lease, transaction_hash);
        self.persist(lease)?;
        Ok(())
    }

    /// Re-points ownership of every active lease of the deed. A transfer to
    /// the current owner (case-insensitively) is a no-op.
    pub fn transfer_ownership(&self, new_owner: &str, nft_id: i64) -> Result<(), ServiceError> {
        let new_owner = normalize_address(new_owner);
        let now = Utc::now();
        for mut lease in self.store.find_by_nft_id(nft_id)? {
            if !lease.enabled || lease.end_date <= now {
                continue;
            }
            if lease.owner == new_owner {
                continue;
            }
            debug!(lease = lease.id, owner = %new_owner, "re-pointing lease ownership");
            lease.owner = new_owner.clone();
            self.persist(lease)?;
        }
        Ok(())
    }

    /// Leases with outstanding transactions, for the poller to sweep.
    pub fn get_pending_transactions(&self) -> Result<Vec<Lease>, ServiceError> {
        Ok(self.store.find_pending()?)
    }

    /// The active confirmed lease of a deed, if any.
    pub fn get_current_lease(&self, nft_id: i64) -> Result<Option<Lease>, ServiceError> {
        let now = Utc::now();
        Ok(self
            .store
            .find_by_nft_id(nft_id)?
            .into_iter()
            .filter(|lease| lease.enabled && lease.confirmed && lease.end_date > now)
            .max_by_key(|lease| lease.start_date))
    }

    pub fn get_lease(&self, lease_id: i64, wallet_address: Option<&str>) -> Result<Lease, ServiceError> {
        let lease = self.require_lease(lease_id)?;
        let viewer = wallet_address.map(normalize_address);
        let visible = lease.view_addresses.iter().any(|a| a == EVERYONE)
            || viewer.as_ref().is_some_and(|v| {
                *v == lease.owner || *v == lease.manager || lease.view_addresses.contains(v)
            });
        if visible {
            Ok(lease)
        } else {
            Err(ServiceError::Unauthorized(format!(
                "lease {lease_id} is not visible to this wallet"
            )))
        }
    }

    fn require_lease(&self, lease_id: i64) -> Result<Lease, ServiceError> {
        self.store
            .get(lease_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("lease {lease_id}")))
    }

    fn ensure_manager(&self, lease: &Lease, manager_address: &str) -> Result<(), ServiceError> {
        if lease.manager != normalize_address(manager_address) {
            return Err(ServiceError::Unauthorized(format!(
                "lease {} does not belong to {manager_address}",
                lease.id
            )));
        }
        Ok(())
    }

    /// Derives visibility and transaction status before every write. A
    /// disabled lease is invisible, an unconfirmed one is private to its two
    /// parties, a confirmed one is public.
    fn persist(&self, mut lease: Lease) -> Result<Lease, ServiceError> {
        if !lease.enabled {
            lease.view_addresses = Vec::new();
        } else if !lease.confirmed {
            lease.view_addresses = vec![lease.owner.clone(), lease.manager.clone()];
        } else {
            lease.view_addresses = vec![EVERYONE.to_string()];
        }
        if !lease.pending_transactions.is_empty() {
            lease.transaction_status = TransactionStatus::InProgress;
        } else if lease.confirmed {
            lease.transaction_status = TransactionStatus::Validated;
        } else if lease.transaction_status == TransactionStatus::InProgress {
            // no pending transaction left and never confirmed
            lease.transaction_status = TransactionStatus::Error;
        }
        self.store.save(&lease)?;
        Ok(lease)
    }
}

fn push_pending(lease: &mut Lease, transaction_hash: &str) {
    let normalized = normalize_address(transaction_hash);
    if !has_pending(lease, &normalized) {
        lease.pending_transactions.push(normalized);
    }
}

fn has_pending(lease: &Lease, transaction_hash: &str) -> bool {
    let normalized = normalize_address(transaction_hash);
    lease
        .pending_transactions
        .iter()
        .any(|hash| normalize_address(hash) == normalized)
}

fn remove_pending(lease: &mut Lease, transaction_hash: &str) {
    let normalized = normalize_address(transaction_hash);
    lease
        .pending_transactions
        .retain(|hash| normalize_address(hash) != normalized);
}

fn require_transaction_hash(transaction_hash: &str) -> Result<String, ServiceError> {
    let normalized = normalize_address(transaction_hash);
    if normalized.is_empty() {
        return Err(ServiceError::Validation(
            "transaction hash is mandatory".into(),
        ));
    }
    Ok(normalized)
}

fn timestamp(epoch_seconds: i64) -> Option<DateTime<Utc>> {
    if epoch_seconds <= 0 {
        return None;
    }
    DateTime::from_timestamp(epoch_seconds, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OfferTerms, PaymentPeriodicity};
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn service() -> (Arc<MemoryStore>, LeaseService) {
        let store = Arc::new(MemoryStore::new());
        let leases = LeaseService::new(store.clone(), EventBus::new());
        (store, leases)
    }

    fn accepted_offer(offer_id: i64, nft_id: i64, owner: &str) -> Offer {
        let now = Utc::now();
        Offer {
            id: "offer-1".into(),
            offer_id,
            nft_id,
            city: None,
            card_type: None,
            owner: owner.into(),
            host_address: None,
            description: None,
            view_addresses: vec![EVERYONE.to_string()],
            amount: 100.0,
            all_duration_amount: 1200.0,
            duration_months: 12,
            notice_period_months: 1,
            expiration_days: 7,
            payment_periodicity: PaymentPeriodicity::OneMonth,
            owner_minting_percentage: 50,
            minting_power: 1.0,
            offer_transaction_hash: "0xoffer".into(),
            offer_transaction_status: TransactionStatus::Validated,
            start_date: now,
            expiration_date: now + Duration::days(7),
            enabled: true,
            acquired: false,
            parent_id: None,
            update_id: None,
            delete_id: None,
            acquisition_ids: Vec::new(),
            last_checked_block: 0,
            created_date: now,
            modified_date: now,
        }
    }

    fn acquisition_state(lease_id: i64, nft_id: i64, tenant: &str, block: i64) -> LeaseEventState {
        LeaseEventState {
            lease_id,
            nft_id,
            tenant: tenant.into(),
            paid_months: 1,
            paid_rents_date_seconds: 0,
            lease_end_date_seconds: 0,
            notice_date_seconds: 0,
            block_number: block,
        }
    }

    #[test]
    fn lease_from_offer_is_unconfirmed_and_private() {
        let (_, leases) = service();
        let lease = leases
            .create_from_offer(
                &accepted_offer(42, 7, "0xOwner"),
                "0xManager",
                Some("manager@hub.io"),
                Some("0xDEF"),
            )
            .unwrap();
        assert_eq!(lease.id, 42);
        assert!(!lease.confirmed);
        assert_eq!(lease.transaction_status, TransactionStatus::InProgress);
        assert_eq!(lease.pending_transactions, vec!["0xdef".to_string()]);
        assert_eq!(lease.end_date, open_end_date());
        assert_eq!(
            lease.view_addresses,
            vec!["0xowner".to_string(), "0xmanager".to_string()]
        );
    }

    #[test]
    fn lease_without_transaction_hash_is_validated_immediately() {
        let (_, leases) = service();
        let lease = leases
            .create_from_offer(&accepted_offer(42, 7, "0xowner"), "0xmanager", None, None)
            .unwrap();
        assert_eq!(lease.transaction_status, TransactionStatus::Validated);
        assert!(lease.pending_transactions.is_empty());
    }

    #[test]
    fn creating_twice_returns_the_indexed_lease() {
        let (_, leases) = service();
        let offer = accepted_offer(42, 7, "0xowner");
        let first = leases
            .create_from_offer(&offer, "0xmanager", None, Some("0xdef"))
            .unwrap();
        let second = leases
            .create_from_offer(&offer, "0xother", None, Some("0xother-tx"))
            .unwrap();
        assert_eq!(second.manager, first.manager);
        assert_eq!(second.pending_transactions, first.pending_transactions);
    }

    #[test]
    fn confirmed_acquisition_settles_end_date_and_goes_public() {
        let (_, leases) = service();
        let lease = leases
            .create_from_offer(&accepted_offer(42, 7, "0xowner"), "0xmanager", None, Some("0xdef"))
            .unwrap();
        leases
            .confirm_acquisition(lease.id, "0xdef", &acquisition_state(42, 7, "0xManager", 20))
            .unwrap();

        let confirmed = leases.get_lease(42, None).unwrap();
        assert!(confirmed.confirmed);
        assert!(confirmed.pending_transactions.is_empty());
        assert_eq!(confirmed.transaction_status, TransactionStatus::Validated);
        assert_eq!(
            confirmed.end_date,
            confirmed
                .created_date
                .checked_add_months(Months::new(12))
                .unwrap()
        );
        assert_eq!(confirmed.view_addresses, vec![EVERYONE.to_string()]);
    }

    #[test]
    fn duplicate_acquisition_confirmation_is_a_silent_no_op() {
        let (_, leases) = service();
        let lease = leases
            .create_from_offer(&accepted_offer(42, 7, "0xowner"), "0xmanager", None, Some("0xdef"))
            .unwrap();
        leases
            .confirm_acquisition(lease.id, "0xdef", &acquisition_state(42, 7, "0xmanager", 20))
            .unwrap();
        let before = leases.get_lease(42, None).unwrap();

        leases
            .confirm_acquisition(lease.id, "0xdef", &acquisition_state(42, 7, "0xintruder", 30))
            .unwrap();

        let after = leases.get_lease(42, None).unwrap();
        assert_eq!(after.manager, before.manager);
        assert_eq!(after.last_checked_block, before.last_checked_block);
    }

    #[test]
    fn failed_acquisition_disables_the_lease() {
        let (_, leases) = service();
        let lease = leases
            .create_from_offer(&accepted_offer(42, 7, "0xowner"), "0xmanager", None, Some("0xdef"))
            .unwrap();
        leases
            .commit_pending_transaction(lease.id, "0xdef", LeaseOutcome::Failed)
            .unwrap();

        let failed = leases.require_lease(42).unwrap();
        assert!(!failed.enabled);
        assert!(failed.pending_transactions.is_empty());
        assert_eq!(failed.transaction_status, TransactionStatus::Error);
        assert!(failed.view_addresses.is_empty());
    }

    #[test]
    fn rent_payment_settles_and_drains_in_progress_months() {
        let (_, leases) = service();
        let lease = leases
            .create_from_offer(&accepted_offer(42, 7, "0xowner"), "0xmanager", None, Some("0xdef"))
            .unwrap();
        leases
            .confirm_acquisition(lease.id, "0xdef", &acquisition_state(42, 7, "0xmanager", 20))
            .unwrap();
        leases.pay_rents("0xmanager", 42, 3, "0xpay").unwrap();

        let pending = leases.get_pending_transactions().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].month_payment_in_progress, 3);

        let state = LeaseEventState {
            lease_id: 42,
            nft_id: 7,
            tenant: "0xmanager".into(),
            paid_months: 4,
            paid_rents_date_seconds: 1_700_000_000,
            lease_end_date_seconds: 0,
            notice_date_seconds: 0,
            block_number: 25,
        };
        leases
            .commit_pending_transaction(
                42,
                "0xpay",
                LeaseOutcome::Confirmed {
                    kind: LeaseEventKind::RentPaid,
                    state,
                },
            )
            .unwrap();

        let paid = leases.get_lease(42, None).unwrap();
        assert_eq!(paid.paid_months, 4);
        assert_eq!(paid.month_payment_in_progress, 0);
        assert!(paid.paid_rents_date.is_some());
        assert_eq!(paid.transaction_status, TransactionStatus::Validated);
    }

    #[test]
    fn pay_rents_requires_the_lease_manager() {
        let (_, leases) = service();
        leases
            .create_from_offer(&accepted_offer(42, 7, "0xowner"), "0xmanager", None, Some("0xdef"))
            .unwrap();
        let result = leases.pay_rents("0xsomeoneelse", 42, 3, "0xpay");
        assert!(matches!(result, Err(ServiceError::Unauthorized(_))));
    }

    #[test]
    fn end_lease_notice_shortens_the_end_date_once_confirmed() {
        let (_, leases) = service();
        let lease = leases
            .create_from_offer(&accepted_offer(42, 7, "0xowner"), "0xmanager", None, Some("0xdef"))
            .unwrap();
        leases
            .confirm_acquisition(lease.id, "0xdef", &acquisition_state(42, 7, "0xmanager", 20))
            .unwrap();
        leases.end_lease("0xmanager", 42, "0xend").unwrap();

        let noticed = leases.require_lease(42).unwrap();
        assert!(noticed.ending_lease);
        assert_eq!(noticed.ending_lease_address, Some("0xmanager".to_string()));

        let sooner = Utc::now() + Duration::days(30);
        let state = LeaseEventState {
            lease_id: 42,
            nft_id: 7,
            tenant: "0xmanager".into(),
            paid_months: 1,
            paid_rents_date_seconds: 0,
            lease_end_date_seconds: sooner.timestamp(),
            notice_date_seconds: Utc::now().timestamp(),
            block_number: 30,
        };
        leases
            .commit_pending_transaction(
                42,
                "0xend",
                LeaseOutcome::Confirmed {
                    kind: LeaseEventKind::Ended,
                    state,
                },
            )
            .unwrap();

        let ended = leases.get_lease(42, None).unwrap();
        assert!(!ended.ending_lease);
        assert!(ended.end_date < open_end_date());
        assert!(ended.notice_date.is_some());
        assert_eq!(ended.end_date.timestamp(), sooner.timestamp());
    }

    #[test]
    fn ownership_transfer_rewrites_owner_lower_cased() {
        let (_, leases) = service();
        let lease = leases
            .create_from_offer(&accepted_offer(42, 7, "0xAAA"), "0xmanager", None, Some("0xdef"))
            .unwrap();
        leases
            .confirm_acquisition(lease.id, "0xdef", &acquisition_state(42, 7, "0xmanager", 20))
            .unwrap();

        leases.transfer_ownership("0xB", 7).unwrap();
        assert_eq!(leases.get_lease(42, None).unwrap().owner, "0xb");

        // same owner, different case: nothing to rewrite
        leases.transfer_ownership("0XB", 7).unwrap();
        assert_eq!(leases.get_lease(42, None).unwrap().owner, "0xb");
    }

    #[test]
    fn unconfirmed_lease_is_hidden_from_strangers() {
        let (_, leases) = service();
        leases
            .create_from_offer(&accepted_offer(42, 7, "0xowner"), "0xmanager", None, Some("0xdef"))
            .unwrap();
        assert!(leases.get_lease(42, Some("0xmanager")).is_ok());
        assert!(leases.get_lease(42, Some("0xowner")).is_ok());
        assert!(matches!(
            leases.get_lease(42, Some("0xstranger")),
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[test]
    fn current_lease_requires_confirmation() {
        let (_, leases) = service();
        let lease = leases
            .create_from_offer(&accepted_offer(42, 7, "0xowner"), "0xmanager", None, Some("0xdef"))
            .unwrap();
        assert!(leases.get_current_lease(7).unwrap().is_none());
        leases
            .confirm_acquisition(lease.id, "0xdef", &acquisition_state(42, 7, "0xmanager", 20))
            .unwrap();
        let current = leases.get_current_lease(7).unwrap().unwrap();
        assert_eq!(current.id, 42);
    }
}
