//! Offer lifecycle manager.
//!
//! Writes are optimistic: a user action lands in the store immediately with
//! `IN_PROGRESS` status, and the reconciliation poller later commits or fails
//! the pending change once its transaction is mined. On-chain mutations of an
//! existing offer never touch the canonical row directly; they are staged as
//! change-log entries (`parent_id` set) that the canonical row references
//! through `update_id`, `delete_id` or `acquisition_ids` until confirmation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::chain::{OfferEventKind, OfferEventState};
use crate::error::ServiceError;
use crate::events::{Event, EventBus};
use crate::models::{
    normalize_address, open_end_date, Offer, OfferTerms, PaymentPeriodicity, TransactionStatus,
    EVERYONE,
};
use crate::store::OfferStore;

/// Outcome of one pending offer transaction, decided by the poller.
#[derive(Debug, Clone)]
pub enum OfferOutcome {
    Confirmed {
        kind: OfferEventKind,
        state: OfferEventState,
    },
    Failed,
}

/// Filter over the off-chain offer index.
#[derive(Debug, Clone, Default)]
pub struct OfferFilter {
    pub nft_id: Option<i64>,
    pub owner: Option<String>,
    pub exclude_disabled: bool,
    pub current_address: Option<String>,
}

enum PendingMarker {
    Update,
    Delete,
}

pub struct OfferService {
    store: Arc<dyn OfferStore>,
    events: EventBus,
}

impl OfferService {
    pub fn new(store: Arc<dyn OfferStore>, events: EventBus) -> Self {
        Self { store, events }
    }

    /// Writes the optimistic canonical row for a new renting offer.
    pub fn create_offer(
        &self,
        terms: OfferTerms,
        transaction_hash: &str,
    ) -> Result<Offer, ServiceError> {
        validate_identity(&terms)?;
        validate_commercial_terms(&terms)?;
        let transaction_hash = require_transaction_hash(transaction_hash)?;
        self.ensure_transaction_hash_unknown(&transaction_hash)?;

        let now = Utc::now();
        let start_date = terms.start_date.unwrap_or(now);
        let offer = Offer {
            id: Uuid::new_v4().to_string(),
            offer_id: 0,
            nft_id: terms.nft_id,
            city: terms.city,
            card_type: terms.card_type,
            owner: normalize_address(&terms.owner),
            host_address: terms.host_address.as_deref().map(normalize_address),
            description: terms.description.clone(),
            view_addresses: Vec::new(),
            amount: terms.amount,
            all_duration_amount: terms.all_duration_amount,
            duration_months: terms.duration_months,
            notice_period_months: terms.notice_period_months,
            expiration_days: terms.expiration_days,
            payment_periodicity: terms
                .payment_periodicity
                .unwrap_or(PaymentPeriodicity::OneMonth),
            owner_minting_percentage: terms.owner_minting_percentage,
            minting_power: terms.card_type.map_or(1.0, |card| card.minting_power()),
            offer_transaction_hash: transaction_hash,
            offer_transaction_status: TransactionStatus::InProgress,
            start_date,
            expiration_date: expiration_date_for(terms.expiration_days, start_date),
            enabled: true,
            acquired: false,
            parent_id: None,
            update_id: None,
            delete_id: None,
            acquisition_ids: Vec::new(),
            last_checked_block: 0,
            created_date: now,
            modified_date: now,
        };
        let offer = self.persist(offer)?;
        self.events.publish(Event::OfferCreated {
            offer_id: offer.id.clone(),
        });
        Ok(offer)
    }

    /// Stages an on-chain update of the canonical offer as a change-log entry.
    /// Only one update or delete may be in flight per offer.
    pub fn request_update(
        &self,
        existing_id: &str,
        terms: OfferTerms,
        transaction_hash: &str,
    ) -> Result<Offer, ServiceError> {
        let mut canonical = self.require_canonical(existing_id)?;
        self.ensure_no_pending_mutation(&canonical)?;
        validate_commercial_terms(&terms)?;
        let transaction_hash = require_transaction_hash(transaction_hash)?;
        self.ensure_transaction_hash_unknown(&transaction_hash)?;

        let mut changelog = changelog_of(&canonical, &transaction_hash);
        apply_terms(&mut changelog, &terms);
        let changelog = self.persist(changelog)?;

        canonical.update_id = Some(changelog.id.clone());
        let canonical = self.persist(canonical)?;
        self.events.publish(Event::OfferUpdated {
            offer_id: canonical.id.clone(),
        });
        Ok(canonical)
    }

    /// Stages an on-chain deletion of the canonical offer. The change-log
    /// entry carries no field changes, it only holds the confirmation slot.
    pub fn request_delete(
        &self,
        existing_id: &str,
        transaction_hash: &str,
    ) -> Result<(), ServiceError> {
        let mut canonical = self.require_canonical(existing_id)?;
        self.ensure_no_pending_mutation(&canonical)?;
        let transaction_hash = require_transaction_hash(transaction_hash)?;
        self.ensure_transaction_hash_unknown(&transaction_hash)?;

        let changelog = self.persist(changelog_of(&canonical, &transaction_hash))?;
        canonical.delete_id = Some(changelog.id.clone());
        let canonical = self.persist(canonical)?;
        self.events.publish(Event::OfferDeleted {
            offer_id: canonical.id,
        });
        Ok(())
    }

    /// Records a pending acquisition of the offer, keyed by the acquisition
    /// transaction hash. Re-adding a hash already recorded on the offer fails
    /// with `AlreadyExists`, which callers treat as a duplicate event
    /// delivery and ignore.
    pub fn request_acquisition(
        &self,
        existing_id: &str,
        transaction_hash: &str,
        lease_end_date: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let mut canonical = self.require_canonical(existing_id)?;
        let transaction_hash = require_transaction_hash(transaction_hash)?;
        for acquisition_id in &canonical.acquisition_ids {
            if let Some(entry) = self.store.get(acquisition_id)? {
                if entry.offer_transaction_hash == transaction_hash {
                    return Err(ServiceError::AlreadyExists(format!(
                        "acquisition with transaction hash {transaction_hash}"
                    )));
                }
            }
        }
        if canonical.start_date > lease_end_date {
            debug!(
                offer = %canonical.id,
                "offer starts after the acquired lease ends, left untouched"
            );
            return Ok(());
        }

        let changelog = self.persist(changelog_of(&canonical, &transaction_hash))?;
        canonical.acquisition_ids.push(changelog.id.clone());
        let canonical = self.persist(canonical)?;
        self.events.publish(Event::OfferAcquisitionInProgress {
            offer_id: canonical.id,
        });
        Ok(())
    }

    /// Marks every ongoing offer of the deed as acquisition-in-progress, all
    /// keyed by the one acquisition transaction. Duplicate deliveries are
    /// absorbed per offer.
    pub fn mark_acquisition_in_progress(
        &self,
        nft_id: i64,
        transaction_hash: &str,
        lease_end_date: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        debug!(nft_id, "marking deed offers as acquisition in progress");
        for offer in self.store.find_by_nft_id(nft_id)? {
            if !is_ongoing(&offer) {
                continue;
            }
            match self.request_acquisition(&offer.id, transaction_hash, lease_end_date) {
                Ok(()) => {}
                Err(ServiceError::AlreadyExists(_)) => {}
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }

    /// Commits or rolls back one pending change once the poller has settled
    /// its transaction. Safe to call again for an already settled record.
    pub fn commit_pending_change(
        &self,
        record_id: &str,
        outcome: OfferOutcome,
    ) -> Result<(), ServiceError> {
        let record = self
            .store
            .get(record_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("offer {record_id}")))?;
        match outcome {
            OfferOutcome::Failed => {
                if self.is_settled(&record) {
                    return Ok(());
                }
                self.fail_pending(record)
            }
            OfferOutcome::Confirmed { kind, state } => match kind {
                OfferEventKind::Created => {
                    if self.is_settled(&record) {
                        return Ok(());
                    }
                    self.confirm_creation(record, state)
                }
                OfferEventKind::Updated => self.confirm_update(record, state),
                OfferEventKind::Deleted => self.confirm_deletion(record, state),
                OfferEventKind::Acquired => self.confirm_acquired(record, state),
            },
        }
    }

    /// Disables (never deletes) every enabled canonical offer the previous
    /// owner still has on the deed. Used when the deed NFT changes hands.
    pub fn cancel_offers_for_owner(
        &self,
        owner_address: &str,
        nft_id: i64,
    ) -> Result<(), ServiceError> {
        let owner = normalize_address(owner_address);
        debug!(nft_id, owner = %owner, "cancelling offers after deed ownership change");
        for offer in self.store.find_by_nft_id(nft_id)? {
            if offer.is_changelog() || !offer.enabled || offer.owner != owner {
                continue;
            }
            self.cancel_offer(offer)?;
        }
        Ok(())
    }

    pub fn get_offer(&self, id: &str) -> Result<Offer, ServiceError> {
        self.store
            .get(id)?
            .ok_or_else(|| ServiceError::NotFound(format!("offer {id}")))
    }

    /// Rows with a transaction awaiting confirmation, canonical creations and
    /// change-log entries alike, for the poller to sweep.
    pub fn get_pending_transactions(&self) -> Result<Vec<Offer>, ServiceError> {
        Ok(self.store.find_by_status(TransactionStatus::InProgress)?)
    }

    pub fn find_offers(&self, filter: &OfferFilter) -> Result<Vec<Offer>, ServiceError> {
        let offers = if let Some(nft_id) = filter.nft_id {
            self.store.find_by_nft_id(nft_id)?
        } else if let Some(owner) = &filter.owner {
            self.store.find_by_owner(&normalize_address(owner))?
        } else {
            return Err(ServiceError::Validation(
                "offer filter needs an nft id or an owner".into(),
            ));
        };
        let viewer = filter.current_address.as_deref().map(normalize_address);
        Ok(offers
            .into_iter()
            .filter(|offer| !offer.is_changelog() && !offer.acquired)
            .filter(|offer| !filter.exclude_disabled || offer.enabled)
            .filter(|offer| {
                offer.view_addresses.iter().any(|a| a == EVERYONE)
                    || viewer
                        .as_ref()
                        .is_some_and(|v| offer.view_addresses.contains(v))
            })
            .collect())
    }

    fn confirm_creation(
        &self,
        mut record: Offer,
        state: OfferEventState,
    ) -> Result<(), ServiceError> {
        if record.is_changelog() {
            warn!(offer = %record.id, "creation event decoded for a change-log entry, ignoring");
            return Ok(());
        }
        if state.offer_id <= 0 {
            warn!(offer = %record.id, "mined creation carries no on-chain offer id, failing it");
            return self.fail_pending(record);
        }
        if state.nft_id > 0 && record.nft_id != state.nft_id {
            warn!(
                offer = %record.id,
                expected = record.nft_id,
                decoded = state.nft_id,
                "creation transaction targets another deed, adopting decoded state"
            );
        }
        if let Some(existing) = self.store.find_canonical_by_offer_id(state.offer_id)? {
            if existing.id != record.id {
                warn!(
                    offer = %record.id,
                    on_chain_id = state.offer_id,
                    "on-chain offer id already indexed, failing duplicate creation"
                );
                return self.fail_pending(record);
            }
        }
        record.offer_id = state.offer_id;
        record.offer_transaction_status = TransactionStatus::Validated;
        record.enabled = true;
        record.last_checked_block = state.block_number.max(record.last_checked_block);
        let record = self.persist(record)?;
        self.events.publish(Event::OfferCreatedConfirmed {
            offer_id: record.id,
        });
        Ok(())
    }

    fn confirm_update(&self, record: Offer, state: OfferEventState) -> Result<(), ServiceError> {
        let Some((mut canonical, changelog)) =
            self.resolve_changelog(record, PendingMarker::Update)?
        else {
            return Ok(());
        };
        if self.is_settled(&changelog) {
            return Ok(());
        }
        let stale = state.block_number > 0 && canonical.last_checked_block >= state.block_number;
        if stale {
            debug!(
                offer = %canonical.id,
                changelog = %changelog.id,
                "change-log entry already applied in an earlier block, dropping it"
            );
        } else {
            apply_changelog_fields(&mut canonical, &changelog);
            canonical.offer_transaction_status = TransactionStatus::Validated;
            canonical.last_checked_block = state.block_number.max(canonical.last_checked_block);
        }
        clear_marker(&mut canonical, &changelog.id);
        let canonical = self.persist(canonical)?;
        // canonical saved first so the marker never outlives the entry
        self.store.delete(&changelog.id)?;
        self.events.publish(Event::OfferUpdatedConfirmed {
            offer_id: canonical.id,
        });
        Ok(())
    }

    fn confirm_deletion(&self, record: Offer, state: OfferEventState) -> Result<(), ServiceError> {
        let Some((mut canonical, changelog)) =
            self.resolve_changelog(record, PendingMarker::Delete)?
        else {
            return Ok(());
        };
        if self.is_settled(&changelog) {
            return Ok(());
        }
        canonical.enabled = false;
        canonical.offer_transaction_status = TransactionStatus::Validated;
        canonical.last_checked_block = state.block_number.max(canonical.last_checked_block);
        clear_marker(&mut canonical, &changelog.id);
        let canonical = self.persist(canonical)?;
        self.store.delete(&changelog.id)?;
        self.events.publish(Event::OfferDeletedConfirmed {
            offer_id: canonical.id,
        });
        Ok(())
    }

    fn confirm_acquired(&self, record: Offer, state: OfferEventState) -> Result<(), ServiceError> {
        if record.is_changelog() {
            let Some((mut canonical, changelog)) =
                self.resolve_changelog(record, PendingMarker::Update)?
            else {
                return Ok(());
            };
            if self.is_settled(&changelog) {
                return Ok(());
            }
            canonical.acquired = true;
            canonical.enabled = false;
            canonical.last_checked_block = state.block_number.max(canonical.last_checked_block);
            clear_marker(&mut canonical, &changelog.id);
            let canonical = self.persist(canonical)?;
            self.store.delete(&changelog.id)?;
            self.events.publish(Event::OfferAcquisitionConfirmed {
                offer_id: canonical.id,
            });
            Ok(())
        } else {
            let mut canonical = record;
            canonical.acquired = true;
            canonical.enabled = false;
            canonical.offer_transaction_status = TransactionStatus::Validated;
            canonical.last_checked_block = state.block_number.max(canonical.last_checked_block);
            let entries = std::mem::take(&mut canonical.acquisition_ids);
            let canonical = self.persist(canonical)?;
            for entry_id in entries {
                self.store.delete(&entry_id)?;
            }
            self.events.publish(Event::OfferAcquisitionConfirmed {
                offer_id: canonical.id,
            });
            Ok(())
        }
    }

    /// Rolls one pending change back. A failed mutation keeps the canonical
    /// row healthy: only the change-log entry moves to the terminal `Error`
    /// status. A failed creation disables the optimistic canonical row
    /// itself but keeps it queryable.
    fn fail_pending(&self, mut record: Offer) -> Result<(), ServiceError> {
        if let Some(parent_id) = record.parent_id.clone() {
            if let Some(mut parent) = self.store.get(&parent_id)? {
                clear_marker(&mut parent, &record.id);
                self.persist(parent)?;
            } else {
                warn!(offer = %record.id, "failed change-log entry has no parent");
            }
            record.offer_transaction_status = TransactionStatus::Error;
            self.persist(record)?;
        } else {
            warn!(
                offer = %record.id,
                tx = %record.offer_transaction_hash,
                "offer transaction failed, disabling optimistic record"
            );
            record.offer_transaction_status = TransactionStatus::Error;
            record.enabled = false;
            self.persist(record)?;
        }
        Ok(())
    }

    fn cancel_offer(&self, mut offer: Offer) -> Result<(), ServiceError> {
        offer.enabled = false;
        offer.update_id = None;
        offer.delete_id = None;
        offer.acquisition_ids.clear();
        let offer = self.persist(offer)?;
        self.store.delete_by_parent_id(&offer.id)?;
        self.events.publish(Event::OfferCanceled { offer_id: offer.id });
        Ok(())
    }

    /// Resolves the (canonical, change-log) pair for a commit, whichever of
    /// the two ids the caller handed in. Orphan change-log entries are
    /// removed on sight.
    fn resolve_changelog(
        &self,
        record: Offer,
        marker: PendingMarker,
    ) -> Result<Option<(Offer, Offer)>, ServiceError> {
        if let Some(parent_id) = record.parent_id.clone() {
            match self.store.get(&parent_id)? {
                Some(parent) => Ok(Some((parent, record))),
                None => {
                    warn!(offer = %record.id, "orphan change-log entry, deleting");
                    self.store.delete(&record.id)?;
                    Ok(None)
                }
            }
        } else {
            let changelog_id = match marker {
                PendingMarker::Update => record.update_id.clone(),
                PendingMarker::Delete => record.delete_id.clone(),
            }
            .ok_or_else(|| {
                ServiceError::NotFound(format!("pending change-log entry for offer {}", record.id))
            })?;
            let changelog = self.store.get(&changelog_id)?.ok_or_else(|| {
                ServiceError::NotFound(format!("change-log entry {changelog_id}"))
            })?;
            Ok(Some((record, changelog)))
        }
    }

    /// A record whose transaction already reached a terminal status must not
    /// be committed again; reprocessing is a no-op.
    fn is_settled(&self, record: &Offer) -> bool {
        match record.offer_transaction_status {
            TransactionStatus::InProgress => false,
            TransactionStatus::Validated | TransactionStatus::Error => {
                debug!(offer = %record.id, status = record.offer_transaction_status.as_str(), "transaction already settled");
                true
            }
        }
    }

    fn ensure_no_pending_mutation(&self, canonical: &Offer) -> Result<(), ServiceError> {
        if canonical.update_id.is_some() || canonical.delete_id.is_some() {
            return Err(ServiceError::Conflict(format!(
                "offer {} already has a mutation awaiting confirmation",
                canonical.id
            )));
        }
        Ok(())
    }

    fn ensure_transaction_hash_unknown(&self, transaction_hash: &str) -> Result<(), ServiceError> {
        if self
            .store
            .find_by_transaction_hash(transaction_hash)?
            .is_some()
        {
            return Err(ServiceError::AlreadyExists(format!(
                "offer with transaction hash {transaction_hash}"
            )));
        }
        Ok(())
    }

    fn require_canonical(&self, id: &str) -> Result<Offer, ServiceError> {
        let offer = self
            .store
            .get(id)?
            .ok_or_else(|| ServiceError::NotFound(format!("offer {id}")))?;
        if offer.is_changelog() {
            return Err(ServiceError::NotFound(format!("canonical offer {id}")));
        }
        if !offer.enabled {
            return Err(ServiceError::NotFound(format!("enabled offer {id}")));
        }
        Ok(offer)
    }

    /// Derives visibility and stamps the modification date before every
    /// write. Disabled, acquired and change-log rows are invisible; a
    /// validated on-chain offer is public; an optimistic row is visible to
    /// its owner only.
    fn persist(&self, mut offer: Offer) -> Result<Offer, ServiceError> {
        if offer.is_changelog() || offer.acquired || !offer.enabled {
            offer.view_addresses = Vec::new();
        } else if offer.offer_id != 0
            && offer.offer_transaction_status == TransactionStatus::Validated
        {
            offer.view_addresses = vec![EVERYONE.to_string()];
        } else {
            offer.view_addresses = vec![offer.owner.clone()];
        }
        offer.modified_date = Utc::now();
        self.store.save(&offer)?;
        Ok(offer)
    }
}

fn is_ongoing(offer: &Offer) -> bool {
    !offer.is_changelog()
        && offer.enabled
        && !offer.acquired
        && offer.offer_transaction_status != TransactionStatus::Error
}

fn changelog_of(parent: &Offer, transaction_hash: &str) -> Offer {
    let now = Utc::now();
    Offer {
        id: Uuid::new_v4().to_string(),
        parent_id: Some(parent.id.clone()),
        view_addresses: Vec::new(),
        acquisition_ids: Vec::new(),
        update_id: None,
        delete_id: None,
        offer_transaction_hash: transaction_hash.to_string(),
        offer_transaction_status: TransactionStatus::InProgress,
        created_date: now,
        modified_date: now,
        ..parent.clone()
    }
}

fn apply_terms(offer: &mut Offer, terms: &OfferTerms) {
    offer.host_address = terms.host_address.as_deref().map(normalize_address);
    offer.description = terms.description.clone();
    offer.amount = terms.amount;
    offer.all_duration_amount = terms.all_duration_amount;
    offer.duration_months = terms.duration_months;
    offer.notice_period_months = terms.notice_period_months;
    offer.expiration_days = terms.expiration_days;
    if let Some(periodicity) = terms.payment_periodicity {
        offer.payment_periodicity = periodicity;
    }
    offer.owner_minting_percentage = terms.owner_minting_percentage;
    if let Some(start_date) = terms.start_date {
        offer.start_date = start_date;
    }
    offer.expiration_date = expiration_date_for(offer.expiration_days, offer.start_date);
}

/// Copies the confirmed change-log entry's mutable fields back onto the
/// canonical row.
fn apply_changelog_fields(canonical: &mut Offer, changelog: &Offer) {
    canonical.host_address = changelog.host_address.clone();
    canonical.description = changelog.description.clone();
    canonical.amount = changelog.amount;
    canonical.all_duration_amount = changelog.all_duration_amount;
    canonical.duration_months = changelog.duration_months;
    canonical.notice_period_months = changelog.notice_period_months;
    canonical.expiration_days = changelog.expiration_days;
    canonical.payment_periodicity = changelog.payment_periodicity;
    canonical.owner_minting_percentage = changelog.owner_minting_percentage;
    canonical.start_date = changelog.start_date;
    canonical.expiration_date = changelog.expiration_date;
}

fn clear_marker(canonical: &mut Offer, changelog_id: &str) {
    if canonical.update_id.as_deref() == Some(changelog_id) {
        canonical.update_id = None;
    }
    if canonical.delete_id.as_deref() == Some(changelog_id) {
        canonical.delete_id = None;
    }
    canonical.acquisition_ids.retain(|id| id != changelog_id);
}

fn expiration_date_for(expiration_days: i32, start_date: DateTime<Utc>) -> chrono::DateTime<Utc> {
    if expiration_days > 0 {
        start_date + Duration::days(i64::from(expiration_days))
    } else {
        open_end_date()
    }
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

fn validate_identity(terms: &OfferTerms) -> Result<(), ServiceError> {
    if terms.nft_id <= 0 {
        return Err(ServiceError::Validation("deed nft id is mandatory".into()));
    }
    if terms.owner.trim().is_empty() {
        return Err(ServiceError::Validation(
            "owner address is mandatory".into(),
        ));
    }
    Ok(())
}

fn validate_commercial_terms(terms: &OfferTerms) -> Result<(), ServiceError> {
    if terms.amount <= 0.0 {
        return Err(ServiceError::Validation(
            "rent amount must be positive".into(),
        ));
    }
    if terms.duration_months <= 0 {
        return Err(ServiceError::Validation(
            "rental duration must be positive".into(),
        ));
    }
    if terms.notice_period_months < 0 || terms.expiration_days < 0 {
        return Err(ServiceError::Validation(
            "notice period and expiration cannot be negative".into(),
        ));
    }
    if !(0..=100).contains(&terms.owner_minting_percentage) {
        return Err(ServiceError::Validation(
            "owner minting percentage must be between 0 and 100".into(),
        ));
    }
    Ok(())
}
