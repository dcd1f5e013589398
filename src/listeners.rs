//! Event handlers bridging bus notifications into the lifecycle managers.

use std::sync::Arc;

use tracing::{info, warn};

use crate::events::{Event, EventHandler};
use crate::leases::LeaseService;
use crate::offers::OfferService;

/// Reacts to a deed NFT changing hands: the previous owner's offers are
/// cancelled and every active lease is re-pointed at the new owner. Both
/// operations are idempotent, so replayed notifications are harmless.
pub struct OwnershipTransferListener {
    offers: Arc<OfferService>,
    leases: Arc<LeaseService>,
}

impl OwnershipTransferListener {
    pub fn new(offers: Arc<OfferService>, leases: Arc<LeaseService>) -> Self {
        Self { offers, leases }
    }
}

impl EventHandler for OwnershipTransferListener {
    fn on_event(&self, event: &Event) {
        let Event::OwnershipTransferred {
            previous_owner,
            new_owner,
            nft_id,
        } = event
        else {
            return;
        };
        info!(
            nft_id,
            from = %previous_owner,
            to = %new_owner,
            "deed ownership transferred"
        );
        if let Err(error) = self.offers.cancel_offers_for_owner(previous_owner, *nft_id) {
            warn!(nft_id, %error, "could not cancel the previous owner's offers");
        }
        if let Err(error) = self.leases.transfer_ownership(new_owner, *nft_id) {
            warn!(nft_id, %error, "could not re-point lease ownership");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::models::OfferTerms;
    use crate::store::MemoryStore;

    #[test]
    fn ownership_transfer_fans_out_to_both_managers() {
        let store = Arc::new(MemoryStore::new());
        let events = EventBus::new();
        let offers = Arc::new(OfferService::new(store.clone(), events.clone()));
        let leases = Arc::new(LeaseService::new(store, events.clone()));
        events.subscribe(Arc::new(OwnershipTransferListener::new(
            offers.clone(),
            leases.clone(),
        )));

        let offer = offers
            .create_offer(
                OfferTerms {
                    nft_id: 7,
                    owner: "0xA".into(),
                    amount: 100.0,
                    all_duration_amount: 1200.0,
                    duration_months: 12,
                    notice_period_months: 1,
                    expiration_days: 7,
                    owner_minting_percentage: 50,
                    ..OfferTerms::default()
                },
                "0xabc",
            )
            .unwrap();

        events.publish(Event::OwnershipTransferred {
            previous_owner: "0xA".into(),
            new_owner: "0xB".into(),
            nft_id: 7,
        });

        assert!(!offers.get_offer(&offer.id).unwrap().enabled);
    }
}
