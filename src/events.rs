//! Typed in-process event fan-out.
//!
//! Every lifecycle step publishes a tagged event; handlers subscribe once at
//! wiring time and match on the variants they care about. Delivery is
//! at-least-once from the point of view of handlers (external transports may
//! replay), so every handler must be idempotent.

use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub enum Event {
    OfferCreated { offer_id: String },
    OfferUpdated { offer_id: String },
    OfferDeleted { offer_id: String },
    OfferCanceled { offer_id: String },
    OfferAcquisitionInProgress { offer_id: String },
    OfferCreatedConfirmed { offer_id: String },
    OfferUpdatedConfirmed { offer_id: String },
    OfferDeletedConfirmed { offer_id: String },
    OfferAcquisitionConfirmed { offer_id: String },
    LeaseAcquired { lease_id: i64 },
    LeaseAcquisitionConfirmed { lease_id: i64 },
    LeaseRentPaid { lease_id: i64 },
    LeaseRentPaymentConfirmed { lease_id: i64 },
    LeaseEnded { lease_id: i64 },
    LeaseEndConfirmed { lease_id: i64 },
    OwnershipTransferred {
        previous_owner: String,
        new_owner: String,
        nft_id: i64,
    },
    HubReportSaved { hash: String },
    HubReportReceived { hash: String },
    UemConfigurationSaved,
    HubReportRewardComputed { hash: String },
}

pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &Event);
}

#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<Mutex<Vec<Arc<dyn EventHandler>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) {
        self.handlers
            .lock()
            .expect("event handler registry poisoned")
            .push(handler);
    }

    /// Fans the event out to every registered handler. The registry lock is
    /// released before dispatching so handlers may publish follow-up events.
    pub fn publish(&self, event: Event) {
        let handlers = self
            .handlers
            .lock()
            .expect("event handler registry poisoned")
            .clone();
        for handler in handlers {
            handler.on_event(&event);
        }
    }
}
