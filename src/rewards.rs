//! Reward status engine.
//!
//! Tracks the per-Hub report status state machine and computes the weekly
//! UEM reward aggregate for the period a report belongs to. Everything is
//! event-driven: report submissions and configuration changes arrive on the
//! bus, and every trigger funnels into `compute_reward`, which is idempotent
//! and converges to the same totals however often it re-runs.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::events::{Event, EventBus, EventHandler};
use crate::leases::LeaseService;
use crate::models::{HubReport, HubReportStatusType, UemReward};
use crate::period::RewardPeriod;
use crate::store::{ReportStore, RewardStore};

const PERIOD_TYPE: &str = "WEEK";

pub struct RewardStatusEngine {
    reports: Arc<dyn ReportStore>,
    rewards: Arc<dyn RewardStore>,
    leases: Arc<LeaseService>,
    events: EventBus,
    /// Weekly reward budget split across the period's reports.
    uem_reward_amount: f64,
}

impl RewardStatusEngine {
    pub fn new(
        reports: Arc<dyn ReportStore>,
        rewards: Arc<dyn RewardStore>,
        leases: Arc<LeaseService>,
        events: EventBus,
        uem_reward_amount: f64,
    ) -> Self {
        Self {
            reports,
            rewards,
            leases,
            events,
            uem_reward_amount,
        }
    }

    pub fn get_report(&self, hash: &str) -> Result<HubReport, ServiceError> {
        self.reports
            .get(hash)?
            .ok_or_else(|| ServiceError::NotFound(format!("hub report {hash}")))
    }

    /// Moves a report through the status state machine. Re-asserting the
    /// current status is a no-op; any other illegal transition is a conflict.
    pub fn save_report_status(
        &self,
        hash: &str,
        next: HubReportStatusType,
        error: Option<String>,
    ) -> Result<HubReport, ServiceError> {
        let mut report = self.get_report(hash)?;
        if report.status == next {
            return Ok(report);
        }
        if !report.status.can_transition_to(next) {
            return Err(ServiceError::Conflict(format!(
                "report {hash} cannot move from {} to {}",
                report.status.as_str(),
                next.as_str()
            )));
        }
        report.status = next;
        report.error = error;
        self.reports.save(&report)?;
        Ok(report)
    }

    /// Computes (or refreshes) the reward aggregate of the period containing
    /// `instant`.
    pub fn compute_reward_at(
        &self,
        instant: DateTime<Utc>,
    ) -> Result<Option<UemReward>, ServiceError> {
        self.compute_reward(RewardPeriod::containing(instant))
    }

    /// Recomputes the reward of a period from its reports. A reward already
    /// sealed by a content hash is returned unchanged; recomputing an
    /// unsealed one replaces its aggregates, so repeated calls converge.
    pub fn compute_reward(&self, period: RewardPeriod) -> Result<Option<UemReward>, ServiceError> {
        let existing = self.rewards.find_by_period(period.from, period.to)?;
        if let Some(reward) = &existing {
            if reward.hash.is_some() {
                debug!(reward = %reward.id, "reward already sealed, skipping recomputation");
                return Ok(existing);
            }
        }

        let reports: Vec<HubReport> = self
            .reports
            .find_by_period(period.from, period.to)?
            .into_iter()
            .filter(|report| is_rewardable(report))
            .collect();
        if reports.is_empty() {
            // no reports, no reward for the period
            return Ok(None);
        }

        let mut reward = existing.unwrap_or_else(|| UemReward {
            id: Uuid::new_v4().to_string(),
            hash: None,
            period_type: PERIOD_TYPE.to_string(),
            from_date: period.from,
            to_date: period.to,
            hub_addresses: Vec::new(),
            report_hashes: Vec::new(),
            hub_rewards_amount: 0.0,
            hub_achievements_count: 0,
            global_engagement_rate: 0.0,
            created_date: Utc::now(),
        });
        reward.hub_addresses = reports
            .iter()
            .map(|report| report.hub_address.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        reward.report_hashes = reports
            .iter()
            .map(|report| report.hash.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        reward.hub_rewards_amount = reports.iter().map(|report| report.hub_reward_amount).sum();
        reward.hub_achievements_count = reports
            .iter()
            .map(|report| report.achievements_count)
            .sum();
        reward.global_engagement_rate =
            reports.iter().map(|report| report.engagement_rate).sum();
        self.rewards.save(&reward)?;

        let total_engagement = reward.global_engagement_rate;
        for mut report in reports {
            let payment = if total_engagement > 0.0 {
                self.uem_reward_amount * report.engagement_rate / total_engagement
            } else {
                0.0
            };
            let unchanged = report
                .reward_payment
                .is_some_and(|previous| (previous - payment).abs() < f64::EPSILON);
            if unchanged {
                continue;
            }
            report.reward_payment = Some(payment);
            self.reports.save(&report)?;
            self.events.publish(Event::HubReportRewardComputed {
                hash: report.hash.clone(),
            });
        }
        Ok(Some(reward))
    }

    /// Recomputes every reward not yet sealed, e.g. after the weekly budget
    /// configuration changed.
    pub fn compute_pending_rewards(&self) -> Result<(), ServiceError> {
        for reward in self.rewards.find_unsealed()? {
            self.compute_reward(RewardPeriod {
                from: reward.from_date,
                to: reward.to_date,
            })?;
        }
        Ok(())
    }

    fn on_report_saved(&self, hash: &str) -> Result<(), ServiceError> {
        let report = self.get_report(hash)?;
        self.compute_reward_at(report.sent_date)?;
        Ok(())
    }

    /// A freshly received report gets decorated with the deed's current
    /// confirmed-lease snapshot before the period reward is computed, so the
    /// payout split between owner and manager is frozen at submission time.
    fn on_report_received(&self, hash: &str) -> Result<(), ServiceError> {
        let mut report = self.get_report(hash)?;
        if let Some(lease) = self.leases.get_current_lease(report.nft_id)? {
            report.owner_address = Some(lease.owner.clone());
            report.deed_manager_address = Some(lease.manager.clone());
            report.owner_minting_percentage = Some(lease.owner_minting_percentage);
            self.reports.save(&report)?;
        }
        self.compute_reward_at(report.sent_date)?;
        Ok(())
    }

    fn on_reward_computed(&self, hash: &str) -> Result<(), ServiceError> {
        let report = self.get_report(hash)?;
        if report.status == HubReportStatusType::Sent {
            self.save_report_status(hash, HubReportStatusType::PendingReward, None)?;
        }
        Ok(())
    }
}

impl EventHandler for RewardStatusEngine {
    fn on_event(&self, event: &Event) {
        let outcome = match event {
            Event::HubReportSaved { hash } => self.on_report_saved(hash),
            Event::HubReportReceived { hash } => self.on_report_received(hash),
            Event::UemConfigurationSaved => self.compute_pending_rewards(),
            Event::HubReportRewardComputed { hash } => self.on_reward_computed(hash),
            _ => Ok(()),
        };
        if let Err(error) = outcome {
            warn!(%error, "reward engine event handling failed");
        }
    }
}

fn is_rewardable(report: &HubReport) -> bool {
    matches!(
        report.status,
        HubReportStatusType::Sent
            | HubReportStatusType::PendingReward
            | HubReportStatusType::Rewarded
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn engine() -> (Arc<MemoryStore>, Arc<RewardStatusEngine>, EventBus) {
        let store = Arc::new(MemoryStore::new());
        let events = EventBus::new();
        let leases = Arc::new(LeaseService::new(store.clone(), events.clone()));
        let engine = Arc::new(RewardStatusEngine::new(
            store.clone(),
            store.clone(),
            leases,
            events.clone(),
            5000.0,
        ));
        events.subscribe(engine.clone());
        (store, engine, events)
    }

    fn report(hash: &str, nft_id: i64, sent_date: DateTime<Utc>, engagement: f64) -> HubReport {
        HubReport {
            hash: hash.into(),
            nft_id,
            hub_address: format!("0xhub{nft_id}"),
            sent_date,
            achievements_count: 10,
            hub_reward_amount: 100.0,
            engagement_rate: engagement,
            owner_address: None,
            deed_manager_address: None,
            owner_minting_percentage: None,
            status: HubReportStatusType::Sent,
            error: None,
            reward_payment: None,
        }
    }

    #[test]
    fn status_machine_accepts_only_legal_transitions() {
        let (store, engine, _) = engine();
        let mut fresh = report("0xr1", 7, Utc::now(), 1.0);
        fresh.status = HubReportStatusType::None;
        ReportStore::save(store.as_ref(), &fresh).unwrap();

        let rejected = engine.save_report_status("0xr1", HubReportStatusType::Rewarded, None);
        assert!(matches!(rejected, Err(ServiceError::Conflict(_))));

        engine
            .save_report_status("0xr1", HubReportStatusType::Sent, None)
            .unwrap();
        engine
            .save_report_status("0xr1", HubReportStatusType::PendingReward, None)
            .unwrap();
        let rewarded = engine
            .save_report_status("0xr1", HubReportStatusType::Rewarded, None)
            .unwrap();
        assert_eq!(rewarded.status, HubReportStatusType::Rewarded);

        // re-asserting the current status stays a no-op
        engine
            .save_report_status("0xr1", HubReportStatusType::Rewarded, None)
            .unwrap();
    }

    #[test]
    fn error_sending_keeps_the_error_message() {
        let (store, engine, _) = engine();
        ReportStore::save(store.as_ref(), &report("0xr1", 7, Utc::now(), 1.0)).unwrap();
        let failed = engine
            .save_report_status(
                "0xr1",
                HubReportStatusType::ErrorSending,
                Some("gateway timeout".into()),
            )
            .unwrap();
        assert_eq!(failed.error.as_deref(), Some("gateway timeout"));
    }

    #[test]
    fn compute_reward_aggregates_the_period_reports() {
        let (store, engine, _) = engine();
        let now = Utc::now();
        ReportStore::save(store.as_ref(), &report("0xr1", 7, now, 1.0)).unwrap();
        ReportStore::save(store.as_ref(), &report("0xr2", 8, now, 3.0)).unwrap();
        // rejected reports never count
        let mut rejected = report("0xr3", 9, now, 5.0);
        rejected.status = HubReportStatusType::Rejected;
        ReportStore::save(store.as_ref(), &rejected).unwrap();

        let reward = engine.compute_reward_at(now).unwrap().unwrap();
        assert_eq!(reward.report_hashes.len(), 2);
        assert_eq!(reward.hub_rewards_amount, 200.0);
        assert_eq!(reward.hub_achievements_count, 20);
        assert_eq!(reward.global_engagement_rate, 4.0);

        let first = engine.get_report("0xr1").unwrap();
        let second = engine.get_report("0xr2").unwrap();
        assert_eq!(first.reward_payment, Some(1250.0));
        assert_eq!(second.reward_payment, Some(3750.0));
        // computation moved the reports to pending-reward through the bus
        assert_eq!(first.status, HubReportStatusType::PendingReward);
    }

    #[test]
    fn recomputing_a_period_converges() {
        let (store, engine, _) = engine();
        let now = Utc::now();
        ReportStore::save(store.as_ref(), &report("0xr1", 7, now, 1.0)).unwrap();
        let first = engine.compute_reward_at(now).unwrap().unwrap();
        let second = engine.compute_reward_at(now).unwrap().unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.hub_rewards_amount, second.hub_rewards_amount);
        assert_eq!(
            engine.get_report("0xr1").unwrap().reward_payment,
            Some(5000.0)
        );
    }

    #[test]
    fn sealed_reward_is_never_recomputed() {
        let (store, engine, _) = engine();
        let now = Utc::now();
        ReportStore::save(store.as_ref(), &report("0xr1", 7, now, 1.0)).unwrap();
        let mut reward = engine.compute_reward_at(now).unwrap().unwrap();
        reward.hash = Some("0xsealed".into());
        RewardStore::save(store.as_ref(), &reward).unwrap();

        ReportStore::save(store.as_ref(), &report("0xr2", 8, now, 9.0)).unwrap();
        let unchanged = engine.compute_reward_at(now).unwrap().unwrap();
        assert_eq!(unchanged.report_hashes, vec!["0xr1".to_string()]);
        assert_eq!(unchanged.global_engagement_rate, 1.0);
    }

    #[test]
    fn reports_of_different_weeks_land_in_different_rewards() {
        let (store, engine, _) = engine();
        let now = Utc::now();
        let last_week = now - chrono::Duration::weeks(1);
        ReportStore::save(store.as_ref(), &report("0xr1", 7, now, 1.0)).unwrap();
        ReportStore::save(store.as_ref(), &report("0xr2", 8, last_week, 2.0)).unwrap();

        let current = engine.compute_reward_at(now).unwrap().unwrap();
        let previous = engine.compute_reward_at(last_week).unwrap().unwrap();
        assert_ne!(current.id, previous.id);
        assert_eq!(current.report_hashes, vec!["0xr1".to_string()]);
        assert_eq!(previous.report_hashes, vec!["0xr2".to_string()]);
    }

    #[test]
    fn received_report_is_decorated_with_the_confirmed_lease() {
        use crate::chain::LeaseEventState;
        use crate::models::{Offer, PaymentPeriodicity, TransactionStatus, EVERYONE};

        let (store, engine, events) = engine();
        let now = Utc::now();
        // a confirmed lease on deed 7
        let leases = LeaseService::new(store.clone(), EventBus::new());
        let offer = Offer {
            id: "offer-1".into(),
            offer_id: 42,
            nft_id: 7,
            city: None,
            card_type: None,
            owner: "0xOwner".into(),
            host_address: None,
            description: None,
            view_addresses: vec![EVERYONE.to_string()],
            amount: 100.0,
            all_duration_amount: 1200.0,
            duration_months: 12,
            notice_period_months: 1,
            expiration_days: 7,
            payment_periodicity: PaymentPeriodicity::OneMonth,
            owner_minting_percentage: 40,
            minting_power: 1.0,
            offer_transaction_hash: "0xoffer".into(),
            offer_transaction_status: TransactionStatus::Validated,
            start_date: now,
            expiration_date: now + chrono::Duration::days(7),
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
        leases
            .create_from_offer(&offer, "0xmanager", None, Some("0xdef"))
            .unwrap();
        leases
            .confirm_acquisition(
                42,
                "0xdef",
                &LeaseEventState {
                    lease_id: 42,
                    nft_id: 7,
                    tenant: "0xmanager".into(),
                    paid_months: 1,
                    block_number: 10,
                    ..LeaseEventState::default()
                },
            )
            .unwrap();

        ReportStore::save(store.as_ref(), &report("0xr1", 7, now, 1.0)).unwrap();
        events.publish(Event::HubReportReceived {
            hash: "0xr1".into(),
        });

        let decorated = engine.get_report("0xr1").unwrap();
        assert_eq!(decorated.owner_address.as_deref(), Some("0xowner"));
        assert_eq!(decorated.deed_manager_address.as_deref(), Some("0xmanager"));
        assert_eq!(decorated.owner_minting_percentage, Some(40));
        assert!(decorated.reward_payment.is_some());
    }
}
