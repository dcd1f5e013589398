//! Postgres implementation of the entity store contract.
//!
//! A connection is established per operation from the configured URL; every
//! write is an upsert on the primary key, which keeps each mutation a
//! single-document atomic operation.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::PgConnection;

use crate::error::StoreError;
use crate::models::{
    DeedCard, DeedCity, HubReport, HubReportStatusType, Lease, Offer, PaymentPeriodicity,
    TransactionStatus, UemReward,
};
use crate::schema::{hub_reports, leases, offers, uem_rewards};

use super::{LeaseStore, OfferStore, ReportStore, RewardStore};

pub struct PgStore {
    database_url: String,
}

impl PgStore {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    fn conn(&self) -> Result<PgConnection, StoreError> {
        Ok(PgConnection::establish(&self.database_url)?)
    }
}

#[derive(Debug, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = offers)]
#[diesel(treat_none_as_null = true)]
struct OfferRow {
    id: String,
    offer_id: i64,
    nft_id: i64,
    city: Option<String>,
    card_type: Option<String>,
    owner: String,
    host_address: Option<String>,
    description: Option<String>,
    view_addresses: Vec<String>,
    amount: f64,
    all_duration_amount: f64,
    duration_months: i32,
    notice_period_months: i32,
    expiration_days: i32,
    payment_periodicity: String,
    owner_minting_percentage: i32,
    minting_power: f64,
    offer_transaction_hash: String,
    offer_transaction_status: String,
    start_date: DateTime<Utc>,
    expiration_date: DateTime<Utc>,
    enabled: bool,
    acquired: bool,
    parent_id: Option<String>,
    update_id: Option<String>,
    delete_id: Option<String>,
    acquisition_ids: Vec<String>,
    last_checked_block: i64,
    created_date: DateTime<Utc>,
    modified_date: DateTime<Utc>,
}

#[derive(Debug, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = leases)]
#[diesel(treat_none_as_null = true)]
struct LeaseRow {
    id: i64,
    nft_id: i64,
    city: Option<String>,
    card_type: Option<String>,
    months: i32,
    paid_months: i32,
    month_payment_in_progress: i32,
    notice_period_months: i32,
    owner: String,
    manager: String,
    manager_email: Option<String>,
    view_addresses: Vec<String>,
    payment_periodicity: String,
    amount: f64,
    all_duration_amount: f64,
    owner_minting_percentage: i32,
    minting_power: f64,
    pending_transactions: Vec<String>,
    transaction_status: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    notice_date: Option<DateTime<Utc>>,
    paid_rents_date: Option<DateTime<Utc>>,
    created_date: DateTime<Utc>,
    confirmed: bool,
    enabled: bool,
    ending_lease: bool,
    ending_lease_address: Option<String>,
    last_checked_block: i64,
}

#[derive(Debug, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = hub_reports)]
#[diesel(treat_none_as_null = true)]
struct HubReportRow {
    hash: String,
    nft_id: i64,
    hub_address: String,
    sent_date: DateTime<Utc>,
    achievements_count: i64,
    hub_reward_amount: f64,
    engagement_rate: f64,
    owner_address: Option<String>,
    deed_manager_address: Option<String>,
    owner_minting_percentage: Option<i32>,
    status: String,
    error: Option<String>,
    reward_payment: Option<f64>,
}

#[derive(Debug, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = uem_rewards)]
#[diesel(treat_none_as_null = true)]
struct UemRewardRow {
    id: String,
    hash: Option<String>,
    period_type: String,
    from_date: DateTime<Utc>,
    to_date: DateTime<Utc>,
    hub_addresses: Vec<String>,
    report_hashes: Vec<String>,
    hub_rewards_amount: f64,
    hub_achievements_count: i64,
    global_engagement_rate: f64,
    created_date: DateTime<Utc>,
}

fn parse_transaction_status(value: &str) -> Result<TransactionStatus, StoreError> {
    TransactionStatus::parse(value)
        .ok_or_else(|| StoreError::Corrupted(format!("unknown transaction status `{value}`")))
}

fn parse_periodicity(value: &str) -> Result<PaymentPeriodicity, StoreError> {
    PaymentPeriodicity::parse(value)
        .ok_or_else(|| StoreError::Corrupted(format!("unknown payment periodicity `{value}`")))
}

fn parse_city(value: Option<String>) -> Result<Option<DeedCity>, StoreError> {
    value
        .map(|v| {
            DeedCity::parse(&v).ok_or_else(|| StoreError::Corrupted(format!("unknown city `{v}`")))
        })
        .transpose()
}

fn parse_card(value: Option<String>) -> Result<Option<DeedCard>, StoreError> {
    value
        .map(|v| {
            DeedCard::parse(&v)
                .ok_or_else(|| StoreError::Corrupted(format!("unknown card type `{v}`")))
        })
        .transpose()
}

fn parse_report_status(value: &str) -> Result<HubReportStatusType, StoreError> {
    HubReportStatusType::parse(value)
        .ok_or_else(|| StoreError::Corrupted(format!("unknown report status `{value}`")))
}

impl TryFrom<OfferRow> for Offer {
    type Error = StoreError;

    fn try_from(row: OfferRow) -> Result<Self, StoreError> {
        Ok(Offer {
            id: row.id,
            offer_id: row.offer_id,
            nft_id: row.nft_id,
            city: parse_city(row.city)?,
            card_type: parse_card(row.card_type)?,
            owner: row.owner,
            host_address: row.host_address,
            description: row.description,
            view_addresses: row.view_addresses,
            amount: row.amount,
            all_duration_amount: row.all_duration_amount,
            duration_months: row.duration_months,
            notice_period_months: row.notice_period_months,
            expiration_days: row.expiration_days,
            payment_periodicity: parse_periodicity(&row.payment_periodicity)?,
            owner_minting_percentage: row.owner_minting_percentage,
            minting_power: row.minting_power,
            offer_transaction_hash: row.offer_transaction_hash,
            offer_transaction_status: parse_transaction_status(&row.offer_transaction_status)?,
            start_date: row.start_date,
            expiration_date: row.expiration_date,
            enabled: row.enabled,
            acquired: row.acquired,
            parent_id: row.parent_id,
            update_id: row.update_id,
            delete_id: row.delete_id,
            acquisition_ids: row.acquisition_ids,
            last_checked_block: row.last_checked_block,
            created_date: row.created_date,
            modified_date: row.modified_date,
        })
    }
}

impl From<&Offer> for OfferRow {
    fn from(offer: &Offer) -> Self {
        OfferRow {
            id: offer.id.clone(),
            offer_id: offer.offer_id,
            nft_id: offer.nft_id,
            city: offer.city.map(|c| c.as_str().to_string()),
            card_type: offer.card_type.map(|c| c.as_str().to_string()),
            owner: offer.owner.clone(),
            host_address: offer.host_address.clone(),
            description: offer.description.clone(),
            view_addresses: offer.view_addresses.clone(),
            amount: offer.amount,
            all_duration_amount: offer.all_duration_amount,
            duration_months: offer.duration_months,
            notice_period_months: offer.notice_period_months,
            expiration_days: offer.expiration_days,
            payment_periodicity: offer.payment_periodicity.as_str().to_string(),
            owner_minting_percentage: offer.owner_minting_percentage,
            minting_power: offer.minting_power,
            offer_transaction_hash: offer.offer_transaction_hash.clone(),
            offer_transaction_status: offer.offer_transaction_status.as_str().to_string(),
            start_date: offer.start_date,
            expiration_date: offer.expiration_date,
            enabled: offer.enabled,
            acquired: offer.acquired,
            parent_id: offer.parent_id.clone(),
            update_id: offer.update_id.clone(),
            delete_id: offer.delete_id.clone(),
            acquisition_ids: offer.acquisition_ids.clone(),
            last_checked_block: offer.last_checked_block,
            created_date: offer.created_date,
            modified_date: offer.modified_date,
        }
    }
}

impl TryFrom<LeaseRow> for Lease {
    type Error = StoreError;

    fn try_from(row: LeaseRow) -> Result<Self, StoreError> {
        Ok(Lease {
            id: row.id,
            nft_id: row.nft_id,
            city: parse_city(row.city)?,
            card_type: parse_card(row.card_type)?,
            months: row.months,
            paid_months: row.paid_months,
            month_payment_in_progress: row.month_payment_in_progress,
            notice_period_months: row.notice_period_months,
            owner: row.owner,
            manager: row.manager,
            manager_email: row.manager_email,
            view_addresses: row.view_addresses,
            payment_periodicity: parse_periodicity(&row.payment_periodicity)?,
            amount: row.amount,
            all_duration_amount: row.all_duration_amount,
            owner_minting_percentage: row.owner_minting_percentage,
            minting_power: row.minting_power,
            pending_transactions: row.pending_transactions,
            transaction_status: parse_transaction_status(&row.transaction_status)?,
            start_date: row.start_date,
            end_date: row.end_date,
            notice_date: row.notice_date,
            paid_rents_date: row.paid_rents_date,
            created_date: row.created_date,
            confirmed: row.confirmed,
            enabled: row.enabled,
            ending_lease: row.ending_lease,
            ending_lease_address: row.ending_lease_address,
            last_checked_block: row.last_checked_block,
        })
    }
}

impl From<&Lease> for LeaseRow {
    fn from(lease: &Lease) -> Self {
        LeaseRow {
            id: lease.id,
            nft_id: lease.nft_id,
            city: lease.city.map(|c| c.as_str().to_string()),
            card_type: lease.card_type.map(|c| c.as_str().to_string()),
            months: lease.months,
            paid_months: lease.paid_months,
            month_payment_in_progress: lease.month_payment_in_progress,
            notice_period_months: lease.notice_period_months,
            owner: lease.owner.clone(),
            manager: lease.manager.clone(),
            manager_email: lease.manager_email.clone(),
            view_addresses: lease.view_addresses.clone(),
            payment_periodicity: lease.payment_periodicity.as_str().to_string(),
            amount: lease.amount,
            all_duration_amount: lease.all_duration_amount,
            owner_minting_percentage: lease.owner_minting_percentage,
            minting_power: lease.minting_power,
            pending_transactions: lease.pending_transactions.clone(),
            transaction_status: lease.transaction_status.as_str().to_string(),
            start_date: lease.start_date,
            end_date: lease.end_date,
            notice_date: lease.notice_date,
            paid_rents_date: lease.paid_rents_date,
            created_date: lease.created_date,
            confirmed: lease.confirmed,
            enabled: lease.enabled,
            ending_lease: lease.ending_lease,
            ending_lease_address: lease.ending_lease_address.clone(),
            last_checked_block: lease.last_checked_block,
        }
    }
}

impl TryFrom<HubReportRow> for HubReport {
    type Error = StoreError;

    fn try_from(row: HubReportRow) -> Result<Self, StoreError> {
        Ok(HubReport {
            hash: row.hash,
            nft_id: row.nft_id,
            hub_address: row.hub_address,
            sent_date: row.sent_date,
            achievements_count: row.achievements_count,
            hub_reward_amount: row.hub_reward_amount,
            engagement_rate: row.engagement_rate,
            owner_address: row.owner_address,
            deed_manager_address: row.deed_manager_address,
            owner_minting_percentage: row.owner_minting_percentage,
            status: parse_report_status(&row.status)?,
            error: row.error,
            reward_payment: row.reward_payment,
        })
    }
}

impl From<&HubReport> for HubReportRow {
    fn from(report: &HubReport) -> Self {
        HubReportRow {
            hash: report.hash.clone(),
            nft_id: report.nft_id,
            hub_address: report.hub_address.clone(),
            sent_date: report.sent_date,
            achievements_count: report.achievements_count,
            hub_reward_amount: report.hub_reward_amount,
            engagement_rate: report.engagement_rate,
            owner_address: report.owner_address.clone(),
            deed_manager_address: report.deed_manager_address.clone(),
            owner_minting_percentage: report.owner_minting_percentage,
            status: report.status.as_str().to_string(),
            error: report.error.clone(),
            reward_payment: report.reward_payment,
        }
    }
}

impl From<UemRewardRow> for UemReward {
    fn from(row: UemRewardRow) -> Self {
        UemReward {
            id: row.id,
            hash: row.hash,
            period_type: row.period_type,
            from_date: row.from_date,
            to_date: row.to_date,
            hub_addresses: row.hub_addresses,
            report_hashes: row.report_hashes,
            hub_rewards_amount: row.hub_rewards_amount,
            hub_achievements_count: row.hub_achievements_count,
            global_engagement_rate: row.global_engagement_rate,
            created_date: row.created_date,
        }
    }
}

impl From<&UemReward> for UemRewardRow {
    fn from(reward: &UemReward) -> Self {
        UemRewardRow {
            id: reward.id.clone(),
            hash: reward.hash.clone(),
            period_type: reward.period_type.clone(),
            from_date: reward.from_date,
            to_date: reward.to_date,
            hub_addresses: reward.hub_addresses.clone(),
            report_hashes: reward.report_hashes.clone(),
            hub_rewards_amount: reward.hub_rewards_amount,
            hub_achievements_count: reward.hub_achievements_count,
            global_engagement_rate: reward.global_engagement_rate,
            created_date: reward.created_date,
        }
    }
}

fn collect_offers(rows: Vec<OfferRow>) -> Result<Vec<Offer>, StoreError> {
    rows.into_iter().map(Offer::try_from).collect()
}

fn collect_leases(rows: Vec<LeaseRow>) -> Result<Vec<Lease>, StoreError> {
    rows.into_iter().map(Lease::try_from).collect()
}

impl OfferStore for PgStore {
    fn get(&self, id: &str) -> Result<Option<Offer>, StoreError> {
        let mut conn = self.conn()?;
        offers::table
            .find(id)
            .first::<OfferRow>(&mut conn)
            .optional()?
            .map(Offer::try_from)
            .transpose()
    }

    fn save(&self, offer: &Offer) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let row = OfferRow::from(offer);
        diesel::insert_into(offers::table)
            .values(&row)
            .on_conflict(offers::id)
            .do_update()
            .set(&row)
            .execute(&mut conn)?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        diesel::delete(offers::table.find(id)).execute(&mut conn)?;
        Ok(())
    }

    fn find_by_status(&self, status: TransactionStatus) -> Result<Vec<Offer>, StoreError> {
        let mut conn = self.conn()?;
        let rows = offers::table
            .filter(offers::offer_transaction_status.eq(status.as_str()))
            .order(offers::created_date.asc())
            .load::<OfferRow>(&mut conn)?;
        collect_offers(rows)
    }

    fn find_by_nft_id(&self, nft_id: i64) -> Result<Vec<Offer>, StoreError> {
        let mut conn = self.conn()?;
        let rows = offers::table
            .filter(offers::nft_id.eq(nft_id))
            .order(offers::created_date.asc())
            .load::<OfferRow>(&mut conn)?;
        collect_offers(rows)
    }

    fn find_by_owner(&self, owner: &str) -> Result<Vec<Offer>, StoreError> {
        let mut conn = self.conn()?;
        let rows = offers::table
            .filter(offers::owner.eq(owner))
            .order(offers::created_date.asc())
            .load::<OfferRow>(&mut conn)?;
        collect_offers(rows)
    }

    fn find_by_transaction_hash(
        &self,
        transaction_hash: &str,
    ) -> Result<Option<Offer>, StoreError> {
        let mut conn = self.conn()?;
        offers::table
            .filter(offers::offer_transaction_hash.eq(transaction_hash))
            .first::<OfferRow>(&mut conn)
            .optional()?
            .map(Offer::try_from)
            .transpose()
    }

    fn find_canonical_by_offer_id(&self, offer_id: i64) -> Result<Option<Offer>, StoreError> {
        let mut conn = self.conn()?;
        offers::table
            .filter(offers::offer_id.eq(offer_id))
            .filter(offers::parent_id.is_null())
            .first::<OfferRow>(&mut conn)
            .optional()?
            .map(Offer::try_from)
            .transpose()
    }

    fn delete_by_parent_id(&self, parent_id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        diesel::delete(offers::table.filter(offers::parent_id.eq(parent_id)))
            .execute(&mut conn)?;
        Ok(())
    }
}

impl LeaseStore for PgStore {
    fn get(&self, id: i64) -> Result<Option<Lease>, StoreError> {
        let mut conn = self.conn()?;
        leases::table
            .find(id)
            .first::<LeaseRow>(&mut conn)
            .optional()?
            .map(Lease::try_from)
            .transpose()
    }

    fn save(&self, lease: &Lease) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let row = LeaseRow::from(lease);
        diesel::insert_into(leases::table)
            .values(&row)
            .on_conflict(leases::id)
            .do_update()
            .set(&row)
            .execute(&mut conn)?;
        Ok(())
    }

    fn find_pending(&self) -> Result<Vec<Lease>, StoreError> {
        let mut conn = self.conn()?;
        let rows = leases::table
            .filter(leases::pending_transactions.ne(Vec::<String>::new()))
            .order(leases::created_date.asc())
            .load::<LeaseRow>(&mut conn)?;
        collect_leases(rows)
    }

    fn find_by_nft_id(&self, nft_id: i64) -> Result<Vec<Lease>, StoreError> {
        let mut conn = self.conn()?;
        let rows = leases::table
            .filter(leases::nft_id.eq(nft_id))
            .order(leases::created_date.asc())
            .load::<LeaseRow>(&mut conn)?;
        collect_leases(rows)
    }
}

impl ReportStore for PgStore {
    fn get(&self, hash: &str) -> Result<Option<HubReport>, StoreError> {
        let mut conn = self.conn()?;
        hub_reports::table
            .find(hash)
            .first::<HubReportRow>(&mut conn)
            .optional()?
            .map(HubReport::try_from)
            .transpose()
    }

    fn save(&self, report: &HubReport) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let row = HubReportRow::from(report);
        diesel::insert_into(hub_reports::table)
            .values(&row)
            .on_conflict(hub_reports::hash)
            .do_update()
            .set(&row)
            .execute(&mut conn)?;
        Ok(())
    }

    fn find_by_period(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<HubReport>, StoreError> {
        let mut conn = self.conn()?;
        let rows = hub_reports::table
            .filter(hub_reports::sent_date.ge(from))
            .filter(hub_reports::sent_date.lt(to))
            .order(hub_reports::hash.asc())
            .load::<HubReportRow>(&mut conn)?;
        rows.into_iter().map(HubReport::try_from).collect()
    }
}

impl RewardStore for PgStore {
    fn save(&self, reward: &UemReward) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let row = UemRewardRow::from(reward);
        diesel::insert_into(uem_rewards::table)
            .values(&row)
            .on_conflict(uem_rewards::id)
            .do_update()
            .set(&row)
            .execute(&mut conn)?;
        Ok(())
    }

    fn find_by_period(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<UemReward>, StoreError> {
        let mut conn = self.conn()?;
        Ok(uem_rewards::table
            .filter(uem_rewards::from_date.eq(from))
            .filter(uem_rewards::to_date.eq(to))
            .first::<UemRewardRow>(&mut conn)
            .optional()?
            .map(UemReward::from))
    }

    fn find_unsealed(&self) -> Result<Vec<UemReward>, StoreError> {
        let mut conn = self.conn()?;
        let rows = uem_rewards::table
            .filter(uem_rewards::hash.is_null())
            .order(uem_rewards::from_date.asc())
            .load::<UemRewardRow>(&mut conn)?;
        Ok(rows.into_iter().map(UemReward::from).collect())
    }
}
