use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Visibility sentinel: a record carrying this view address is public.
pub const EVERYONE: &str = "ALL";

/// Sentinel instant marking "no end/expiration assigned yet".
pub const OPEN_END_DATE_EPOCH_SECONDS: i64 = 165_241_780_471;

pub fn open_end_date() -> DateTime<Utc> {
    DateTime::from_timestamp(OPEN_END_DATE_EPOCH_SECONDS, 0)
        .expect("open-end sentinel is a valid timestamp")
}

/// Addresses and transaction hashes are compared case-insensitively, so they
/// are stored lower-cased.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    InProgress,
    Validated,
    Error,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::InProgress => "IN_PROGRESS",
            TransactionStatus::Validated => "VALIDATED",
            TransactionStatus::Error => "ERROR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "IN_PROGRESS" => Some(TransactionStatus::InProgress),
            "VALIDATED" => Some(TransactionStatus::Validated),
            "ERROR" => Some(TransactionStatus::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeedCity {
    Tanit,
    Reshef,
    Ashtarte,
    Melqart,
    Eshmun,
    Kushor,
    Hammon,
}

impl DeedCity {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeedCity::Tanit => "TANIT",
            DeedCity::Reshef => "RESHEF",
            DeedCity::Ashtarte => "ASHTARTE",
            DeedCity::Melqart => "MELQART",
            DeedCity::Eshmun => "ESHMUN",
            DeedCity::Kushor => "KUSHOR",
            DeedCity::Hammon => "HAMMON",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "TANIT" => Some(DeedCity::Tanit),
            "RESHEF" => Some(DeedCity::Reshef),
            "ASHTARTE" => Some(DeedCity::Ashtarte),
            "MELQART" => Some(DeedCity::Melqart),
            "ESHMUN" => Some(DeedCity::Eshmun),
            "KUSHOR" => Some(DeedCity::Kushor),
            "HAMMON" => Some(DeedCity::Hammon),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeedCard {
    Common,
    Uncommon,
    Rare,
    Legendary,
}

impl DeedCard {
    /// Minting power multiplier attached to the card tier.
    pub fn minting_power(&self) -> f64 {
        match self {
            DeedCard::Common => 1.0,
            DeedCard::Uncommon => 1.1,
            DeedCard::Rare => 1.3,
            DeedCard::Legendary => 2.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeedCard::Common => "COMMON",
            DeedCard::Uncommon => "UNCOMMON",
            DeedCard::Rare => "RARE",
            DeedCard::Legendary => "LEGENDARY",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "COMMON" => Some(DeedCard::Common),
            "UNCOMMON" => Some(DeedCard::Uncommon),
            "RARE" => Some(DeedCard::Rare),
            "LEGENDARY" => Some(DeedCard::Legendary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentPeriodicity {
    OneMonth,
    OneYear,
}

impl PaymentPeriodicity {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentPeriodicity::OneMonth => "ONE_MONTH",
            PaymentPeriodicity::OneYear => "ONE_YEAR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ONE_MONTH" => Some(PaymentPeriodicity::OneMonth),
            "ONE_YEAR" => Some(PaymentPeriodicity::OneYear),
            _ => None,
        }
    }
}

/// A for-rent listing against a Deed.
///
/// A row with `parent_id == None` is the canonical offer; a row with a parent
/// is a change-log entry recording one pending on-chain mutation (update,
/// delete or acquisition) of its parent. The canonical row points back at its
/// outstanding change-log entries through `update_id`, `delete_id` and
/// `acquisition_ids`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    /// On-chain offer identifier, 0 until the creation transaction is mined.
    pub offer_id: i64,
    pub nft_id: i64,
    pub city: Option<DeedCity>,
    pub card_type: Option<DeedCard>,
    pub owner: String,
    /// Tenant address the offer is restricted to, if any.
    pub host_address: Option<String>,
    pub description: Option<String>,
    pub view_addresses: Vec<String>,
    pub amount: f64,
    pub all_duration_amount: f64,
    pub duration_months: i32,
    pub notice_period_months: i32,
    /// 0 means the offer never expires.
    pub expiration_days: i32,
    pub payment_periodicity: PaymentPeriodicity,
    pub owner_minting_percentage: i32,
    pub minting_power: f64,
    pub offer_transaction_hash: String,
    pub offer_transaction_status: TransactionStatus,
    pub start_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    pub enabled: bool,
    pub acquired: bool,
    pub parent_id: Option<String>,
    pub update_id: Option<String>,
    pub delete_id: Option<String>,
    pub acquisition_ids: Vec<String>,
    pub last_checked_block: i64,
    pub created_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
}

impl Offer {
    pub fn is_changelog(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// Commercial terms provided by the owner when creating or updating an offer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfferTerms {
    pub nft_id: i64,
    pub owner: String,
    pub host_address: Option<String>,
    pub description: Option<String>,
    pub city: Option<DeedCity>,
    pub card_type: Option<DeedCard>,
    pub amount: f64,
    pub all_duration_amount: f64,
    pub duration_months: i32,
    pub notice_period_months: i32,
    pub expiration_days: i32,
    pub payment_periodicity: Option<PaymentPeriodicity>,
    pub owner_minting_percentage: i32,
    pub start_date: Option<DateTime<Utc>>,
}

/// A rental agreement derived from an accepted offer.
///
/// The lease identity is the on-chain lease id, which the renting contract
/// assigns from the accepted offer's on-chain id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lease {
    pub id: i64,
    pub nft_id: i64,
    pub city: Option<DeedCity>,
    pub card_type: Option<DeedCard>,
    pub months: i32,
    pub paid_months: i32,
    pub month_payment_in_progress: i32,
    pub notice_period_months: i32,
    pub owner: String,
    pub manager: String,
    pub manager_email: Option<String>,
    pub view_addresses: Vec<String>,
    pub payment_periodicity: PaymentPeriodicity,
    pub amount: f64,
    pub all_duration_amount: f64,
    pub owner_minting_percentage: i32,
    pub minting_power: f64,
    /// Outstanding transaction hashes, oldest first. A lease can accumulate
    /// several pending operations (acquisition, then a rent payment, then a
    /// notice).
    pub pending_transactions: Vec<String>,
    pub transaction_status: TransactionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub notice_date: Option<DateTime<Utc>>,
    pub paid_rents_date: Option<DateTime<Utc>>,
    pub created_date: DateTime<Utc>,
    /// Set once the acquisition transaction is mined and decoded.
    pub confirmed: bool,
    pub enabled: bool,
    pub ending_lease: bool,
    pub ending_lease_address: Option<String>,
    pub last_checked_block: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HubReportStatusType {
    None,
    Invalid,
    Sent,
    ErrorSending,
    PendingReward,
    Rewarded,
    Rejected,
}

impl HubReportStatusType {
    /// Legal report status transitions. Re-asserting the current status is
    /// allowed so that at-least-once event delivery stays harmless.
    pub fn can_transition_to(self, next: HubReportStatusType) -> bool {
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Self::None, Self::Invalid)
                | (Self::None, Self::Sent)
                | (Self::Sent, Self::PendingReward)
                | (Self::Sent, Self::ErrorSending)
                | (Self::Sent, Self::Rejected)
                | (Self::PendingReward, Self::Rewarded)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HubReportStatusType::None => "NONE",
            HubReportStatusType::Invalid => "INVALID",
            HubReportStatusType::Sent => "SENT",
            HubReportStatusType::ErrorSending => "ERROR_SENDING",
            HubReportStatusType::PendingReward => "PENDING_REWARD",
            HubReportStatusType::Rewarded => "REWARDED",
            HubReportStatusType::Rejected => "REJECTED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NONE" => Some(HubReportStatusType::None),
            "INVALID" => Some(HubReportStatusType::Invalid),
            "SENT" => Some(HubReportStatusType::Sent),
            "ERROR_SENDING" => Some(HubReportStatusType::ErrorSending),
            "PENDING_REWARD" => Some(HubReportStatusType::PendingReward),
            "REWARDED" => Some(HubReportStatusType::Rewarded),
            "REJECTED" => Some(HubReportStatusType::Rejected),
            _ => None,
        }
    }
}

/// Weekly engagement report submitted by a Hub, content-addressed by `hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubReport {
    pub hash: String,
    pub nft_id: i64,
    pub hub_address: String,
    pub sent_date: DateTime<Utc>,
    pub achievements_count: i64,
    pub hub_reward_amount: f64,
    pub engagement_rate: f64,
    /// Lease ownership snapshot taken when the report is received, so later
    /// ownership transfers do not rewrite already-submitted reports.
    pub owner_address: Option<String>,
    pub deed_manager_address: Option<String>,
    pub owner_minting_percentage: Option<i32>,
    pub status: HubReportStatusType,
    pub error: Option<String>,
    pub reward_payment: Option<f64>,
}

/// Period-aggregated reward computed across all Hub reports of one week.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UemReward {
    pub id: String,
    /// Content seal. Once set the reward has been published and its
    /// aggregates must never be recomputed.
    pub hash: Option<String>,
    pub period_type: String,
    pub from_date: DateTime<Utc>,
    pub to_date: DateTime<Utc>,
    pub hub_addresses: Vec<String>,
    pub report_hashes: Vec<String>,
    pub hub_rewards_amount: f64,
    pub hub_achievements_count: i64,
    pub global_engagement_rate: f64,
    pub created_date: DateTime<Utc>,
}
