use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_SUSPENDED: &str = "suspended";
pub const STATUS_CANCELLED: &str = "cancelled";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub license_key: String,
    pub subscription_tier: String,
    /// Per-user overrides; `None` falls back to the tier default.
    pub daily_limit: Option<i64>,
    pub monthly_limit: Option<i64>,
    pub account_status: String,
    pub max_devices: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paddle_customer_id: Option<String>,
    pub paddle_subscription_id: Option<String>,
    pub subscription_status: Option<String>,
    pub subscription_end_date: Option<DateTime<Utc>>,
    pub credits_balance: i64,
}

impl User {
    pub fn new(email: String, name: Option<String>, license_key: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            name,
            license_key,
            subscription_tier: "free".to_string(),
            daily_limit: None,
            monthly_limit: None,
            account_status: STATUS_ACTIVE.to_string(),
            max_devices: 1,
            created_at: now,
            updated_at: now,
            paddle_customer_id: None,
            paddle_subscription_id: None,
            subscription_status: None,
            subscription_end_date: None,
            credits_balance: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.account_status == STATUS_ACTIVE
    }
}

/// Partial update for `Storage::update_user`. Only `Some` fields change;
/// `updated_at` is stamped on every call by the store.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub subscription_tier: Option<String>,
    pub daily_limit: Option<i64>,
    pub monthly_limit: Option<i64>,
    pub account_status: Option<String>,
    pub max_devices: Option<i32>,
    pub paddle_customer_id: Option<String>,
    pub paddle_subscription_id: Option<String>,
    pub subscription_status: Option<String>,
    pub subscription_end_date: Option<DateTime<Utc>>,
    pub credits_balance: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodType {
    Daily,
    Monthly,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Daily => "daily",
            PeriodType::Monthly => "monthly",
        }
    }
}

/// A calendar bucket a usage counter belongs to, keyed by the server's
/// local date: `YYYY-MM-DD` for daily, `YYYY-MM` for monthly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Period {
    pub period_type: PeriodType,
    pub key: String,
    pub reset_date: DateTime<Utc>,
}

impl Period {
    pub fn current_daily() -> Self {
        let today = Local::now().date_naive();
        Self::daily_for(today)
    }

    pub fn current_monthly() -> Self {
        let today = Local::now().date_naive();
        Self::monthly_for(today)
    }

    pub fn daily_for(date: NaiveDate) -> Self {
        let rollover = date.succ_opt().unwrap_or(date);
        Self {
            period_type: PeriodType::Daily,
            key: date.format("%Y-%m-%d").to_string(),
            reset_date: local_midnight_utc(rollover),
        }
    }

    pub fn monthly_for(date: NaiveDate) -> Self {
        let rollover = first_of_next_month(date);
        Self {
            period_type: PeriodType::Monthly,
            key: date.format("%Y-%m").to_string(),
            reset_date: local_midnight_utc(rollover),
        }
    }
}

/// Start of the current local calendar day, in UTC.
pub fn day_start_utc() -> DateTime<Utc> {
    local_midnight_utc(Local::now().date_naive())
}

/// Start of the current local calendar month, in UTC.
pub fn month_start_utc() -> DateTime<Utc> {
    let today = Local::now().date_naive();
    let first = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
    local_midnight_utc(first)
}

fn first_of_next_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}

fn local_midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    match Local.from_local_datetime(&naive).earliest() {
        Some(dt) => dt.with_timezone(&Utc),
        None => Utc::now(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsagePeriod {
    pub license_key: String,
    pub period_type: String,
    pub period_key: String,
    pub conversations_used: i64,
    /// Snapshot of the effective limit at the time of the last update.
    pub conversations_limit: i64,
    pub reset_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only audit row, one per tracked conversation event.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConversationUsage {
    pub id: Uuid,
    pub license_key: String,
    pub installation_id: Option<String>,
    pub conversation_id: Option<String>,
    pub question_hash: Option<String>,
    pub response_length: Option<i64>,
    pub processing_time_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl ConversationUsage {
    pub fn new(license_key: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            license_key,
            installation_id: None,
            conversation_id: None,
            question_hash: None,
            response_length: None,
            processing_time_ms: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApiKey {
    pub id: Uuid,
    pub user_id: Uuid,
    /// SHA-256 hex digest of the secret; plaintext is returned once at
    /// creation and never stored.
    pub key_digest: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl ApiKey {
    pub fn new(user_id: Uuid, key_digest: String, name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            key_digest,
            name,
            created_at: Utc::now(),
            last_used: None,
            is_active: true,
        }
    }
}
