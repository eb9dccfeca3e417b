use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, AuthError};
use crate::license::tiers;
use crate::store::models::{day_start_utc, month_start_utc, ConversationUsage, Period};
use crate::store::{Storage, UserCache, User};

/// Result of a successful license validation.
#[derive(Debug, Clone, Serialize)]
pub struct LicenseStatus {
    pub user_id: Uuid,
    pub email: String,
    pub tier: String,
    pub daily_limit: i64,
    pub monthly_limit: i64,
    pub daily_used: i64,
    pub monthly_used: i64,
    pub daily_remaining: i64,
    pub monthly_remaining: i64,
    pub max_devices: i32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PeriodUsage {
    pub used: i64,
    pub limit: i64,
    pub remaining: i64,
}

impl PeriodUsage {
    fn new(used: i64, limit: i64) -> Self {
        Self {
            used,
            limit,
            remaining: (limit - used).max(0),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct UsageSnapshot {
    pub daily: PeriodUsage,
    pub monthly: PeriodUsage,
}

/// Optional audit fields accompanying a tracked conversation.
#[derive(Debug, Clone, Default)]
pub struct TrackMetadata {
    pub conversation_id: Option<String>,
    pub installation_id: Option<String>,
    pub question_hash: Option<String>,
    pub response_length: Option<i64>,
    pub processing_time_ms: Option<i64>,
}

pub struct LicenseService {
    store: Arc<dyn Storage>,
    cache: Arc<UserCache>,
}

impl LicenseService {
    pub fn new(store: Arc<dyn Storage>, cache: Arc<UserCache>) -> Self {
        Self { store, cache }
    }

    /// Looks up the user behind a license key. The read-through cache may
    /// serve a slightly stale user record; it is never consulted for usage
    /// counters. Absent or non-active users are indistinguishable to the
    /// caller: both are an invalid license.
    async fn lookup_active(&self, license_key: &str) -> Result<User, AppError> {
        let user = match self.cache.get(license_key).await {
            Some(user) => user,
            None => {
                let user = self
                    .store
                    .get_user_by_license_key(license_key)
                    .await?
                    .ok_or(AuthError::InvalidLicense)?;
                self.cache.put(user.clone()).await;
                user
            }
        };

        if !user.is_active() {
            debug!(status = %user.account_status, "License belongs to a non-active account");
            return Err(AuthError::InvalidLicense.into());
        }
        Ok(user)
    }

    /// Effective limits: per-user overrides win over tier defaults.
    fn effective_limits(user: &User) -> (i64, i64) {
        let defaults = tiers::limits_for(&user.subscription_tier);
        (
            user.daily_limit.unwrap_or(defaults.daily),
            user.monthly_limit.unwrap_or(defaults.monthly),
        )
    }

    pub async fn validate_license(&self, license_key: &str) -> Result<LicenseStatus, AppError> {
        let user = self.lookup_active(license_key).await?;
        let (daily_limit, monthly_limit) = Self::effective_limits(&user);

        let daily = Period::current_daily();
        let monthly = Period::current_monthly();
        let daily_used = self
            .store
            .get_usage(license_key, &daily)
            .await?
            .map(|row| row.conversations_used)
            .unwrap_or(0);
        let monthly_used = self
            .store
            .get_usage(license_key, &monthly)
            .await?
            .map(|row| row.conversations_used)
            .unwrap_or(0);

        Ok(LicenseStatus {
            user_id: user.id,
            email: user.email.clone(),
            tier: user.subscription_tier.clone(),
            daily_limit,
            monthly_limit,
            daily_used,
            monthly_used,
            daily_remaining: (daily_limit - daily_used).max(0),
            monthly_remaining: (monthly_limit - monthly_used).max(0),
            max_devices: user.max_devices,
        })
    }

    /// Records `delta` conversations against a license: increments the daily
    /// and monthly period counters (atomically at the store) and appends one
    /// audit row. Tracking never hard-blocks over the limit; overage shows up
    /// only as `remaining == 0` in the returned snapshot.
    pub async fn record_usage(
        &self,
        license_key: &str,
        delta: i64,
        metadata: TrackMetadata,
    ) -> Result<UsageSnapshot, AppError> {
        let user = self.lookup_active(license_key).await?;
        let (daily_limit, monthly_limit) = Self::effective_limits(&user);

        let daily_row = self
            .store
            .upsert_usage(license_key, &Period::current_daily(), delta, daily_limit)
            .await?;
        let monthly_row = self
            .store
            .upsert_usage(license_key, &Period::current_monthly(), delta, monthly_limit)
            .await?;

        let mut record = ConversationUsage::new(license_key.to_string());
        record.conversation_id = metadata.conversation_id;
        record.installation_id = metadata.installation_id;
        record.question_hash = metadata.question_hash;
        record.response_length = metadata.response_length;
        record.processing_time_ms = metadata.processing_time_ms;
        self.store.append_conversation(&record).await?;

        info!(
            license_tail = %key_tail(license_key),
            delta,
            daily_used = daily_row.conversations_used,
            monthly_used = monthly_row.conversations_used,
            "Recorded usage"
        );

        Ok(UsageSnapshot {
            daily: PeriodUsage::new(daily_row.conversations_used, daily_limit),
            monthly: PeriodUsage::new(monthly_row.conversations_used, monthly_limit),
        })
    }

    /// Audit-log-derived counts for the current local day and month.
    pub async fn usage_summary(&self, license_key: &str) -> Result<(i64, i64), AppError> {
        self.lookup_active(license_key).await?;
        let daily = self
            .store
            .count_conversations_since(license_key, day_start_utc())
            .await?;
        let monthly = self
            .store
            .count_conversations_since(license_key, month_start_utc())
            .await?;
        Ok((daily, monthly))
    }
}

/// Last key group, for log lines that must not leak the full credential.
pub fn key_tail(license_key: &str) -> &str {
    license_key.rsplit('-').next().unwrap_or("????")
}
