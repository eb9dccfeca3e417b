use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StorageError;
use crate::store::models::{ApiKey, ConversationUsage, Period, User, UserUpdate, UsagePeriod};
use crate::store::Storage;

const USER_COLUMNS: &str = "id, email, name, license_key, subscription_tier, daily_limit, \
     monthly_limit, account_status, max_devices, created_at, updated_at, paddle_customer_id, \
     paddle_subscription_id, subscription_status, subscription_end_date, credits_balance";

pub struct PgStorage {
    pool: Arc<PgPool>,
}

impl PgStorage {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::QueryError(e.to_string()))?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    async fn fetch_user(&self, where_clause: &str, value: &str) -> Result<Option<User>, StorageError> {
        let query = format!("SELECT {} FROM users WHERE {} = $1", USER_COLUMNS, where_clause);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(value)
            .fetch_optional(self.pool.as_ref())
            .await?;
        Ok(user)
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        self.fetch_user("email", email).await
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;
        Ok(user)
    }

    async fn get_user_by_license_key(&self, key: &str) -> Result<Option<User>, StorageError> {
        self.fetch_user("license_key", key).await
    }

    async fn get_user_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<User>, StorageError> {
        self.fetch_user("paddle_customer_id", customer_id).await
    }

    async fn create_user(&self, user: &User) -> Result<User, StorageError> {
        let query = format!(
            r#"
            INSERT INTO users ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {}
            "#,
            USER_COLUMNS, USER_COLUMNS
        );
        let created = sqlx::query_as::<_, User>(&query)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.license_key)
            .bind(&user.subscription_tier)
            .bind(user.daily_limit)
            .bind(user.monthly_limit)
            .bind(&user.account_status)
            .bind(user.max_devices)
            .bind(user.created_at)
            .bind(user.updated_at)
            .bind(&user.paddle_customer_id)
            .bind(&user.paddle_subscription_id)
            .bind(&user.subscription_status)
            .bind(user.subscription_end_date)
            .bind(user.credits_balance)
            .fetch_one(self.pool.as_ref())
            .await?;
        Ok(created)
    }

    async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<User, StorageError> {
        // COALESCE leaves columns untouched when the corresponding update
        // field is NULL; updated_at is stamped unconditionally.
        let query = format!(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                subscription_tier = COALESCE($3, subscription_tier),
                daily_limit = COALESCE($4, daily_limit),
                monthly_limit = COALESCE($5, monthly_limit),
                account_status = COALESCE($6, account_status),
                max_devices = COALESCE($7, max_devices),
                paddle_customer_id = COALESCE($8, paddle_customer_id),
                paddle_subscription_id = COALESCE($9, paddle_subscription_id),
                subscription_status = COALESCE($10, subscription_status),
                subscription_end_date = COALESCE($11, subscription_end_date),
                credits_balance = COALESCE($12, credits_balance),
                updated_at = $13
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(update.name)
            .bind(update.subscription_tier)
            .bind(update.daily_limit)
            .bind(update.monthly_limit)
            .bind(update.account_status)
            .bind(update.max_devices)
            .bind(update.paddle_customer_id)
            .bind(update.paddle_subscription_id)
            .bind(update.subscription_status)
            .bind(update.subscription_end_date)
            .bind(update.credits_balance)
            .bind(Utc::now())
            .fetch_optional(self.pool.as_ref())
            .await?;
        user.ok_or(StorageError::NotFound)
    }

    async fn create_api_key(&self, key: &ApiKey) -> Result<ApiKey, StorageError> {
        let created = sqlx::query_as::<_, ApiKey>(
            r#"
            INSERT INTO api_keys (id, user_id, key_digest, name, created_at, last_used, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, key_digest, name, created_at, last_used, is_active
            "#,
        )
        .bind(key.id)
        .bind(key.user_id)
        .bind(&key.key_digest)
        .bind(&key.name)
        .bind(key.created_at)
        .bind(key.last_used)
        .bind(key.is_active)
        .fetch_one(self.pool.as_ref())
        .await?;
        Ok(created)
    }

    async fn list_api_keys(&self, user_id: Uuid) -> Result<Vec<ApiKey>, StorageError> {
        let keys = sqlx::query_as::<_, ApiKey>(
            "SELECT id, user_id, key_digest, name, created_at, last_used, is_active \
             FROM api_keys WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(keys)
    }

    async fn upsert_usage(
        &self,
        license_key: &str,
        period: &Period,
        delta: i64,
        limit: i64,
    ) -> Result<UsagePeriod, StorageError> {
        // Single-statement conditional upsert; the increment happens inside
        // the store so concurrent calls never lose updates.
        let row = sqlx::query_as::<_, UsagePeriod>(
            r#"
            INSERT INTO usage_periods
                (license_key, period_type, period_key, conversations_used,
                 conversations_limit, reset_date, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (license_key, period_type, period_key) DO UPDATE SET
                conversations_used = usage_periods.conversations_used + EXCLUDED.conversations_used,
                conversations_limit = EXCLUDED.conversations_limit,
                updated_at = EXCLUDED.updated_at
            RETURNING license_key, period_type, period_key, conversations_used,
                      conversations_limit, reset_date, updated_at
            "#,
        )
        .bind(license_key)
        .bind(period.period_type.as_str())
        .bind(&period.key)
        .bind(delta)
        .bind(limit)
        .bind(period.reset_date)
        .bind(Utc::now())
        .fetch_one(self.pool.as_ref())
        .await?;
        Ok(row)
    }

    async fn get_usage(
        &self,
        license_key: &str,
        period: &Period,
    ) -> Result<Option<UsagePeriod>, StorageError> {
        let row = sqlx::query_as::<_, UsagePeriod>(
            "SELECT license_key, period_type, period_key, conversations_used, \
             conversations_limit, reset_date, updated_at \
             FROM usage_periods \
             WHERE license_key = $1 AND period_type = $2 AND period_key = $3",
        )
        .bind(license_key)
        .bind(period.period_type.as_str())
        .bind(&period.key)
        .fetch_optional(self.pool.as_ref())
        .await?;
        Ok(row)
    }

    async fn append_conversation(&self, record: &ConversationUsage) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO conversation_usage
                (id, license_key, installation_id, conversation_id, question_hash,
                 response_length, processing_time_ms, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(&record.license_key)
        .bind(&record.installation_id)
        .bind(&record.conversation_id)
        .bind(&record.question_hash)
        .bind(record.response_length)
        .bind(record.processing_time_ms)
        .bind(record.created_at)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    async fn count_conversations_since(
        &self,
        license_key: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM conversation_usage \
             WHERE license_key = $1 AND created_at >= $2",
        )
        .bind(license_key)
        .bind(since)
        .fetch_one(self.pool.as_ref())
        .await?;
        Ok(count.0)
    }
}
