//! Storage layer for the Hive server.
//!
//! One async trait, two backends: Postgres when `database.url` is
//! configured, an in-memory store otherwise. Nothing outside this module
//! branches on which backend is in use.

pub mod cache;
pub mod memory;
pub mod models;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::config::Settings;
use crate::error::StorageError;

pub use cache::UserCache;
pub use memory::MemoryStorage;
pub use models::{
    ApiKey, ConversationUsage, Period, PeriodType, User, UserUpdate, UsagePeriod,
};
pub use postgres::PgStorage;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError>;

    async fn get_user_by_license_key(&self, key: &str) -> Result<Option<User>, StorageError>;

    async fn get_user_by_customer_id(&self, customer_id: &str)
        -> Result<Option<User>, StorageError>;

    async fn create_user(&self, user: &User) -> Result<User, StorageError>;

    /// Partial merge: only `Some` fields change; `updated_at` is stamped
    /// unconditionally.
    async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<User, StorageError>;

    async fn create_api_key(&self, key: &ApiKey) -> Result<ApiKey, StorageError>;

    async fn list_api_keys(&self, user_id: Uuid) -> Result<Vec<ApiKey>, StorageError>;

    /// Atomic increment-or-insert of one (license_key, period) counter row.
    /// Returns the post-update row. Concurrent calls for the same key must
    /// all be reflected in the final count.
    async fn upsert_usage(
        &self,
        license_key: &str,
        period: &Period,
        delta: i64,
        limit: i64,
    ) -> Result<UsagePeriod, StorageError>;

    async fn get_usage(
        &self,
        license_key: &str,
        period: &Period,
    ) -> Result<Option<UsagePeriod>, StorageError>;

    async fn append_conversation(&self, record: &ConversationUsage) -> Result<(), StorageError>;

    async fn count_conversations_since(
        &self,
        license_key: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, StorageError>;
}

/// Select and connect the backend for the configured environment.
pub async fn connect(settings: &Settings) -> Result<Arc<dyn Storage>, StorageError> {
    match settings.database.url.as_deref() {
        Some(url) => {
            let store = PgStorage::connect(url, settings.database.max_connections).await?;
            info!("Connected to Postgres storage backend");
            Ok(Arc::new(store))
        }
        None => {
            info!("No database configured; using in-memory storage backend");
            Ok(Arc::new(MemoryStorage::new()))
        }
    }
}
