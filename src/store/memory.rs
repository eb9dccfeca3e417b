use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StorageError;
use crate::store::models::{ApiKey, ConversationUsage, Period, User, UserUpdate, UsagePeriod};
use crate::store::Storage;

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    // Keyed by (license_key, period_type, period_key); exactly one row per triple.
    usage: HashMap<(String, String, String), UsagePeriod>,
    conversations: Vec<ConversationUsage>,
    api_keys: Vec<ApiKey>,
}

/// Process-local development/test backend. Constructed and injected by the
/// entry point, never a global; state lives only as long as the process.
pub struct MemoryStorage {
    state: RwLock<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn get_user_by_license_key(&self, key: &str) -> Result<Option<User>, StorageError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.license_key == key).cloned())
    }

    async fn get_user_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<User>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.paddle_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn create_user(&self, user: &User) -> Result<User, StorageError> {
        let mut state = self.state.write().await;
        let exists = state
            .users
            .values()
            .any(|u| u.email == user.email || u.license_key == user.license_key);
        if exists {
            return Err(StorageError::Duplicate);
        }
        state.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<User, StorageError> {
        let mut state = self.state.write().await;
        let user = state.users.get_mut(&id).ok_or(StorageError::NotFound)?;

        if let Some(name) = update.name {
            user.name = Some(name);
        }
        if let Some(tier) = update.subscription_tier {
            user.subscription_tier = tier;
        }
        if let Some(limit) = update.daily_limit {
            user.daily_limit = Some(limit);
        }
        if let Some(limit) = update.monthly_limit {
            user.monthly_limit = Some(limit);
        }
        if let Some(status) = update.account_status {
            user.account_status = status;
        }
        if let Some(devices) = update.max_devices {
            user.max_devices = devices;
        }
        if let Some(customer_id) = update.paddle_customer_id {
            user.paddle_customer_id = Some(customer_id);
        }
        if let Some(subscription_id) = update.paddle_subscription_id {
            user.paddle_subscription_id = Some(subscription_id);
        }
        if let Some(status) = update.subscription_status {
            user.subscription_status = Some(status);
        }
        if let Some(end_date) = update.subscription_end_date {
            user.subscription_end_date = Some(end_date);
        }
        if let Some(credits) = update.credits_balance {
            user.credits_balance = credits;
        }
        user.updated_at = Utc::now();

        Ok(user.clone())
    }

    async fn create_api_key(&self, key: &ApiKey) -> Result<ApiKey, StorageError> {
        let mut state = self.state.write().await;
        state.api_keys.push(key.clone());
        Ok(key.clone())
    }

    async fn list_api_keys(&self, user_id: Uuid) -> Result<Vec<ApiKey>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .api_keys
            .iter()
            .filter(|k| k.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn upsert_usage(
        &self,
        license_key: &str,
        period: &Period,
        delta: i64,
        limit: i64,
    ) -> Result<UsagePeriod, StorageError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let row = state
            .usage
            .entry((
                license_key.to_string(),
                period.period_type.as_str().to_string(),
                period.key.clone(),
            ))
            .and_modify(|row| {
                row.conversations_used += delta;
                row.conversations_limit = limit;
                row.updated_at = now;
            })
            .or_insert_with(|| UsagePeriod {
                license_key: license_key.to_string(),
                period_type: period.period_type.as_str().to_string(),
                period_key: period.key.clone(),
                conversations_used: delta,
                conversations_limit: limit,
                reset_date: period.reset_date,
                updated_at: now,
            });
        Ok(row.clone())
    }

    async fn get_usage(
        &self,
        license_key: &str,
        period: &Period,
    ) -> Result<Option<UsagePeriod>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .usage
            .get(&(
                license_key.to_string(),
                period.period_type.as_str().to_string(),
                period.key.clone(),
            ))
            .cloned())
    }

    async fn append_conversation(&self, record: &ConversationUsage) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        state.conversations.push(record.clone());
        Ok(())
    }

    async fn count_conversations_since(
        &self,
        license_key: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .conversations
            .iter()
            .filter(|c| c.license_key == license_key && c.created_at >= since)
            .count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn test_user(email: &str, key: &str) -> User {
        User::new(email.to_string(), None, key.to_string())
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStorage::new();
        store
            .create_user(&test_user("a@b.com", "HIVE-0000-0000-0000-0001"))
            .await
            .unwrap();

        let result = store
            .create_user(&test_user("a@b.com", "HIVE-0000-0000-0000-0002"))
            .await;
        assert!(matches!(result, Err(StorageError::Duplicate)));
    }

    #[tokio::test]
    async fn test_partial_update_merges() {
        let store = MemoryStorage::new();
        let user = store
            .create_user(&test_user("a@b.com", "HIVE-0000-0000-0000-0001"))
            .await
            .unwrap();

        let updated = store
            .update_user(
                user.id,
                UserUpdate {
                    subscription_tier: Some("premium".to_string()),
                    daily_limit: Some(200),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.subscription_tier, "premium");
        assert_eq!(updated.daily_limit, Some(200));
        // Untouched fields survive the merge.
        assert_eq!(updated.email, "a@b.com");
        assert_eq!(updated.account_status, "active");
        assert!(updated.updated_at >= user.updated_at);
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let store = MemoryStorage::new();
        let result = store.update_user(Uuid::new_v4(), UserUpdate::default()).await;
        assert!(matches!(result, Err(StorageError::NotFound)));
    }

    #[tokio::test]
    async fn test_upsert_usage_increments() {
        let store = MemoryStorage::new();
        let period = Period::current_daily();

        let row = store
            .upsert_usage("HIVE-0000-0000-0000-0001", &period, 1, 5)
            .await
            .unwrap();
        assert_eq!(row.conversations_used, 1);

        let row = store
            .upsert_usage("HIVE-0000-0000-0000-0001", &period, 3, 5)
            .await
            .unwrap();
        assert_eq!(row.conversations_used, 4);
        assert_eq!(row.conversations_limit, 5);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_all_counted() {
        let store = Arc::new(MemoryStorage::new());
        let period = Period::current_daily();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            let period = period.clone();
            handles.push(tokio::spawn(async move {
                store
                    .upsert_usage("HIVE-0000-0000-0000-0001", &period, 1, 100)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let row = store
            .get_usage("HIVE-0000-0000-0000-0001", &period)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.conversations_used, 50);
    }

    #[tokio::test]
    async fn test_count_conversations_since() {
        let store = MemoryStorage::new();
        let cutoff = Utc::now() - chrono::Duration::hours(1);

        for _ in 0..3 {
            store
                .append_conversation(&ConversationUsage::new(
                    "HIVE-0000-0000-0000-0001".to_string(),
                ))
                .await
                .unwrap();
        }
        store
            .append_conversation(&ConversationUsage::new(
                "HIVE-0000-0000-0000-0002".to_string(),
            ))
            .await
            .unwrap();

        let count = store
            .count_conversations_since("HIVE-0000-0000-0000-0001", cutoff)
            .await
            .unwrap();
        assert_eq!(count, 3);
    }
}
