use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::store::models::User;

#[derive(Debug, Clone)]
struct CacheEntry {
    user: User,
    cached_at: DateTime<Utc>,
}

/// Best-effort read-through cache for user-by-license-key lookups.
/// Entries may be stale for up to the TTL; this is never the source of
/// truth for usage counters or account mutations. A TTL of zero disables
/// caching entirely.
pub struct UserCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl UserCache {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(ttl_seconds as i64),
        }
    }

    pub fn enabled(&self) -> bool {
        self.ttl > Duration::zero()
    }

    pub async fn get(&self, license_key: &str) -> Option<User> {
        if !self.enabled() {
            return None;
        }
        let entries = self.entries.read().await;
        let entry = entries.get(license_key)?;
        if Utc::now() - entry.cached_at > self.ttl {
            return None;
        }
        Some(entry.user.clone())
    }

    pub async fn put(&self, user: User) {
        if !self.enabled() {
            return;
        }
        let mut entries = self.entries.write().await;
        entries.insert(
            user.license_key.clone(),
            CacheEntry {
                user,
                cached_at: Utc::now(),
            },
        );
    }

    pub async fn cleanup(&self) {
        let cutoff = Utc::now() - self.ttl;
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.cached_at > cutoff);
    }
}
