pub mod account;
pub mod billing;
pub mod config;
pub mod error;
pub mod license;
pub mod store;
pub mod webhooks;

use std::sync::Arc;

use actix_web::{web, HttpResponse};

pub use config::Settings;
pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;

use account::AccountService;
use billing::PaddleClient;
use license::LicenseService;
use store::{Storage, UserCache};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub store: Arc<dyn Storage>,
    pub license: Arc<LicenseService>,
    pub accounts: Arc<AccountService>,
    pub billing: Arc<PaddleClient>,
}

impl AppState {
    /// Connects the configured storage backend (Postgres when a database URL
    /// is set, in-memory otherwise) and wires the services around it.
    pub async fn new(config: Settings) -> Result<Self> {
        let store = store::connect(&config).await?;
        Ok(Self::with_store(config, store))
    }

    /// Builds state around an explicit store. Tests inject the in-memory
    /// backend through this.
    pub fn with_store(config: Settings, store: Arc<dyn Storage>) -> Self {
        let cache = Arc::new(UserCache::new(config.cache.ttl_seconds));
        let license = Arc::new(LicenseService::new(store.clone(), cache));
        let accounts = Arc::new(AccountService::new(store.clone()));
        let billing = Arc::new(PaddleClient::new(&config.paddle));
        Self {
            config: Arc::new(config),
            store,
            license,
            accounts,
            billing,
        }
    }
}

/// Registers the full API surface. `main` and the integration tests share
/// this so the routing under test is the routing that ships.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .service(
            web::scope("/api")
                .route("/auth/signup", web::post().to(account::handlers::signup))
                .route("/license/validate", web::post().to(license::handlers::validate))
                .route("/usage/track", web::post().to(license::handlers::track))
                .route("/usage/summary", web::post().to(license::handlers::summary))
                .route("/keys/create", web::post().to(account::handlers::create_key))
                .route("/keys/list", web::post().to(account::handlers::list_keys))
                .route("/billing/prices", web::get().to(billing::prices))
                .route("/webhooks/paddle", web::post().to(webhooks::paddle::webhook))
                .route("/webhooks/gumroad", web::post().to(webhooks::gumroad::webhook)),
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::MemoryStorage;

    #[tokio::test]
    async fn test_app_state_uses_memory_store_without_database() {
        let config = Settings::new_for_test().expect("Failed to load test config");
        assert!(config.database.url.is_none());
        let state = AppState::new(config).await.expect("memory-backed state");
        assert!(state.store.get_user_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_app_state_clone_shares_arcs() {
        let config = Settings::new_for_test().expect("Failed to load test config");
        let state = AppState::with_store(config, Arc::new(MemoryStorage::new()));
        let cloned = state.clone();

        assert!(Arc::ptr_eq(&state.config, &cloned.config));
        assert!(Arc::ptr_eq(&state.license, &cloned.license));
    }
}
