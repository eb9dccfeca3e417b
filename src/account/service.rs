use std::sync::Arc;

use tracing::info;

use crate::error::{AppError, AuthError, StorageError};
use crate::license::key::{digest_secret, generate_api_key_secret, generate_license_key};
use crate::store::models::{ApiKey, User};
use crate::store::Storage;

pub struct AccountService {
    store: Arc<dyn Storage>,
}

impl AccountService {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    /// Creates a free-tier account with a fresh license key. Emails are
    /// lowercase-normalized before the uniqueness check.
    pub async fn signup(&self, email: &str, name: Option<String>) -> Result<User, AppError> {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(AppError::ValidationError(
                "A valid email address is required".to_string(),
            ));
        }

        if self.store.get_user_by_email(&email).await?.is_some() {
            return Err(AppError::ConflictError(
                "An account with this email already exists".to_string(),
            ));
        }

        let user = User::new(email.clone(), name, generate_license_key());
        let user = match self.store.create_user(&user).await {
            Ok(user) => user,
            // Lost a race with a concurrent signup for the same email.
            Err(StorageError::Duplicate) => {
                return Err(AppError::ConflictError(
                    "An account with this email already exists".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        };

        // Email delivery is not implemented; the welcome mail is a log line.
        info!(email = %user.email, "Account created; welcome email queued (stub)");

        Ok(user)
    }

    /// Issues an API key for the account behind a license key. The plaintext
    /// secret is returned once; only its digest is stored.
    pub async fn create_api_key(
        &self,
        license_key: &str,
        name: &str,
    ) -> Result<(ApiKey, String), AppError> {
        let user = self.active_user(license_key).await?;
        let secret = generate_api_key_secret();
        let key = ApiKey::new(user.id, digest_secret(&secret), name.to_string());
        let key = self.store.create_api_key(&key).await?;
        info!(user_id = %user.id, key_id = %key.id, "API key created");
        Ok((key, secret))
    }

    pub async fn list_api_keys(&self, license_key: &str) -> Result<Vec<ApiKey>, AppError> {
        let user = self.active_user(license_key).await?;
        Ok(self.store.list_api_keys(user.id).await?)
    }

    async fn active_user(&self, license_key: &str) -> Result<User, AppError> {
        let user = self
            .store
            .get_user_by_license_key(license_key)
            .await?
            .ok_or(AuthError::InvalidLicense)?;
        if !user.is_active() {
            return Err(AuthError::InvalidLicense.into());
        }
        Ok(user)
    }
}

fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}
