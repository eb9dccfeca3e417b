use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::error::{AppError, WebhookError};
use crate::license::{generate_license_key, tiers};
use crate::store::models::{User, UserUpdate, STATUS_ACTIVE, STATUS_CANCELLED};
use crate::store::Storage;
use crate::webhooks::signature;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct GumroadEvent {
    /// "sale" when absent (Gumroad's default ping).
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub product_permalink: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub sale_id: Option<String>,
}

pub async fn webhook(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let secret = state
        .config
        .gumroad
        .webhook_secret
        .as_deref()
        .ok_or_else(|| {
            AppError::ConfigError("Gumroad webhook secret is not configured".to_string())
        })?;

    let header = req
        .headers()
        .get("X-Gumroad-Signature")
        .and_then(|h| h.to_str().ok())
        .ok_or(WebhookError::BadSignature)?;
    signature::verify_gumroad(secret, header, &body)?;

    let event: GumroadEvent = serde_json::from_slice(&body)
        .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

    apply_event(state.store.as_ref(), event).await?;
    Ok(HttpResponse::Ok().json(json!({ "received": true })))
}

async fn apply_event(store: &dyn Storage, event: GumroadEvent) -> Result<(), AppError> {
    let kind = event.event.as_deref().unwrap_or("sale");
    info!(event = %kind, sale_id = ?event.sale_id, "Gumroad webhook received");

    let email = match event.email.as_deref() {
        Some(email) if !email.is_empty() => email.trim().to_lowercase(),
        _ => {
            return Err(WebhookError::MalformedPayload(
                "Gumroad event without an email".to_string(),
            )
            .into())
        }
    };

    match kind {
        "sale" => sale(store, &email, event).await,
        "cancellation" | "refund" | "subscription_ended" => {
            match store.get_user_by_email(&email).await? {
                Some(user) => {
                    store
                        .update_user(
                            user.id,
                            UserUpdate {
                                subscription_status: Some(STATUS_CANCELLED.to_string()),
                                ..Default::default()
                            },
                        )
                        .await?;
                }
                None => warn!(email = %email, "Gumroad cancellation for unknown account; ignoring"),
            }
            Ok(())
        }
        other => {
            info!(event = %other, "Ignoring unhandled Gumroad event");
            Ok(())
        }
    }
}

async fn sale(store: &dyn Storage, email: &str, event: GumroadEvent) -> Result<(), AppError> {
    let user = match store.get_user_by_email(email).await? {
        Some(user) => user,
        None => {
            let user = User::new(email.to_string(), None, generate_license_key());
            let user = store.create_user(&user).await?;
            info!(email = %email, "Created free-tier account from Gumroad sale");
            user
        }
    };

    let product = event
        .product_permalink
        .as_deref()
        .or(event.product_id.as_deref())
        .unwrap_or("");
    let tier = match tiers::tier_for_price(product) {
        Some(tier) => tier,
        None => {
            warn!(product = %product, "Unmapped Gumroad product; tier left untouched");
            return Ok(());
        }
    };

    let limits = tiers::limits_for(tier);
    store
        .update_user(
            user.id,
            UserUpdate {
                subscription_tier: Some(tier.to_string()),
                daily_limit: Some(limits.daily),
                monthly_limit: Some(limits.monthly),
                max_devices: Some(limits.max_devices),
                subscription_status: Some(STATUS_ACTIVE.to_string()),
                account_status: Some(STATUS_ACTIVE.to_string()),
                ..Default::default()
            },
        )
        .await?;
    info!(email = %email, tier = %tier, "Applied Gumroad sale");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStorage;

    fn sale_event(email: &str, product: &str) -> GumroadEvent {
        GumroadEvent {
            event: Some("sale".to_string()),
            email: Some(email.to_string()),
            product_permalink: Some(product.to_string()),
            product_id: None,
            sale_id: Some("S-1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_sale_creates_and_upgrades() {
        let store = MemoryStorage::new();
        apply_event(&store, sale_event("Buyer@Shop.com", "hive-standard"))
            .await
            .unwrap();

        let user = store.get_user_by_email("buyer@shop.com").await.unwrap().unwrap();
        assert_eq!(user.subscription_tier, "standard");
        assert_eq!(user.daily_limit, Some(100));
        assert_eq!(user.account_status, STATUS_ACTIVE);
    }

    #[tokio::test]
    async fn test_sale_with_unknown_product_keeps_tier() {
        let store = MemoryStorage::new();
        apply_event(&store, sale_event("buyer@shop.com", "some-other-product"))
            .await
            .unwrap();

        let user = store.get_user_by_email("buyer@shop.com").await.unwrap().unwrap();
        assert_eq!(user.subscription_tier, "free");
    }

    #[tokio::test]
    async fn test_cancellation_flags_subscription() {
        let store = MemoryStorage::new();
        apply_event(&store, sale_event("buyer@shop.com", "hive-basic"))
            .await
            .unwrap();

        apply_event(
            &store,
            GumroadEvent {
                event: Some("cancellation".to_string()),
                email: Some("buyer@shop.com".to_string()),
                product_permalink: None,
                product_id: None,
                sale_id: None,
            },
        )
        .await
        .unwrap();

        let user = store.get_user_by_email("buyer@shop.com").await.unwrap().unwrap();
        assert_eq!(user.subscription_status.as_deref(), Some(STATUS_CANCELLED));
        assert_eq!(user.account_status, STATUS_ACTIVE);
    }

    #[tokio::test]
    async fn test_event_without_email_is_malformed() {
        let store = MemoryStorage::new();
        let result = apply_event(
            &store,
            GumroadEvent {
                event: Some("sale".to_string()),
                email: None,
                product_permalink: None,
                product_id: None,
                sale_id: None,
            },
        )
        .await;
        assert!(matches!(
            result,
            Err(AppError::WebhookError(WebhookError::MalformedPayload(_)))
        ));
    }
}
