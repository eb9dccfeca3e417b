use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::error::{AppError, WebhookError};
use crate::license::{generate_license_key, tiers};
use crate::store::models::{User, UserUpdate, STATUS_ACTIVE, STATUS_CANCELLED, STATUS_SUSPENDED};
use crate::store::Storage;
use crate::webhooks::signature;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PaddleEvent {
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CustomerData {
    id: String,
    email: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionData {
    id: String,
    customer_id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    items: Vec<SubscriptionItem>,
    #[serde(default)]
    current_billing_period: Option<BillingPeriod>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItem {
    price: PriceRef,
}

#[derive(Debug, Deserialize)]
struct PriceRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct BillingPeriod {
    #[serde(default)]
    ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    #[serde(default)]
    customer_id: Option<String>,
}

pub async fn webhook(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let secret = state
        .config
        .paddle
        .webhook_secret
        .as_deref()
        .ok_or_else(|| AppError::ConfigError("Paddle webhook secret is not configured".to_string()))?;

    let header = req
        .headers()
        .get("paddle-signature")
        .and_then(|h| h.to_str().ok())
        .ok_or(WebhookError::BadSignature)?;
    signature::verify_paddle(secret, header, &body)?;

    let event: PaddleEvent = serde_json::from_slice(&body)
        .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;
    info!(event_type = %event.event_type, "Paddle webhook received");

    apply_event(state.store.as_ref(), event).await?;

    // Paddle expects 2xx whenever delivery worked, even if the event was a
    // domain-side no-op; anything else triggers retry storms.
    Ok(HttpResponse::Ok().json(json!({ "received": true })))
}

async fn apply_event(store: &dyn Storage, event: PaddleEvent) -> Result<(), AppError> {
    match event.event_type.as_str() {
        "customer.created" => {
            let data: CustomerData = parse(event.data)?;
            customer_created(store, data).await
        }
        "subscription.created" => {
            let data: SubscriptionData = parse(event.data)?;
            subscription_created(store, data).await
        }
        "subscription.updated" => {
            let data: SubscriptionData = parse(event.data)?;
            subscription_updated(store, data).await
        }
        "subscription.canceled" | "subscription.cancelled" => {
            let data: SubscriptionData = parse(event.data)?;
            set_subscription_status(store, &data.customer_id, STATUS_CANCELLED).await
        }
        "subscription.paused" => {
            let data: SubscriptionData = parse(event.data)?;
            set_account_status(store, &data.customer_id, STATUS_SUSPENDED).await
        }
        "subscription.resumed" => {
            let data: SubscriptionData = parse(event.data)?;
            set_account_status(store, &data.customer_id, STATUS_ACTIVE).await
        }
        "transaction.completed" => {
            let data: TransactionData = parse(event.data)?;
            match data.customer_id {
                Some(customer_id) => set_account_status(store, &customer_id, STATUS_ACTIVE).await,
                None => {
                    warn!("transaction.completed without customer id; ignoring");
                    Ok(())
                }
            }
        }
        other => {
            info!(event_type = %other, "Ignoring unhandled Paddle event");
            Ok(())
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(data: serde_json::Value) -> Result<T, AppError> {
    serde_json::from_value(data)
        .map_err(|e| WebhookError::MalformedPayload(e.to_string()).into())
}

/// Find-or-create keyed by email; a pre-existing account just gets the
/// external customer id linked.
async fn customer_created(store: &dyn Storage, data: CustomerData) -> Result<(), AppError> {
    let email = data.email.trim().to_lowercase();
    match store.get_user_by_email(&email).await? {
        Some(user) => {
            store
                .update_user(
                    user.id,
                    UserUpdate {
                        paddle_customer_id: Some(data.id),
                        ..Default::default()
                    },
                )
                .await?;
            info!(email = %email, "Linked Paddle customer to existing account");
        }
        None => {
            let mut user = User::new(email.clone(), data.name, generate_license_key());
            user.paddle_customer_id = Some(data.id);
            store.create_user(&user).await?;
            info!(email = %email, "Created free-tier account from Paddle customer");
        }
    }
    Ok(())
}

async fn subscription_created(store: &dyn Storage, data: SubscriptionData) -> Result<(), AppError> {
    let user = match store.get_user_by_customer_id(&data.customer_id).await? {
        Some(user) => user,
        None => {
            warn!(customer_id = %data.customer_id, "subscription.created for unknown customer; ignoring");
            return Ok(());
        }
    };

    let price_id = match data.items.first() {
        Some(item) => item.price.id.as_str(),
        None => {
            warn!(subscription_id = %data.id, "subscription.created without items; ignoring");
            return Ok(());
        }
    };
    let tier = match tiers::tier_for_price(price_id) {
        Some(tier) => tier,
        None => {
            // The §8-style anomaly case: an unmapped price id must never
            // mutate the user record.
            warn!(price_id = %price_id, "Unmapped Paddle price id; user left untouched");
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
                paddle_subscription_id: Some(data.id),
                subscription_status: Some(data.status.unwrap_or_else(|| STATUS_ACTIVE.to_string())),
                account_status: Some(STATUS_ACTIVE.to_string()),
                subscription_end_date: data.current_billing_period.and_then(|p| p.ends_at),
                ..Default::default()
            },
        )
        .await?;
    info!(email = %user.email, tier = %tier, "Applied subscription.created");
    Ok(())
}

async fn subscription_updated(store: &dyn Storage, data: SubscriptionData) -> Result<(), AppError> {
    let user = match store.get_user_by_customer_id(&data.customer_id).await? {
        Some(user) => user,
        None => {
            warn!(customer_id = %data.customer_id, "subscription.updated for unknown customer; ignoring");
            return Ok(());
        }
    };

    // Status and period end always refresh; the tier moves only when the
    // price maps to a different one.
    let mut update = UserUpdate {
        subscription_status: data.status,
        subscription_end_date: data.current_billing_period.and_then(|p| p.ends_at),
        ..Default::default()
    };
    if let Some(item) = data.items.first() {
        match tiers::tier_for_price(&item.price.id) {
            Some(tier) if tier != user.subscription_tier => {
                let limits = tiers::limits_for(tier);
                update.subscription_tier = Some(tier.to_string());
                update.daily_limit = Some(limits.daily);
                update.monthly_limit = Some(limits.monthly);
                update.max_devices = Some(limits.max_devices);
            }
            Some(_) => {}
            None => {
                warn!(price_id = %item.price.id, "Unmapped Paddle price id on subscription.updated");
            }
        }
    }

    store.update_user(user.id, update).await?;
    Ok(())
}

/// Cancellation keeps the account active until the billing period runs out;
/// only the subscription status flips.
async fn set_subscription_status(
    store: &dyn Storage,
    customer_id: &str,
    status: &str,
) -> Result<(), AppError> {
    match store.get_user_by_customer_id(customer_id).await? {
        Some(user) => {
            store
                .update_user(
                    user.id,
                    UserUpdate {
                        subscription_status: Some(status.to_string()),
                        ..Default::default()
                    },
                )
                .await?;
            info!(email = %user.email, status = %status, "Updated subscription status");
        }
        None => {
            warn!(customer_id = %customer_id, "Subscription event for unknown customer; ignoring");
        }
    }
    Ok(())
}

async fn set_account_status(
    store: &dyn Storage,
    customer_id: &str,
    status: &str,
) -> Result<(), AppError> {
    match store.get_user_by_customer_id(customer_id).await? {
        Some(user) => {
            store
                .update_user(
                    user.id,
                    UserUpdate {
                        account_status: Some(status.to_string()),
                        ..Default::default()
                    },
                )
                .await?;
            info!(email = %user.email, status = %status, "Updated account status");
        }
        None => {
            warn!(customer_id = %customer_id, "Account event for unknown customer; ignoring");
        }
    }
    Ok(())
}
