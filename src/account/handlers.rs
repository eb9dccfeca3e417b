use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;
use crate::license::tiers;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Signup responds in snake_case; the quota endpoints use camelCase. Both
/// shapes are part of the public contract with the CLI and checkout forms.
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub license_key: String,
    pub subscription_tier: String,
    pub daily_limit: i64,
    pub monthly_limit: i64,
}

pub async fn signup(
    req: web::Json<SignupRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    let email = req
        .email
        .as_deref()
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::ValidationError("email is required".to_string()))?;

    info!(email = %email, "Signup request");
    let user = state.accounts.signup(email, req.name).await?;

    let defaults = tiers::limits_for(&user.subscription_tier);
    Ok(HttpResponse::Created().json(SignupResponse {
        id: user.id.to_string(),
        email: user.email,
        name: user.name,
        license_key: user.license_key,
        subscription_tier: user.subscription_tier,
        daily_limit: user.daily_limit.unwrap_or(defaults.daily),
        monthly_limit: user.monthly_limit.unwrap_or(defaults.monthly),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyRequest {
    pub license_key: Option<String>,
    pub name: Option<String>,
}

pub async fn create_key(
    req: web::Json<CreateKeyRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    let license_key = req
        .license_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::ValidationError("licenseKey is required".to_string()))?;
    let name = req.name.unwrap_or_else(|| "default".to_string());

    let (key, secret) = state.accounts.create_api_key(license_key, &name).await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "id": key.id.to_string(),
        "name": key.name,
        "apiKey": secret,
        "createdAt": key.created_at.to_rfc3339(),
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListKeysRequest {
    pub license_key: Option<String>,
}

pub async fn list_keys(
    req: web::Json<ListKeysRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let license_key = req
        .license_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::ValidationError("licenseKey is required".to_string()))?;

    let keys = state.accounts.list_api_keys(license_key).await?;
    let keys: Vec<_> = keys
        .iter()
        .map(|key| {
            serde_json::json!({
                "id": key.id.to_string(),
                "name": key.name,
                "createdAt": key.created_at.to_rfc3339(),
                "lastUsed": key.last_used.map(|t| t.to_rfc3339()),
                "isActive": key.is_active,
            })
        })
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({ "keys": keys })))
}
