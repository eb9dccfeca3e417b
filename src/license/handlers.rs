use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;
use crate::license::service::{key_tail, TrackMetadata, UsageSnapshot};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub license_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub valid: bool,
    pub user_id: String,
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

pub async fn validate(
    req: web::Json<ValidateRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let license_key = req
        .license_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::ValidationError("licenseKey is required".to_string()))?;

    info!(license_tail = %key_tail(license_key), "License validation request");
    let status = state.license.validate_license(license_key).await?;

    Ok(HttpResponse::Ok().json(ValidateResponse {
        valid: true,
        user_id: status.user_id.to_string(),
        email: status.email,
        tier: status.tier,
        daily_limit: status.daily_limit,
        monthly_limit: status.monthly_limit,
        daily_used: status.daily_used,
        monthly_used: status.monthly_used,
        daily_remaining: status.daily_remaining,
        monthly_remaining: status.monthly_remaining,
        max_devices: status.max_devices,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRequest {
    pub license_key: Option<String>,
    pub conversations_used: Option<i64>,
    pub conversation_id: Option<String>,
    pub installation_id: Option<String>,
    pub question_hash: Option<String>,
    pub response_length: Option<i64>,
    pub processing_time: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub success: bool,
    pub usage: UsageSnapshot,
    pub timestamp: String,
}

pub async fn track(
    req: web::Json<TrackRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    let license_key = req
        .license_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::ValidationError("licenseKey is required".to_string()))?;

    let delta = req.conversations_used.unwrap_or(1);
    if delta < 1 {
        return Err(AppError::ValidationError(
            "conversationsUsed must be a positive integer".to_string(),
        ));
    }

    let metadata = TrackMetadata {
        conversation_id: req.conversation_id,
        installation_id: req.installation_id,
        question_hash: req.question_hash,
        response_length: req.response_length,
        processing_time_ms: req.processing_time,
    };
    let usage = state.license.record_usage(license_key, delta, metadata).await?;

    Ok(HttpResponse::Ok().json(TrackResponse {
        success: true,
        usage,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRequest {
    pub license_key: Option<String>,
}

pub async fn summary(
    req: web::Json<SummaryRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let license_key = req
        .license_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::ValidationError("licenseKey is required".to_string()))?;

    let (daily, monthly) = state.license.usage_summary(license_key).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "daily": daily,
        "monthly": monthly,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}
