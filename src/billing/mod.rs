//! Thin client for the Paddle prices API.
//!
//! The processor is an opaque HTTP service; this module only fetches the
//! configured products' price lists so the checkout page can render them.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::info;

use crate::config::PaddleConfig;
use crate::error::AppError;
use crate::license::tiers::PADDLE_PRODUCT_IDS;
use crate::AppState;

const LIVE_API: &str = "https://api.paddle.com";
const SANDBOX_API: &str = "https://sandbox-api.paddle.com";

pub struct PaddleClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PriceListResponse {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

impl PaddleClient {
    pub fn new(config: &PaddleConfig) -> Self {
        let base_url = if config.sandbox { SANDBOX_API } else { LIVE_API };
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            base_url: base_url.to_string(),
        }
    }

    /// Test hook: point the client at a local stub server.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Fetches prices for every configured product. The per-product lookups
    /// are independent and run concurrently.
    pub async fn list_prices(&self) -> Result<Vec<serde_json::Value>, AppError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AppError::ConfigError("Paddle API key is not configured".to_string())
        })?;

        let fetches = PADDLE_PRODUCT_IDS
            .iter()
            .map(|product_id| self.product_prices(api_key, product_id));
        let batches = futures::future::try_join_all(fetches).await?;
        Ok(batches.into_iter().flatten().collect())
    }

    async fn product_prices(
        &self,
        api_key: &str,
        product_id: &str,
    ) -> Result<Vec<serde_json::Value>, AppError> {
        let url = format!("{}/prices", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("product_id", product_id)])
            .bearer_auth(api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamError(format!(
                "Paddle prices request failed ({}): {}",
                status, body
            )));
        }

        let prices: PriceListResponse = response.json().await?;
        Ok(prices.data)
    }
}

pub async fn prices(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let prices = state.billing.list_prices().await?;
    info!(count = prices.len(), "Fetched Paddle price list");
    Ok(HttpResponse::Ok().json(serde_json::json!({ "prices": prices })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> PaddleClient {
        PaddleClient::new(&PaddleConfig {
            api_key: Some("pdl_test".to_string()),
            webhook_secret: None,
            sandbox: true,
        })
        .with_base_url(&server.uri())
    }

    #[tokio::test]
    async fn test_list_prices_aggregates_products() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/prices"))
            .and(header("authorization", "Bearer pdl_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "pri_x", "unit_price": {"amount": "900"}}]
            })))
            .mount(&server)
            .await;

        let prices = client_for(&server).list_prices().await.unwrap();
        // One price per configured product.
        assert_eq!(prices.len(), PADDLE_PRODUCT_IDS.len());
    }

    #[tokio::test]
    async fn test_upstream_error_passthrough() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/prices"))
            .respond_with(ResponseTemplate::new(500).set_body_string("paddle exploded"))
            .mount(&server)
            .await;

        let err = client_for(&server).list_prices().await.unwrap_err();
        match err {
            AppError::UpstreamError(msg) => assert!(msg.contains("paddle exploded")),
            other => panic!("expected upstream error, got {}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_api_key_is_config_error() {
        let client = PaddleClient::new(&PaddleConfig {
            api_key: None,
            webhook_secret: None,
            sandbox: true,
        });
        let result = client.list_prices().await;
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_product_query_param_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/prices"))
            .and(query_param("product_id", "pro_hive_basic"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": []
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/prices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": []
            })))
            .mount(&server)
            .await;

        client_for(&server).list_prices().await.unwrap();
    }
}
