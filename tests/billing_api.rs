use actix_web::{test, web, App};
use hive_server::billing::PaddleClient;
use hive_server::store::MemoryStorage;
use hive_server::{configure_routes, AppState, Settings};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[actix_web::test]
async fn test_prices_endpoint_proxies_paddle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/prices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"id": "pri_hive_basic_monthly", "unit_price": {"amount": "900", "currency_code": "USD"}}]
        })))
        .mount(&server)
        .await;

    let mut config = Settings::new_for_test().expect("Failed to load test config");
    config.paddle.api_key = Some("pdl_test".to_string());

    let mut state = AppState::with_store(config.clone(), Arc::new(MemoryStorage::new()));
    state.billing = Arc::new(PaddleClient::new(&config.paddle).with_base_url(&server.uri()));
    let state = web::Data::new(state);

    let app = test::init_service(
        App::new().app_data(state.clone()).configure(configure_routes),
    )
    .await;

    let resp = test::TestRequest::get()
        .uri("/api/billing/prices")
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = test::read_body_json(resp).await;
    let prices = body["prices"].as_array().unwrap();
    assert!(!prices.is_empty());
    assert_eq!(prices[0]["id"], "pri_hive_basic_monthly");
}

#[actix_web::test]
async fn test_prices_endpoint_without_api_key_errors() {
    let config = Settings::new_for_test().expect("Failed to load test config");
    let state = web::Data::new(AppState::with_store(config, Arc::new(MemoryStorage::new())));

    let app = test::init_service(
        App::new().app_data(state.clone()).configure(configure_routes),
    )
    .await;

    let resp = test::TestRequest::get()
        .uri("/api/billing/prices")
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("not configured"));
}
