use actix_web::{test, web, App};
use hive_server::store::MemoryStorage;
use hive_server::webhooks::signature::{sign_gumroad, sign_paddle};
use hive_server::{configure_routes, AppState, Settings};
use serde_json::json;
use std::sync::Arc;

const PADDLE_SECRET: &str = "test_paddle_secret";
const GUMROAD_SECRET: &str = "test_gumroad_secret";

fn test_state() -> web::Data<AppState> {
    let config = Settings::new_for_test().expect("Failed to load test config");
    web::Data::new(AppState::with_store(config, Arc::new(MemoryStorage::new())))
}

fn paddle_request(body: &serde_json::Value) -> test::TestRequest {
    let raw = body.to_string();
    test::TestRequest::post()
        .uri("/api/webhooks/paddle")
        .insert_header(("paddle-signature", sign_paddle(PADDLE_SECRET, "1671552777", raw.as_bytes())))
        .insert_header(("content-type", "application/json"))
        .set_payload(raw)
}

#[actix_web::test]
async fn test_paddle_subscription_round_trip() {
    let state = test_state();
    let app = test::init_service(
        App::new().app_data(state.clone()).configure(configure_routes),
    )
    .await;

    let resp = paddle_request(&json!({
        "event_type": "customer.created",
        "data": {"id": "ctm_1", "email": "buyer@shop.com", "name": "Buyer"}
    }))
    .send_request(&app)
    .await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["received"], true);

    let resp = paddle_request(&json!({
        "event_type": "subscription.created",
        "data": {
            "id": "sub_1",
            "customer_id": "ctm_1",
            "status": "active",
            "items": [{"price": {"id": "pri_hive_team_monthly"}}],
            "current_billing_period": {"ends_at": "2026-10-01T00:00:00Z"}
        }
    }))
    .send_request(&app)
    .await;
    assert_eq!(resp.status(), 200);

    // The new tier's limits show up verbatim on the validation path.
    let user = state
        .store
        .get_user_by_email("buyer@shop.com")
        .await
        .unwrap()
        .unwrap();
    let resp = test::TestRequest::post()
        .uri("/api/license/validate")
        .set_json(json!({"licenseKey": user.license_key}))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["tier"], "team");
    assert_eq!(body["dailyLimit"], 600);
    assert_eq!(body["monthlyLimit"], 12000);
    assert_eq!(body["maxDevices"], 10);
}

#[actix_web::test]
async fn test_paddle_bad_signature_is_401() {
    let state = test_state();
    let app = test::init_service(
        App::new().app_data(state.clone()).configure(configure_routes),
    )
    .await;

    let raw = json!({"event_type": "customer.created", "data": {}}).to_string();
    let resp = test::TestRequest::post()
        .uri("/api/webhooks/paddle")
        .insert_header(("paddle-signature", "ts=1;h1=deadbeef"))
        .insert_header(("content-type", "application/json"))
        .set_payload(raw)
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 401);

    let resp = test::TestRequest::post()
        .uri("/api/webhooks/paddle")
        .insert_header(("content-type", "application/json"))
        .set_payload("{}".to_string())
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn test_paddle_unknown_event_still_succeeds() {
    let state = test_state();
    let app = test::init_service(
        App::new().app_data(state.clone()).configure(configure_routes),
    )
    .await;

    let resp = paddle_request(&json!({
        "event_type": "adjustment.updated",
        "data": {"id": "adj_1"}
    }))
    .send_request(&app)
    .await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["received"], true);
}

#[actix_web::test]
async fn test_paddle_unknown_customer_still_succeeds() {
    let state = test_state();
    let app = test::init_service(
        App::new().app_data(state.clone()).configure(configure_routes),
    )
    .await;

    let resp = paddle_request(&json!({
        "event_type": "subscription.paused",
        "data": {"id": "sub_9", "customer_id": "ctm_missing"}
    }))
    .send_request(&app)
    .await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn test_gumroad_sale_applies_tier() {
    let state = test_state();
    let app = test::init_service(
        App::new().app_data(state.clone()).configure(configure_routes),
    )
    .await;

    let raw = json!({
        "event": "sale",
        "email": "buyer@shop.com",
        "product_permalink": "hive-premium",
        "sale_id": "S-1"
    })
    .to_string();
    let resp = test::TestRequest::post()
        .uri("/api/webhooks/gumroad")
        .insert_header(("X-Gumroad-Signature", sign_gumroad(GUMROAD_SECRET, raw.as_bytes())))
        .insert_header(("content-type", "application/json"))
        .set_payload(raw)
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);

    let user = state
        .store
        .get_user_by_email("buyer@shop.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.subscription_tier, "premium");
}

#[actix_web::test]
async fn test_gumroad_bad_signature_is_401() {
    let state = test_state();
    let app = test::init_service(
        App::new().app_data(state.clone()).configure(configure_routes),
    )
    .await;

    let raw = json!({"event": "sale", "email": "buyer@shop.com"}).to_string();
    let resp = test::TestRequest::post()
        .uri("/api/webhooks/gumroad")
        .insert_header(("X-Gumroad-Signature", "0000"))
        .insert_header(("content-type", "application/json"))
        .set_payload(raw)
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 401);
}
