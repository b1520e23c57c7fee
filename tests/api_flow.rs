//! End-to-end tests through the HTTP router: calendar, reservation,
//! checkout and webhook settlement over the in-memory store and the mock
//! gateway.

#![allow(clippy::panic)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;

use slotmarket::api::build_app;
use slotmarket::app_state::AppState;
use slotmarket::config::MarketConfig;
use slotmarket::domain::{Provider, ProviderId, Service, ServiceId, User, UserId};
use slotmarket::gateway::{MockGateway, PaymentGateway, SIGNATURE_HEADER, WebhookVerifier};
use slotmarket::persistence::{MemoryStore, Store};

const SECRET: &str = "whsec_integration";
const TERMS: &str = "2024-01";

struct TestApp {
    app: Router,
    gateway: Arc<MockGateway>,
    provider_id: ProviderId,
    service_id: ServiceId,
}

async fn user(store: &MemoryStore, token: &str) -> UserId {
    let Ok(saved) = store
        .save_user(User {
            id: UserId::new(),
            external_id: token.to_string(),
            accepted_terms_version: Some(TERMS.to_string()),
        })
        .await
    else {
        panic!("user save failed");
    };
    saved.id
}

async fn test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let owner = user(&store, "owner-token").await;
    let _ = user(&store, "alice-token").await;
    let _ = user(&store, "bob-token").await;

    let Ok(provider) = store
        .save_provider(Provider {
            id: ProviderId::new(),
            owner_id: owner,
            name: "Studio".to_string(),
            slug: "studio".to_string(),
            hourly_rate: 4_000,
            payment_account_id: Some("acct_studio".to_string()),
            charges_enabled: true,
            payouts_enabled: true,
            details_submitted: true,
        })
        .await
    else {
        panic!("provider save failed");
    };
    let Ok(service) = store
        .save_service(Service {
            id: ServiceId::new(),
            name: "Mixing".to_string(),
            slug: "mixing".to_string(),
        })
        .await
    else {
        panic!("service save failed");
    };

    let Ok(config) = MarketConfig::from_source(|key| match key {
        "STRIPE_WEBHOOK_SECRET" => Some(SECRET.to_string()),
        "SLOT_BLACKOUT_HOUR" => Some("none".to_string()),
        "TERMS_VERSION" => Some(TERMS.to_string()),
        _ => None,
    }) else {
        panic!("config failed");
    };

    let gateway = Arc::new(MockGateway::new());
    let state = AppState::build(
        &config,
        store as Arc<dyn Store>,
        Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
    );
    TestApp {
        app: build_app(state, Duration::from_secs(5)),
        gateway,
        provider_id: provider.id,
        service_id: service.id,
    }
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    };
    let Ok(request) = request else {
        panic!("request build failed");
    };
    let Ok(response) = app.clone().oneshot(request).await else {
        panic!("router failed");
    };
    let status = response.status();
    let Ok(bytes) = to_bytes(response.into_body(), usize::MAX).await else {
        panic!("body read failed");
    };
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn deliver(app: &Router, body: &[u8], signature: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/webhooks/payments")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    let Ok(request) = builder.body(Body::from(body.to_vec())) else {
        panic!("request build failed");
    };
    let Ok(response) = app.clone().oneshot(request).await else {
        panic!("router failed");
    };
    let status = response.status();
    let Ok(bytes) = to_bytes(response.into_body(), usize::MAX).await else {
        panic!("body read failed");
    };
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn hour_from_now(hours: i64) -> DateTime<Utc> {
    let Ok(hour) = Utc::now().duration_trunc(TimeDelta::hours(1)) else {
        panic!("truncation failed");
    };
    hour + TimeDelta::hours(hours)
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    let Some(s) = value.get(key).and_then(Value::as_str) else {
        panic!("missing string field {key} in {value}");
    };
    s
}

async fn create_slot(t: &TestApp, hours: i64) -> String {
    let start = hour_from_now(hours);
    let (status, body) = send(
        &t.app,
        Method::POST,
        &format!("/api/v1/providers/{}/slots", t.provider_id),
        Some("owner-token"),
        Some(json!({ "start": start, "end": start + TimeDelta::hours(1) })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    str_field(&body, "id").to_string()
}

#[tokio::test]
async fn health_is_public() {
    let t = test_app().await;
    let (status, body) = send(&t.app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(str_field(&body, "status"), "healthy");
}

#[tokio::test]
async fn reservation_requires_known_bearer() {
    let t = test_app().await;
    let slot = create_slot(&t, 3).await;
    let uri = format!("/api/v1/slots/{slot}/book");
    let body = json!({ "service_id": t.service_id });

    let (status, _) = send(&t.app, Method::POST, &uri, None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&t.app, Method::POST, &uri, Some("mallory"), Some(body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn only_owner_edits_calendar() {
    let t = test_app().await;
    let start = hour_from_now(4);
    let (status, _) = send(
        &t.app,
        Method::POST,
        &format!("/api/v1/providers/{}/slots", t.provider_id),
        Some("alice-token"),
        Some(json!({ "start": start, "end": start + TimeDelta::hours(1) })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let slot = create_slot(&t, 4).await;
    let (status, _) = send(
        &t.app,
        Method::DELETE,
        &format!("/api/v1/slots/{slot}"),
        Some("owner-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn book_checkout_and_settle() {
    let t = test_app().await;
    let first = create_slot(&t, 2).await;
    let second = create_slot(&t, 3).await;

    let (status, listing) = send(
        &t.app,
        Method::GET,
        &format!("/api/v1/providers/{}/slots?open_only=true", t.provider_id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing.pointer("/pagination/total"), Some(&json!(2)));

    // Single booking: first customer wins, second is refused.
    let book = json!({ "service_id": t.service_id });
    let uri = format!("/api/v1/slots/{first}/book");
    let (status, slot) = send(&t.app, Method::POST, &uri, Some("alice-token"), Some(book.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(str_field(&slot, "status"), "booked");
    let (status, _) = send(&t.app, Method::POST, &uri, Some("bob-token"), Some(book)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Bulk booking classifies each id.
    let unknown = ServiceId::new().to_string();
    let (status, outcome) = send(
        &t.app,
        Method::POST,
        "/api/v1/bookings",
        Some("alice-token"),
        Some(json!({ "items": [
            { "slot_id": second, "service_id": t.service_id },
            { "slot_id": unknown, "service_id": t.service_id },
        ]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome.get("booked_ids"), Some(&json!([second])));
    assert_eq!(outcome.get("invalid_ids"), Some(&json!([unknown])));

    // Checkout over both slots.
    let (status, redirect) = send(
        &t.app,
        Method::POST,
        "/api/v1/checkout/sessions",
        Some("alice-token"),
        Some(json!({ "slot_ids": [first, second] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{redirect}");
    let session_id = str_field(&redirect, "session_id").to_string();
    let order_uri = format!("/api/v1/checkout/sessions/{session_id}/order");

    let (status, order) = send(&t.app, Method::GET, &order_uri, Some("alice-token"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(str_field(&order, "status"), "pending");
    assert_eq!(order.get("amount"), Some(&json!(8_000)));
    let (status, _) = send(&t.app, Method::GET, &order_uri, Some("bob-token"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The gateway echoes the session metadata back in the webhook.
    let requests = t.gateway.requests().await;
    let Some(request) = requests.first() else {
        panic!("gateway was not called");
    };
    let metadata: HashMap<String, String> = request.metadata.iter().cloned().collect();
    let payload = json!({
        "id": "evt_it_1",
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": session_id,
            "payment_intent": "pi_it_1",
            "metadata": metadata,
        }},
    })
    .to_string();
    let verifier = WebhookVerifier::new(SECRET, 300);
    let Ok(signature) = verifier.sign(payload.as_bytes(), Utc::now().timestamp()) else {
        panic!("signing failed");
    };

    let (status, ack) = deliver(&t.app, payload.as_bytes(), Some(&signature)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(str_field(&ack, "outcome"), "order_paid");

    // Redelivery is acknowledged without a second settlement.
    let (status, ack) = deliver(&t.app, payload.as_bytes(), Some(&signature)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(str_field(&ack, "outcome"), "already_processed");

    let (_, order) = send(&t.app, Method::GET, &order_uri, Some("alice-token"), None).await;
    assert_eq!(str_field(&order, "status"), "paid");
    assert_eq!(str_field(&order, "payment_intent_id"), "pi_it_1");

    let (_, listing) = send(
        &t.app,
        Method::GET,
        &format!("/api/v1/providers/{}/slots", t.provider_id),
        None,
        None,
    )
    .await;
    let Some(slots) = listing.get("data").and_then(Value::as_array) else {
        panic!("missing data");
    };
    assert!(slots.iter().all(|s| str_field(s, "status") == "confirmed"));
}

#[tokio::test]
async fn webhook_rejects_bad_signatures() {
    let t = test_app().await;
    let payload = br#"{"id":"evt_x","type":"checkout.session.completed","data":{"object":{"id":"cs_x"}}}"#;

    let (status, _) = deliver(&t.app, payload, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let forged = WebhookVerifier::new("whsec_other", 300);
    let Ok(signature) = forged.sign(payload, Utc::now().timestamp()) else {
        panic!("signing failed");
    };
    let (status, body) = deliver(&t.app, payload, Some(&signature)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.pointer("/error/code").is_some());
}

#[tokio::test]
async fn unrelated_events_are_acknowledged() {
    let t = test_app().await;
    let payload = br#"{"id":"evt_y","type":"customer.created","data":{"object":{}}}"#;
    let Ok(signature) = WebhookVerifier::new(SECRET, 300).sign(payload, Utc::now().timestamp())
    else {
        panic!("signing failed");
    };
    let (status, ack) = deliver(&t.app, payload, Some(&signature)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(str_field(&ack, "outcome"), "ignored");
}
