//! Router-level tests: drive the full REST API against in-memory stores,
//! the in-memory processor and a fixed pricer.

#![allow(clippy::panic, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use locksmith_gateway::api;
use locksmith_gateway::app_state::AppState;
use locksmith_gateway::domain::PricingBreakdown;
use locksmith_gateway::domain::pricing::{KEY_PRICE, SERVICE_FEE};
use locksmith_gateway::persistence::{
    ChargeStore, CustomerStore, InMemoryPersistence, IntentStore, MetadataStore,
};
use locksmith_gateway::pricing::{FixedPricer, Pricer};
use locksmith_gateway::processor::{InMemoryProcessor, IntentStatus, PaymentProcessor};
use locksmith_gateway::service::{CheckoutService, MetadataService};

const USER: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";
const LOCK: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
const FRIEND: &str = "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB";
const ACCOUNT: &str = "acct_manager";

struct TestApp {
    router: Router,
    processor: Arc<InMemoryProcessor>,
    store: Arc<InMemoryPersistence>,
    customer: String,
}

async fn test_app() -> TestApp {
    let pricer = Arc::new(FixedPricer::new());
    pricer
        .set(
            LOCK,
            PricingBreakdown::new()
                .with(KEY_PRICE, 1000)
                .with(SERVICE_FEE, 50),
        )
        .await;
    let processor = Arc::new(InMemoryProcessor::new());
    let customer = processor.add_customer(USER).await;
    let _ = processor.add_card(&customer).await;
    let store = Arc::new(InMemoryPersistence::new());

    let pricer: Arc<dyn Pricer> = pricer;
    let checkout_service = Arc::new(CheckoutService::new(
        Arc::clone(&pricer),
        Arc::clone(&processor) as Arc<dyn PaymentProcessor>,
        Arc::clone(&store) as Arc<dyn IntentStore>,
        Arc::clone(&store) as Arc<dyn ChargeStore>,
        Arc::clone(&store) as Arc<dyn CustomerStore>,
    ));
    let metadata_service = Arc::new(MetadataService::new(
        Arc::clone(&store) as Arc<dyn MetadataStore>
    ));

    let router = api::build_router().with_state(AppState {
        checkout_service,
        metadata_service,
        pricer,
    });
    TestApp {
        router,
        processor,
        store,
        customer,
    }
}

async fn send(
    app: &TestApp,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    };
    let Ok(request) = request else {
        panic!("invalid request");
    };
    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {});
    let status = response.status();
    let Ok(collected) = response.into_body().collect().await else {
        panic!("body read failed");
    };
    let bytes = collected.to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn intent_body(customer: &str, max_price: f64) -> Value {
    json!({
        "user_address": USER,
        "recipients": [USER, FRIEND],
        "stripe_customer_id": customer,
        "lock": LOCK,
        "max_price": max_price,
        "network": 137,
        "stripe_account": ACCOUNT,
    })
}

#[tokio::test]
async fn health_is_ok() {
    let app = test_app().await;
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn metadata_round_trip_over_http() {
    let app = test_app().await;
    let uri = format!("/api/v1/metadata/{LOCK}/{}", USER.to_lowercase());
    let (status, body) = send(
        &app,
        Method::PUT,
        &uri,
        Some(json!({
            "chain": 137,
            "metadata": {
                "protected": { "email": "julien@example.com" },
                "public": { "nickname": "julien" }
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_address"], USER);
    assert_eq!(body["chain"], 137);

    let protected_uri = format!("{uri}?include_protected=true");
    let (status, body) = send(&app, Method::GET, &protected_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userMetadata"]["protected"]["email"], "julien@example.com");

    let (status, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["userMetadata"].get("protected").is_none());
    assert_eq!(body["userMetadata"]["public"]["nickname"], "julien");
}

#[tokio::test]
async fn missing_metadata_is_not_found() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/metadata/{LOCK}/{FRIEND}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], 2001);
}

#[tokio::test]
async fn invalid_address_is_bad_request() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/v1/metadata/{LOCK}/0x1234"),
        Some(json!({ "chain": 1, "metadata": {} })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1002);
}

#[tokio::test]
async fn pricing_endpoint_returns_breakdown() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/pricing/137/{}?recipients=2", LOCK.to_lowercase()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lock"], LOCK);
    assert_eq!(body["total_price_in_cents"], 1050);
    assert_eq!(body["pricing"]["keyPrice"], 1000);
    assert_eq!(body["pricing"]["serviceFee"], 50);

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/v1/pricing/137/{LOCK}?recipients=0"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn purchase_flow_intent_capture_settle() {
    let app = test_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/purchase/intent",
        Some(intent_body(&app.customer, 10.50)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_price_in_cents"], 1050);
    assert_eq!(body["reused"], false);
    let Some(intent_id) = body["payment_intent_id"].as_str().map(str::to_string) else {
        panic!("intent id missing");
    };

    // Same purchase again before confirmation reuses the intent.
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/purchase/intent",
        Some(intent_body(&app.customer, 10.50)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reused"], true);
    assert_eq!(body["payment_intent_id"], intent_id.as_str());

    let capture = json!({
        "user_address": USER,
        "lock_address": LOCK,
        "recipients": [USER, FRIEND],
        "network": 137,
        "payment_intent_id": intent_id,
    });
    let (status, body) =
        send(&app, Method::POST, "/api/v1/purchase/capture", Some(capture.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], 2003);

    let Ok(()) = app
        .processor
        .set_intent_status(ACCOUNT, &intent_id, IntentStatus::RequiresCapture)
        .await
    else {
        panic!("status change failed");
    };

    let (status, body) = send(&app, Method::POST, "/api/v1/purchase/capture", Some(capture)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "requires_capture");
    assert_eq!(body["charge"]["total_price_in_cents"], 1050);
    assert_eq!(body["charge"]["unlock_service_fee"], 50);
    assert_eq!(app.store.charges().await.len(), 1);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/purchase/settle/{intent_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "succeeded");
    assert_eq!(body["amount"], 1050);
}

#[tokio::test]
async fn diverged_price_is_rejected() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/purchase/intent",
        Some(intent_body(&app.customer, 9.00)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1003);
    assert!(app.store.intents().await.is_empty());
}

#[tokio::test]
async fn customer_without_card_is_unprocessable() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/purchase/intent",
        Some(intent_body("cus_without_cards", 10.50)),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], 2004);
}

#[tokio::test]
async fn capture_of_unknown_intent_is_not_found() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/purchase/capture",
        Some(json!({
            "user_address": USER,
            "lock_address": LOCK,
            "recipients": [USER],
            "network": 137,
            "payment_intent_id": "pi_unknown",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], 2002);
}

#[tokio::test]
async fn setup_then_list_saved_cards() {
    let app = test_app().await;
    let methods_uri = format!("/api/v1/purchase/methods/{USER}");

    let (status, body) = send(&app, Method::GET, &methods_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["methods"].as_array().map(Vec::len), Some(0));

    let setup_uri = format!("/api/v1/purchase/setup/{USER}");
    let (status, body) = send(&app, Method::POST, &setup_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["customer_id"], app.customer.as_str());
    assert!(body["client_secret"].as_str().is_some_and(|s| !s.is_empty()));

    let (status, body) = send(&app, Method::GET, &methods_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["methods"][0]["card"]["last4"], "4242");
}
