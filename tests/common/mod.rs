//! Test utilities and fixtures for rxcart integration tests

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub use rxcart::config::StripeConfig;
pub use rxcart::db::{AppState, DbPool, create_pool, init_db, queries};
pub use rxcart::handlers;
pub use rxcart::models::*;

pub const STOREFRONT_URL: &str = "http://localhost:5173";
pub const STOREFRONT_ORIGIN: &str = "http://localhost:5173";
pub const STRIPE_SECRET: &str = "sk_test_rxcart";
pub const WEBHOOK_SECRET: &str = "whsec_test_rxcart";
pub const ADMIN_KEY: &str = "test-admin-key";
pub const AUTH_SECRET: &str = "test-auth-secret";

/// File-backed pool in a temp dir. Keep the `TempDir` alive for the test.
///
/// Pooled in-memory databases would give every connection its own empty
/// database, so tests use real files like production does.
pub fn setup_test_pool() -> (DbPool, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("rxcart-test.db");
    let pool = create_pool(db_path.to_str().expect("temp path is not UTF-8"))
        .expect("Failed to create pool");
    {
        let conn = pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize schema");
    }
    (pool, dir)
}

/// App state with every optional integration configured. `stripe_api_base`
/// of `None` leaves Stripe unconfigured.
pub fn test_state(db: DbPool, stripe_api_base: Option<&str>) -> AppState {
    AppState {
        db,
        storefront_url: STOREFRONT_URL.to_string(),
        storefront_origin: STOREFRONT_ORIGIN.to_string(),
        stripe: stripe_api_base.map(|api_base| StripeConfig {
            secret_key: STRIPE_SECRET.to_string(),
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            api_base: api_base.to_string(),
        }),
        default_currency: "usd".to_string(),
        auth_jwt_secret: Some(AUTH_SECRET.to_string()),
        admin_api_key: Some(ADMIN_KEY.to_string()),
        http: reqwest::Client::new(),
    }
}

pub fn build_app(state: AppState) -> Router {
    handlers::router(&state).with_state(state)
}

/// A running app wired to a mock Stripe API.
pub struct TestApp {
    pub state: AppState,
    pub stripe: MockServer,
    _db_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let stripe = MockServer::start().await;
        let (pool, dir) = setup_test_pool();
        Self {
            state: test_state(pool, Some(&stripe.uri())),
            stripe,
            _db_dir: dir,
        }
    }

    pub fn app(&self) -> Router {
        build_app(self.state.clone())
    }

    pub fn conn(&self) -> PooledConnection<SqliteConnectionManager> {
        self.state.db.get().expect("Failed to get connection")
    }

    /// Requests the mock Stripe API has received so far.
    pub async fn stripe_requests(&self) -> Vec<wiremock::Request> {
        self.stripe
            .received_requests()
            .await
            .expect("request recording is enabled")
    }
}

/// One line of two units at 10.00, totalling 2000 minor units.
pub fn sample_items() -> Vec<LineItem> {
    vec![LineItem {
        name: "Vitamin D3 1000IU".to_string(),
        unit_amount: 1000,
        quantity: 2,
        image_url: None,
    }]
}

pub fn create_test_order(conn: &rusqlite::Connection) -> Order {
    queries::create_order(
        conn,
        &CreateOrder {
            user_id: None,
            items: sample_items(),
            currency: "usd".to_string(),
            shipping_address: Some("1 Main St, Springfield".to_string()),
        },
    )
    .expect("Failed to create test order")
}

/// Pending order that already has a Stripe session attached.
pub fn create_order_with_session(conn: &rusqlite::Connection, session_id: &str) -> Order {
    let order = create_test_order(conn);
    assert!(
        queries::attach_checkout_session(conn, &order.id, session_id, None)
            .expect("attach should not error"),
        "session should attach to a fresh pending order"
    );
    queries::get_order_by_id(conn, &order.id)
        .expect("query failed")
        .expect("order should exist")
}

pub fn get_order(conn: &rusqlite::Connection, id: &str) -> Order {
    queries::get_order_by_id(conn, id)
        .expect("query failed")
        .expect("order should exist")
}

pub fn count_all_orders(conn: &rusqlite::Connection) -> i64 {
    queries::count_orders(conn, &OrderFilters::default()).expect("count failed")
}

// ============ Stripe fixtures ============

/// Checkout Session JSON as Stripe returns it.
pub fn stripe_session_json(session_id: &str, payment_status: &str) -> Value {
    let paid = payment_status == "paid";
    let status = if paid { "complete" } else { "open" };
    let payment_intent = if paid { json!("pi_test_123") } else { Value::Null };
    json!({
        "id": session_id,
        "object": "checkout.session",
        "url": format!("https://checkout.stripe.com/c/pay/{}", session_id),
        "payment_status": payment_status,
        "status": status,
        "payment_intent": payment_intent,
        "amount_total": 2000,
        "currency": "usd",
        "customer_email": null,
        "customer_details": {
            "email": "patient@example.com",
            "name": "Pat Patient"
        },
        "client_reference_id": null,
        "metadata": {}
    })
}

pub async fn mock_create_session(server: &MockServer, session: Value) {
    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session))
        .mount(server)
        .await;
}

pub async fn mock_retrieve_session(server: &MockServer, session: Value) {
    let id = session["id"].as_str().expect("session id").to_string();
    Mock::given(method("GET"))
        .and(path(format!("/v1/checkout/sessions/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(session))
        .mount(server)
        .await;
}

/// Stripe-style error response (`{"error": {"message": ...}}`).
pub async fn mock_stripe_error(server: &MockServer, http_method: &str, status: u16, message: &str) {
    Mock::given(method(http_method))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "error": { "type": "invalid_request_error", "message": message }
        })))
        .mount(server)
        .await;
}

/// `stripe-signature` header value for `payload` at `timestamp`.
pub fn stripe_signature(payload: &[u8], secret: &str, timestamp: i64) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// HS256 access token as the auth provider would issue it.
pub fn auth_token(subject: &str) -> String {
    use jwt_simple::prelude::*;

    HS256Key::from_bytes(AUTH_SECRET.as_bytes())
        .authenticate(Claims::create(Duration::from_hours(1)).with_subject(subject))
        .expect("Failed to sign token")
}

// ============ Request helpers ============

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Send a request and decode the JSON body (`Value::Null` when empty).
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|_| {
            panic!("response body is not JSON: {}", String::from_utf8_lossy(&body))
        })
    };
    (status, json)
}
