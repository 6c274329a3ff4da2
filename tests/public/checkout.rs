//! Tests for POST /create-checkout-session.
//!
//! A valid cart creates exactly one pending order before Stripe is called;
//! an invalid cart or a missing Stripe key creates nothing.

use axum::http::StatusCode;
use serde_json::{Value, json};

#[path = "../common/mod.rs"]
mod common;
use common::*;

fn valid_cart() -> Value {
    json!({
        "items": [
            { "name": "Vitamin D3 1000IU", "price": 10.00, "quantity": 2, "image_url": "https://cdn.example.com/d3.png" }
        ],
        "shipping_address": "1 Main St, Springfield"
    })
}

fn form_body(request: &wiremock::Request) -> String {
    String::from_utf8_lossy(&request.body).into_owned()
}

#[tokio::test]
async fn test_checkout_creates_pending_order_and_session() {
    let t = TestApp::new().await;
    mock_create_session(&t.stripe, stripe_session_json("cs_test_checkout", "unpaid")).await;

    let (status, body) = send(t.app(), post_json("/create-checkout-session", &valid_cart())).await;

    assert_eq!(status, StatusCode::OK, "checkout should succeed: {}", body);
    assert_eq!(body["sessionId"], "cs_test_checkout");
    assert_eq!(body["url"], "https://checkout.stripe.com/c/pay/cs_test_checkout");

    let order_id = body["orderId"].as_str().expect("orderId should be a string");
    assert!(order_id.starts_with("rx_ord_"));

    let conn = t.conn();
    assert_eq!(count_all_orders(&conn), 1, "exactly one order per checkout");
    let order = get_order(&conn, order_id);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, 2000, "10.00 x 2 should be stored as 2000");
    assert_eq!(order.currency, "usd");
    assert_eq!(order.stripe_session_id.as_deref(), Some("cs_test_checkout"));
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].unit_amount, 1000);
    assert_eq!(order.shipping_address.as_deref(), Some("1 Main St, Springfield"));
    assert_eq!(order.user_id, None, "no token means guest checkout");
}

#[tokio::test]
async fn test_checkout_sends_normalized_amounts_to_stripe() {
    let t = TestApp::new().await;
    mock_create_session(&t.stripe, stripe_session_json("cs_test_form", "unpaid")).await;

    let (status, body) = send(t.app(), post_json("/create-checkout-session", &valid_cart())).await;
    assert_eq!(status, StatusCode::OK);
    let order_id = body["orderId"].as_str().unwrap();

    let requests = t.stripe_requests().await;
    assert_eq!(requests.len(), 1, "exactly one Stripe call per checkout");
    let form = form_body(&requests[0]);

    assert!(form.contains("mode=payment"));
    assert!(form.contains("line_items%5B0%5D%5Bprice_data%5D%5Bunit_amount%5D=1000"));
    assert!(form.contains("line_items%5B0%5D%5Bquantity%5D=2"));
    assert!(form.contains("line_items%5B0%5D%5Bprice_data%5D%5Bcurrency%5D=usd"));
    assert!(form.contains("payment_method_types%5B0%5D=card"));
    assert!(form.contains(&format!("metadata%5Border_id%5D={}", order_id)));
    assert!(form.contains(&format!("client_reference_id={}", order_id)));
    assert!(
        form.contains("payment-success%3Fsession_id%3D%7BCHECKOUT_SESSION_ID%7D"),
        "success URL should carry Stripe's session placeholder: {}",
        form
    );
    assert!(form.contains("cancel_url=http%3A%2F%2Flocalhost%3A5173%2Fcart"));

    let auth = requests[0]
        .headers
        .get("authorization")
        .expect("Stripe call should be authenticated");
    assert!(auth.to_str().unwrap().starts_with("Basic "));
}

#[tokio::test]
async fn test_checkout_rejects_invalid_carts_without_persisting() {
    let t = TestApp::new().await;
    mock_create_session(&t.stripe, stripe_session_json("cs_never", "unpaid")).await;

    let invalid_carts = [
        ("empty cart", json!({ "items": [] })),
        ("blank name", json!({ "items": [{ "name": "  ", "price": 5.0, "quantity": 1 }] })),
        ("zero price", json!({ "items": [{ "name": "Zinc", "price": 0.0, "quantity": 1 }] })),
        ("negative price", json!({ "items": [{ "name": "Zinc", "price": -3.5, "quantity": 1 }] })),
        ("price rounds to zero", json!({ "items": [{ "name": "Zinc", "price": 0.004, "quantity": 1 }] })),
        ("zero quantity", json!({ "items": [{ "name": "Zinc", "price": 5.0, "quantity": 0 }] })),
        ("negative quantity", json!({ "items": [{ "name": "Zinc", "price": 5.0, "quantity": -2 }] })),
        (
            "bad currency",
            json!({ "items": [{ "name": "Zinc", "price": 5.0, "quantity": 1 }], "currency": "dollars" }),
        ),
        (
            "blank payment method",
            json!({ "items": [{ "name": "Zinc", "price": 5.0, "quantity": 1 }], "payment_method_types": [""] }),
        ),
        ("missing items", json!({ "currency": "usd" })),
    ];

    for (case, cart) in invalid_carts {
        let (status, body) = send(t.app(), post_json("/create-checkout-session", &cart)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} should be rejected", case);
        assert_eq!(body["error"], "Bad request", "{} should use the error shape", case);
    }

    assert_eq!(count_all_orders(&t.conn()), 0, "invalid carts must not create orders");
    assert!(
        t.stripe_requests().await.is_empty(),
        "invalid carts must never reach Stripe"
    );
}

#[tokio::test]
async fn test_checkout_without_stripe_key_creates_nothing() {
    let (pool, _dir) = setup_test_pool();
    let state = test_state(pool, None);
    let app = build_app(state.clone());

    let (status, body) = send(app, post_json("/create-checkout-session", &valid_cart())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Configuration error");
    assert!(
        body["details"].as_str().unwrap().contains("STRIPE_SECRET_KEY"),
        "details should name the missing setting: {}",
        body
    );

    let conn = state.db.get().unwrap();
    assert_eq!(count_all_orders(&conn), 0, "missing credential must not create an order");
}

#[tokio::test]
async fn test_checkout_stripe_failure_keeps_order_pending_without_session() {
    let t = TestApp::new().await;
    mock_stripe_error(&t.stripe, "POST", 400, "Invalid currency: xyz").await;

    let (status, body) = send(t.app(), post_json("/create-checkout-session", &valid_cart())).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Payment provider error");
    assert_eq!(body["details"], "Invalid currency: xyz", "Stripe's message is passed through");

    let conn = t.conn();
    let (orders, total) =
        queries::list_orders_paginated(&conn, &OrderFilters::default(), 10, 0).unwrap();
    assert_eq!(total, 1, "the order is created before Stripe is called");
    assert_eq!(orders[0].status, OrderStatus::Pending);
    assert_eq!(orders[0].stripe_session_id, None);
}

#[tokio::test]
async fn test_checkout_records_caller_identity() {
    let t = TestApp::new().await;
    mock_create_session(&t.stripe, stripe_session_json("cs_test_user", "unpaid")).await;

    let mut request = post_json("/create-checkout-session", &valid_cart());
    request.headers_mut().insert(
        "Authorization",
        format!("Bearer {}", auth_token("user-123")).parse().unwrap(),
    );

    let (status, body) = send(t.app(), request).await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let order = get_order(&t.conn(), body["orderId"].as_str().unwrap());
    assert_eq!(order.user_id.as_deref(), Some("user-123"));

    let form = form_body(&t.stripe_requests().await[0]);
    assert!(form.contains("metadata%5Buser_id%5D=user-123"));
}

#[tokio::test]
async fn test_checkout_rejects_invalid_token() {
    let t = TestApp::new().await;
    mock_create_session(&t.stripe, stripe_session_json("cs_never", "unpaid")).await;

    let mut request = post_json("/create-checkout-session", &valid_cart());
    request
        .headers_mut()
        .insert("Authorization", "Bearer not-a-real-token".parse().unwrap());

    let (status, _) = send(t.app(), request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(count_all_orders(&t.conn()), 0);
}

#[tokio::test]
async fn test_checkout_uses_requested_currency_and_methods() {
    let t = TestApp::new().await;
    mock_create_session(&t.stripe, stripe_session_json("cs_test_eur", "unpaid")).await;

    let cart = json!({
        "items": [
            { "name": "Omega-3", "price": 12.49, "quantity": 1 },
            { "name": "Melatonin", "price": 6.5, "quantity": 3 }
        ],
        "currency": "EUR",
        "payment_method_types": ["card", "sepa_debit"]
    });

    let (status, body) = send(t.app(), post_json("/create-checkout-session", &cart)).await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let order = get_order(&t.conn(), body["orderId"].as_str().unwrap());
    assert_eq!(order.currency, "eur");
    assert_eq!(order.total_amount, 1249 + 650 * 3);

    let form = form_body(&t.stripe_requests().await[0]);
    assert!(form.contains("payment_method_types%5B1%5D=sepa_debit"));
    assert!(form.contains("line_items%5B1%5D%5Bprice_data%5D%5Bunit_amount%5D=650"));
}

#[tokio::test]
async fn test_checkout_malformed_json_is_bad_request() {
    let t = TestApp::new().await;

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/create-checkout-session")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{\"items\": ["))
        .unwrap();

    let (status, body) = send(t.app(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad request");
    assert!(body["details"].is_string());
}
