mod checkout;
mod orders;
mod verify;

pub use checkout::*;
pub use orders::*;
pub use verify::*;

use axum::{
    Json, Router,
    http::{HeaderName, HeaderValue, Method},
    routing::{get, post},
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::db::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// CORS for the browser storefront. Pre-flight requests get an empty 200.
pub fn storefront_cors(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("authorization"),
            HeaderName::from_static("content-type"),
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ]);

    match HeaderValue::from_str(origin) {
        Ok(origin) => cors.allow_origin(origin),
        Err(e) => {
            tracing::warn!("Invalid STOREFRONT_ORIGIN {:?}, CORS disabled: {}", origin, e);
            cors
        }
    }
}

pub fn router(storefront_origin: &str) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/create-checkout-session", post(create_checkout_session))
        .route("/verify-payment", post(verify_payment))
        .route("/orders/{order_id}", get(get_order))
        .layer(storefront_cors(storefront_origin))
}
