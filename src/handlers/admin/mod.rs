mod orders;

pub use orders::*;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::db::AppState;
use crate::middleware::require_admin;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/orders", get(list_orders))
        .route("/admin/orders/{order_id}", get(get_order_detail))
        .route("/admin/orders/{order_id}/cancel", post(cancel_order))
        .route("/admin/orders/{order_id}/refund", post(refund_order))
        .layer(middleware::from_fn_with_state(state, require_admin))
}
