pub mod admin;
pub mod public;
pub mod webhooks;

use axum::Router;

use crate::db::AppState;

/// Every route the service exposes. Callers add tracing and the state.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        // Storefront endpoints (CORS-enabled, optional caller identity)
        .merge(public::router(&state.storefront_origin))
        // Processor callbacks (signature auth)
        .merge(webhooks::router())
        // Back office (admin key auth)
        .merge(admin::router(state.clone()))
}
