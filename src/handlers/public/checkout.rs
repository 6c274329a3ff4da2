use axum::{extract::State, http::HeaderMap};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;
use crate::jwt::caller_identity;
use crate::models::{CheckoutRequest, CheckoutResponse, CreateOrder};
use crate::payments::CheckoutSessionParams;

/// Turn the storefront cart into a pending order and a Stripe-hosted
/// payment page.
///
/// The order row exists before Stripe is called, so every hosted page maps
/// back to exactly one order. If Stripe fails the order stays `pending`
/// without a session and is eventually pruned.
pub async fn create_checkout_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let cart = request.normalize(&state.default_currency)?;
    let user_id = caller_identity(&headers, state.auth_jwt_secret.as_deref())?;

    // Missing credentials must fail before anything is written.
    let stripe = state.stripe_client()?;

    let order = {
        let conn = state.db.get()?;
        queries::create_order(
            &conn,
            &CreateOrder {
                user_id,
                items: cart.items,
                currency: cart.currency,
                shipping_address: cart.shipping_address,
            },
        )?
    };

    let success_url = format!(
        "{}/payment-success?session_id={{CHECKOUT_SESSION_ID}}",
        state.storefront_url
    );
    let cancel_url = format!("{}/cart", state.storefront_url);

    let session = stripe
        .create_checkout_session(&CheckoutSessionParams {
            order_id: &order.id,
            user_id: order.user_id.as_deref(),
            items: &order.items,
            currency: &order.currency,
            payment_method_types: &cart.payment_method_types,
            success_url: &success_url,
            cancel_url: &cancel_url,
        })
        .await
        .inspect_err(|e| {
            tracing::warn!(order_id = %order.id, "Checkout session creation failed: {}", e);
        })?;

    {
        let conn = state.db.get()?;
        let attached = queries::attach_checkout_session(
            &conn,
            &order.id,
            &session.id,
            session.payment_intent.as_deref(),
        )?;
        if !attached {
            tracing::warn!(
                order_id = %order.id,
                session_id = %session.id,
                "Order was no longer pending when its checkout session was attached"
            );
        }
    }

    let url = session
        .url
        .ok_or_else(|| AppError::PaymentProvider(msg::MISSING_REDIRECT_URL.into()))?;

    tracing::info!(
        order_id = %order.id,
        session_id = %session.id,
        total_amount = order.total_amount,
        currency = %order.currency,
        "Checkout session created"
    );

    Ok(Json(CheckoutResponse {
        url,
        session_id: session.id,
        order_id: order.id,
    }))
}
